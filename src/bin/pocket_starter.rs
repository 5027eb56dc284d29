use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use pocket_starter_lib::{
    application::services::RealtimeCallback,
    domain::{entities::RealtimeEvent, value_objects::CollectionName},
    presentation::{
        dto::{
            auth_dto::{LoginRequest, SignupRequest},
            patient_dto::{CreatePatientRequest, ListPatientsRequest},
            todo_dto::{CreateTodoRequest, ListTodosRequest, UpdateTodoRequest},
            ApiResponse, PaginationRequest,
        },
        handlers::parse_record_id,
    },
    AppConfig, AppState,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "pocket-starter")]
#[command(about = "PocketBase starter client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL
    #[arg(long, env = "POCKET_STARTER_BACKEND_URL")]
    backend_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "POCKET_STARTER_PASSWORD")]
        password: String,
        /// Path to continue to after signing in
        #[arg(long)]
        redirect: Option<String>,
    },
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "POCKET_STARTER_PASSWORD")]
        password: String,
        #[arg(long)]
        password_confirm: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Sign out and forget the stored token
    Logout,
    /// Show the current session
    Whoami,
    /// Manage todos
    Todos {
        #[command(subcommand)]
        command: TodoCommands,
    },
    /// Manage patients
    Patients {
        #[command(subcommand)]
        command: PatientCommands,
    },
    /// Stream realtime changes of a collection until interrupted
    Watch {
        collection: String,
        /// Only follow a single record
        #[arg(long)]
        id: Option<String>,
    },
    /// Resolve a path through the route guard
    Navigate { path: String },
}

#[derive(Subcommand)]
enum TodoCommands {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Show {
        id: String,
    },
    Add {
        title: String,
    },
    Done {
        id: String,
    },
    Undo {
        id: String,
    },
    Rm {
        id: String,
    },
}

#[derive(Subcommand)]
enum PatientCommands {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        search: Option<String>,
    },
    Add {
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    Show {
        id: String,
    },
    Rm {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    pocket_starter_lib::init_logging_with(&cli.log_level, cli.json_logs);

    let mut config = AppConfig::from_env();
    if let Some(url) = cli.backend_url {
        config.backend.base_url = url.trim_end_matches('/').to_string();
    }
    let state = AppState::new(config)?;
    state.initialize().await?;

    match cli.command {
        Commands::Login {
            email,
            password,
            redirect,
        } => {
            let request = LoginRequest {
                email,
                password,
                redirect,
            };
            print_response(state.auth_handler.login(request).await)
        }
        Commands::Signup {
            email,
            password,
            password_confirm,
            name,
        } => {
            let request = SignupRequest {
                email,
                password,
                password_confirm,
                name,
                redirect: None,
            };
            print_response(state.auth_handler.signup(request).await)
        }
        Commands::Logout => print_response(state.auth_handler.logout().await),
        Commands::Whoami => print_response(Ok(state.auth_handler.current_session())),
        Commands::Todos { command } => run_todos(&state, command).await,
        Commands::Patients { command } => run_patients(&state, command).await,
        Commands::Watch { collection, id } => watch(&state, &collection, id.as_deref()).await,
        Commands::Navigate { path } => print_response(Ok(state.navigator.navigate(&path))),
    }
}

async fn run_todos(state: &AppState, command: TodoCommands) -> Result<()> {
    let handler = &state.todo_handler;
    match command {
        TodoCommands::List { page } => {
            let request = ListTodosRequest {
                pagination: PaginationRequest {
                    page: Some(page),
                    per_page: None,
                },
            };
            print_response(handler.list_todos(request).await)
        }
        TodoCommands::Add { title } => {
            print_response(handler.create_todo(CreateTodoRequest { title }).await)
        }
        TodoCommands::Show { id } => print_response(handler.get_todo(&id).await),
        TodoCommands::Done { id } => print_response(
            handler
                .update_todo(UpdateTodoRequest {
                    id,
                    title: None,
                    completed: Some(true),
                })
                .await,
        ),
        TodoCommands::Undo { id } => print_response(
            handler
                .update_todo(UpdateTodoRequest {
                    id,
                    title: None,
                    completed: Some(false),
                })
                .await,
        ),
        TodoCommands::Rm { id } => print_response(handler.delete_todo(&id).await),
    }
}

async fn run_patients(state: &AppState, command: PatientCommands) -> Result<()> {
    let handler = &state.patient_handler;
    match command {
        PatientCommands::List { page, search } => {
            let request = ListPatientsRequest {
                pagination: PaginationRequest {
                    page: Some(page),
                    per_page: None,
                },
                search,
            };
            print_response(handler.list_patients(request).await)
        }
        PatientCommands::Add {
            name,
            email,
            phone,
            notes,
        } => {
            let request = CreatePatientRequest {
                name,
                email,
                phone,
                notes,
            };
            print_response(handler.create_patient(request).await)
        }
        PatientCommands::Show { id } => print_response(handler.get_patient(&id).await),
        PatientCommands::Rm { id } => print_response(handler.delete_patient(&id).await),
    }
}

async fn watch(state: &AppState, collection: &str, id: Option<&str>) -> Result<()> {
    let collection = CollectionName::new(collection).map_err(|e| anyhow!(e))?;
    let callback: RealtimeCallback = Arc::new(|event: &RealtimeEvent| {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => warn!(error = %err, "failed to encode realtime event"),
        }
    });

    let subscription = match id {
        Some(id) => {
            let id = parse_record_id(id)?;
            state
                .realtime
                .subscribe_record(&collection, &id, Some(callback))
                .await
        }
        None => {
            state
                .realtime
                .subscribe_collection(&collection, Some(callback))
                .await
        }
    };
    if subscription.is_degraded() {
        return Err(anyhow!("realtime is unavailable for {collection}"));
    }

    info!(topic = %subscription.topic(), "watching, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    subscription.close();
    Ok(())
}

fn print_response<T: Serialize>(result: pocket_starter_lib::shared::Result<T>) -> Result<()> {
    let response = ApiResponse::from_result(result);
    println!("{}", serde_json::to_string_pretty(&response)?);
    if response.success {
        Ok(())
    } else {
        Err(anyhow!(response
            .error
            .unwrap_or_else(|| "request failed".to_string())))
    }
}
