pub mod auth_service;
pub mod mutation_service;
pub mod patient_service;
pub mod query_service;
pub mod realtime_service;
pub mod route_guard;
pub mod session;
pub mod todo_service;

pub use auth_service::AuthService;
pub use mutation_service::{MutationContext, MutationKind, OptimisticMutations};
pub use patient_service::PatientService;
pub use query_service::{QueryService, RetryPolicy};
pub use realtime_service::{apply_event, RealtimeCallback, RealtimeSubscription, RealtimeSync};
pub use route_guard::{GuardOutcome, RouteAccess, RouteGuard};
pub use session::{session_channel, SessionReader, SessionWriter};
pub use todo_service::TodoService;
