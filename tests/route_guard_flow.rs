mod common;

use common::{app, EMAIL, PASSWORD};
use pocket_starter_lib::{
    domain::value_objects::RecordId,
    infrastructure::InMemoryBackend,
    presentation::{dto::auth_dto::LoginRequest, Navigation, Screen},
};
use reqwest::Url;

fn redirect_param(login_url: &str) -> Option<String> {
    let url = Url::parse(&format!("http://localhost{login_url}")).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "redirect")
        .map(|(_, value)| value.into_owned())
}

#[tokio::test]
async fn protected_route_round_trips_through_login() {
    let backend = InMemoryBackend::new();
    backend.register_user(EMAIL, PASSWORD).await.unwrap();
    let state = app(&backend);

    let Navigation::Redirect(login_url) = state.navigator.navigate("/todos/abc") else {
        panic!("signed-out users must be redirected");
    };
    assert!(login_url.starts_with("/login?"));
    let redirect = redirect_param(&login_url);
    assert_eq!(redirect.as_deref(), Some("/todos/abc"));

    let response = state
        .auth_handler
        .login(LoginRequest {
            email: EMAIL.to_string(),
            password: PASSWORD.to_string(),
            redirect,
        })
        .await
        .unwrap();
    assert_eq!(response.redirect_to, "/todos/abc");
    assert_eq!(
        state.navigator.navigate(&response.redirect_to),
        Navigation::Render(Screen::TodoDetail(RecordId::new("abc").unwrap()))
    );
}

#[tokio::test]
async fn hostile_redirect_falls_back_to_dashboard() {
    let backend = InMemoryBackend::new();
    backend.register_user(EMAIL, PASSWORD).await.unwrap();
    let state = app(&backend);

    let response = state
        .auth_handler
        .login(LoginRequest {
            email: EMAIL.to_string(),
            password: PASSWORD.to_string(),
            redirect: Some("https://evil.example/steal".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(response.redirect_to, "/dashboard");
}

#[tokio::test]
async fn guest_routes_follow_the_session() {
    let backend = InMemoryBackend::new();
    backend.register_user(EMAIL, PASSWORD).await.unwrap();
    let state = app(&backend);

    assert_eq!(state.navigator.navigate("/login"), Navigation::Render(Screen::Login));
    assert_eq!(state.navigator.navigate("/signup"), Navigation::Render(Screen::Signup));
    assert_eq!(state.navigator.navigate("/"), Navigation::Render(Screen::Home));

    state.auth_service.login(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(
        state.navigator.navigate("/login"),
        Navigation::Redirect("/dashboard".to_string())
    );
    assert_eq!(
        state.navigator.navigate("/signup"),
        Navigation::Redirect("/dashboard".to_string())
    );

    let login_path = state.auth_handler.logout().await.unwrap();
    assert_eq!(login_path, "/login");
    assert_eq!(
        state.navigator.navigate("/dashboard"),
        Navigation::Redirect("/login?redirect=%2Fdashboard".to_string())
    );
}
