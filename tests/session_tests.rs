mod helpers;

use std::sync::atomic::Ordering;
use helpers::{LoginMode, MockFrontend, PASSWORD, USER};
use kconsole::auth::AuthSession;
use kconsole::config::HttpConfig;
use kconsole::error::{AuthError, ConsoleError};

#[tokio::test]
async fn test_already_authenticated_landing_skips_the_form() {
    let frontend = MockFrontend::start(LoginMode::Open).await;

    let session = AuthSession::login(&frontend.url, USER, PASSWORD, &HttpConfig::default())
        .await
        .expect("login");

    assert_eq!(frontend.state.posts.load(Ordering::SeqCst), 0);
    assert!(session.base_url().as_str().ends_with('/'));
    assert_eq!(session.cluster(), "default");
}

#[tokio::test]
async fn test_direct_form_login_keeps_the_session_cookie() {
    let frontend = MockFrontend::start(LoginMode::Direct).await;

    let session = AuthSession::login(&frontend.url, USER, PASSWORD, &HttpConfig::default())
        .await
        .expect("login");
    assert_eq!(frontend.state.posts.load(Ordering::SeqCst), 1);

    // Landing page is only served to a session that carries the cookie.
    let landing = session.fetch_text("").await.expect("landing");
    assert!(landing.contains("Dashboard"));
}

#[tokio::test]
async fn test_sso_login_posts_hidden_state_to_the_form_action() {
    let frontend = MockFrontend::start(LoginMode::Sso).await;

    let session = AuthSession::login(&frontend.url, USER, PASSWORD, &HttpConfig::default()).await;

    assert!(session.is_ok(), "{:?}", session.err());
    assert_eq!(frontend.state.posts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_wrong_password_reports_the_page_error() {
    for mode in [LoginMode::Direct, LoginMode::Sso] {
        let frontend = MockFrontend::start(mode).await;

        let err = AuthSession::login(&frontend.url, USER, "wrong", &HttpConfig::default())
            .await
            .expect_err("must fail");

        assert_eq!(
            err,
            ConsoleError::Authentication(AuthError::InvalidCredentials("Invalid username or password.".to_string())),
            "mode {:?}",
            mode
        );
    }
}

#[tokio::test]
async fn test_page_without_form_fails() {
    let frontend = MockFrontend::start(LoginMode::NoForm).await;

    let err = AuthSession::login(&frontend.url, USER, PASSWORD, &HttpConfig::default())
        .await
        .expect_err("must fail");

    assert_eq!(err, ConsoleError::Authentication(AuthError::NoLoginForm));
    assert_eq!(frontend.state.posts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unresolvable_form_action_is_an_auth_failure() {
    let frontend = MockFrontend::start(LoginMode::BadAction).await;

    let err = AuthSession::login(&frontend.url, USER, PASSWORD, &HttpConfig::default())
        .await
        .expect_err("must fail");

    assert!(matches!(err, ConsoleError::Authentication(AuthError::BadForm(_))), "{:?}", err);
    assert!(!err.is_configuration());
    assert_eq!(frontend.state.posts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unreachable_frontend_is_a_network_failure() {
    let err = AuthSession::login("http://127.0.0.1:9", USER, PASSWORD, &HttpConfig::default())
        .await
        .expect_err("must fail");

    assert!(matches!(err, ConsoleError::Authentication(AuthError::Network(_))), "{:?}", err);
}

#[tokio::test]
async fn test_connection_resolves_the_first_cluster() {
    let frontend = MockFrontend::start(LoginMode::Direct).await;

    let (session, clusters) = AuthSession::test_connection(&frontend.url, USER, PASSWORD, &HttpConfig::default())
        .await
        .expect("connect");

    assert_eq!(clusters, vec!["local", "backup"]);
    assert_eq!(session.cluster(), "local");
}

#[tokio::test]
async fn test_rules_page_is_fetched_as_text() {
    let frontend = MockFrontend::start(LoginMode::Open).await;
    let session = AuthSession::login(&frontend.url, USER, PASSWORD, &HttpConfig::default())
        .await
        .expect("login");

    assert_eq!(session.fetch_text("rules").await.unwrap(), "rule-a\nrule-b");
    assert!(matches!(session.fetch_text("missing").await, Err(ConsoleError::Network(_))));
}
