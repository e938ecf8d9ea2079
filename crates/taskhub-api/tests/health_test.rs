use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use taskhub_api::config::AuthConfig;
use taskhub_api::router::{build_router, AppState};
use taskhub_auth::store::InMemoryIdentityStore;

#[tokio::test]
async fn health_returns_200() {
    // the health endpoint never touches the identity store
    let config = AuthConfig {
        bot_token: "123456:bot".to_owned(),
        session_secret: "jwt-secret".to_owned(),
        store_timeout: Duration::from_secs(1),
    };
    let state = AppState::new(Arc::new(InMemoryIdentityStore::new()), &config).unwrap();
    let server = TestServer::new(build_router(Arc::new(state))).unwrap();
    let response = server.get("/healthz").await;
    assert_eq!(response.status_code(), StatusCode::OK);
}
