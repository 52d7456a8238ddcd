use std::sync::Arc;

use agora::{Application, Command, Router};
use agora_core::{ProviderExtension, UserSettings};
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

fn command_router() -> Router {
    let price = Router::new()
        .command(Command::new("/historical/", "EquityHistorical").unwrap());
    let equity = Router::new()
        .command(Command::new("/foo/", "Foo").unwrap())
        .mount("/price", price);
    Router::new().mount("/equity", equity)
}

fn serve(extensions: Vec<Arc<dyn ProviderExtension>>) -> axum::Router {
    let mut builder = Application::builder()
        .schemas(agora_mock::standard_models().unwrap())
        .router(command_router())
        .settings(UserSettings::default());
    for extension in extensions {
        builder = builder.with_extension(extension);
    }
    agora_server::router(Arc::new(builder.build().unwrap()))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn get_returns_the_envelope_with_coerced_params() {
    let app = serve(vec![
        Arc::new(agora_mock::alpha()),
        Arc::new(agora_mock::beta()),
    ]);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/equity/foo?symbol=x&provider=alpha&limit=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["provider"], "alpha");
    assert_eq!(body["extra"]["model"], "Foo");
    // limit=2 arrived as an integer, not a string.
    assert_eq!(body["results"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["results"][0]["symbol"], "X");
}

#[tokio::test]
async fn post_accepts_a_json_object_body() {
    let app = serve(vec![Arc::new(agora_mock::alpha())]);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/equity/price/historical")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"symbol":"acme","start_date":"2024-01-01","end_date":"2024-01-02"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["results"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["results"][0]["date"], "2024-01-01");
}

#[tokio::test]
async fn post_rejects_non_object_bodies() {
    let app = serve(vec![Arc::new(agora_mock::alpha())]);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/equity/foo")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("[1,2,3]"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error_kind"], "ValidationError");
}

#[tokio::test]
async fn commands_without_any_provider_are_not_routed() {
    // delta implements only EquityHistorical, so /equity/foo has no route.
    let app = serve(vec![Arc::new(agora_mock::delta())]);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/equity/foo?symbol=X")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_credentials_map_to_401_and_leak_nothing() {
    let app = serve(vec![Arc::new(agora_mock::delta())]);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/equity/price/historical?symbol=X&provider=delta")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["error_kind"], "MissingCredential");
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("delta_api_key"));
    assert!(!detail.contains("None"));
}

#[tokio::test]
async fn mistyped_query_tokens_are_422() {
    let app = serve(vec![Arc::new(agora_mock::alpha())]);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/equity/foo?symbol=X&limit=lots")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("limit"));
}

#[tokio::test]
async fn unknown_providers_map_to_400() {
    let app = serve(vec![Arc::new(agora_mock::alpha())]);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/equity/foo?symbol=X&provider=omega")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error_kind"], "ModelNotSupported");
}
