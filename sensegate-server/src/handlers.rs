//! HTTP handlers and routing for the sensor API

use std::collections::HashMap;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use sensegate_core::webhook::{self, WebhookCall};
use sensegate_core::{protocol, snapshot};

use crate::state::SharedState;

/// Build the application router.
///
/// The batch POST route is registered only for deployments that carry an
/// HMAC secret; everyone gets the overloaded GET route and a health check.
pub fn router(state: SharedState) -> Router {
    let mut app = Router::new()
        .route("/api/sensors/", get(sensors_get_handler))
        .route("/health", get(health_handler));
    if state.batch_auth.is_some() {
        app = app.route("/api/sensors/", post(sensors_post_handler));
    }
    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "sensegate-server"
    }))
}

/// GET doubles as webhook ingestion and the snapshot read path: a query
/// carrying an `Event` parameter is a gateway push, anything else is a
/// state query. Gateway firmware cannot be pointed at two URLs.
async fn sensors_get_handler(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    match webhook::parse_webhook_query(&params) {
        Ok(Some(call)) => {
            if let WebhookCall::Reading(event) = call {
                tracing::debug!("Webhook reading from {}", event.device_id);
                state.store.merge_event(event).await;
            }
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(None) => read_snapshot(&state, &headers).await,
        Err(err) => {
            tracing::warn!("Rejected webhook call: {}", err);
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
    }
}

async fn read_snapshot(state: &SharedState, headers: &HeaderMap) -> Response {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if let Err(err) = state.read_auth.verify(auth_header) {
        tracing::debug!("Snapshot read rejected: {}", err);
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic")],
        )
            .into_response();
    }

    let rendered = snapshot::render(
        state.store.snapshot().await,
        &state.labels,
        state.sort_by_recency,
    );
    Json(rendered).into_response()
}

/// POST receives HMAC-signed batch pushes. The signature is checked over
/// the raw body before anything is parsed; a bad body rejects the whole
/// batch without touching state.
async fn sensors_post_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(batch_auth) = &state.batch_auth else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if let Err(err) = batch_auth.verify(auth_header, &body) {
        tracing::warn!("Rejected batch push: {}", err);
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match protocol::decode_batch(&body) {
        Ok(events) => {
            tracing::debug!("Merging {} batch readings", events.len());
            for event in events {
                state.store.merge_event(event).await;
            }
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::body::Body;
    use axum::http::Request;
    use base64::Engine;
    use http_body_util::BodyExt;
    use sensegate_core::{Config, HmacAuth};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(config: Config) -> Router {
        router(Arc::new(AppState::from_config(&config)))
    }

    fn batch_config(secret: &str) -> Config {
        let mut config = Config::default();
        config.server.batch_ingest = true;
        config.server.hmac_secret = Some(secret.to_string());
        config
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    const WEBHOOK_TYPE9: &str =
        "/api/sensors/?Event=9&DT_Event=2024-05-01T10:00:00Z&DeviceSN=00A1B2&Param1=40&Param2=21";

    #[tokio::test]
    async fn test_health() {
        let response = app(Config::default())
            .oneshot(get("/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_webhook_ingest_then_snapshot() {
        let app = app(Config::default());

        let response = app.clone().oneshot(get(WEBHOOK_TYPE9)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(get("/api/sensors/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["00A1B2"]["timestamp"], "2024-05-01T10:00:00Z");
        assert_eq!(json["00A1B2"]["humidity"], 40);
        assert_eq!(json["00A1B2"]["temperature"], 21);
        assert!(json["00A1B2"]["pressure"].is_null());
    }

    #[tokio::test]
    async fn test_webhook_zero_channel_renders_null() {
        let app = app(Config::default());

        let uri =
            "/api/sensors/?Event=9&DT_Event=2024-05-01T10:00:00Z&DeviceSN=00A1B2&Param1=0&Param2=21";
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let json = body_json(app.oneshot(get("/api/sensors/")).await.unwrap()).await;
        assert!(json["00A1B2"]["humidity"].is_null());
        assert_eq!(json["00A1B2"]["temperature"], 21);
    }

    #[tokio::test]
    async fn test_unknown_event_type_acknowledged_without_state_change() {
        let app = app(Config::default());

        let uri = "/api/sensors/?Event=99&DT_Event=2024-05-01T10:00:00Z&DeviceSN=00A1B2&Param1=5";
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let json = body_json(app.oneshot(get("/api/sensors/")).await.unwrap()).await;
        assert_eq!(json, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_malformed_webhook_is_bad_request() {
        let app = app(Config::default());

        let uri = "/api/sensors/?Event=9&DT_Event=not-a-time&DeviceSN=00A1B2&Param1=40&Param2=21";
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let uri = "/api/sensors/?Event=twelve&DT_Event=2024-05-01T10:00:00Z&DeviceSN=00A1B2";
        let response = app.oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stale_webhook_does_not_roll_back_state() {
        let app = app(Config::default());

        app.clone().oneshot(get(WEBHOOK_TYPE9)).await.unwrap();

        // Same device, earlier timestamp, different temperature
        let stale =
            "/api/sensors/?Event=9&DT_Event=2024-05-01T09:00:00Z&DeviceSN=00A1B2&Param1=40&Param2=99";
        let response = app.clone().oneshot(get(stale)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let json = body_json(app.oneshot(get("/api/sensors/")).await.unwrap()).await;
        assert_eq!(json["00A1B2"]["temperature"], 21);
        assert_eq!(json["00A1B2"]["timestamp"], "2024-05-01T10:00:00Z");
    }

    #[tokio::test]
    async fn test_snapshot_requires_basic_auth_when_configured() {
        let mut config = Config::default();
        config.server.auth_user = Some("gateway".to_string());
        config.server.auth_password = Some("s3cret".to_string());
        let app = app(config);

        let response = app.clone().oneshot(get("/api/sensors/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic"
        );

        let credentials = base64::engine::general_purpose::STANDARD.encode("gateway:s3cret");
        let request = Request::builder()
            .uri("/api/sensors/")
            .header(header::AUTHORIZATION, format!("Basic {credentials}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Webhook pushes are not gated by read auth
        let response = app.oneshot(get(WEBHOOK_TYPE9)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_labels_replace_snapshot_keys() {
        let mut config = Config::default();
        config.devices.push(sensegate_core::config::DeviceConfig {
            serial: "00A1B2".to_string(),
            label: "greenhouse".to_string(),
        });
        let app = app(config);

        app.clone().oneshot(get(WEBHOOK_TYPE9)).await.unwrap();

        let json = body_json(app.oneshot(get("/api/sensors/")).await.unwrap()).await;
        assert_eq!(json["greenhouse"]["temperature"], 21);
        assert!(json.get("00A1B2").is_none());
    }

    const BATCH_BODY: &str = r#"[
        {"header": {"message_id": "msg-001"},
         "payload": [
            {"device_id": "00C3D4",
             "event_time": "2024-05-01T10:00:00Z",
             "measurement": {"value": 1013.2}}
         ]}
    ]"#;

    fn signed_post(secret: &str, nonce: &str, body: &[u8]) -> Request<Body> {
        let signature = HmacAuth::new(secret).sign(nonce, body);
        Request::builder()
            .method("POST")
            .uri("/api/sensors/")
            .header(
                header::AUTHORIZATION,
                format!("HMAC-SHA256 {signature}:{nonce}"),
            )
            .body(Body::from(body.to_vec()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_batch_push_updates_state() {
        let app = app(batch_config("shared-secret"));

        let request = signed_post("shared-secret", "nonce-1", BATCH_BODY.as_bytes());
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let json = body_json(app.oneshot(get("/api/sensors/")).await.unwrap()).await;
        assert_eq!(json["00C3D4"]["value"], 1013.2);
        assert_eq!(json["00C3D4"]["timestamp"], "2024-05-01T10:00:00Z");
    }

    #[tokio::test]
    async fn test_batch_push_tampered_body_rejected() {
        let app = app(batch_config("shared-secret"));

        let signature = HmacAuth::new("shared-secret").sign("nonce-1", BATCH_BODY.as_bytes());
        let mut tampered = BATCH_BODY.as_bytes().to_vec();
        let flip = tampered.len() - 10;
        tampered[flip] ^= 1;

        let request = Request::builder()
            .method("POST")
            .uri("/api/sensors/")
            .header(
                header::AUTHORIZATION,
                format!("HMAC-SHA256 {signature}:nonce-1"),
            )
            .body(Body::from(tampered))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Nothing was merged
        let json = body_json(app.oneshot(get("/api/sensors/")).await.unwrap()).await;
        assert_eq!(json, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_batch_push_missing_auth_rejected() {
        let app = app(batch_config("shared-secret"));

        let request = Request::builder()
            .method("POST")
            .uri("/api/sensors/")
            .body(Body::from(BATCH_BODY))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_batch_push_malformed_body_is_unprocessable() {
        let app = app(batch_config("shared-secret"));

        // Correctly signed, structurally wrong
        let body = br#"{"not": "a batch"}"#;
        let request = signed_post("shared-secret", "nonce-1", body);
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("Malformed batch payload"));
    }

    #[tokio::test]
    async fn test_post_route_absent_without_batch_mode() {
        let app = app(Config::default());

        let request = Request::builder()
            .method("POST")
            .uri("/api/sensors/")
            .body(Body::from(BATCH_BODY))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_cors_header_on_responses() {
        let app = app(Config::default());

        let request = Request::builder()
            .uri("/api/sensors/")
            .header(header::ORIGIN, "http://dashboard.example")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }
}
