//! Local classification endpoint.
//!
//! Keeps the model credentials on the server. Players post a photo and the
//! item they are hunting; the answer always comes back as a `200` with the
//! fail-open policy already applied. Only malformed requests are rejected.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::capture::EncodedImage;
use crate::classify::{classify_fail_open, Classification, Classifier, ClassifyRequest};
use crate::error::{Error, Result};
use crate::items::Catalog;

/// Shared state of the endpoint.
#[derive(Debug, Clone)]
pub struct AppState {
    classifier: Arc<dyn Classifier>,
    catalog: Arc<Catalog>,
}

impl AppState {
    /// Create endpoint state.
    #[must_use]
    pub fn new(classifier: Arc<dyn Classifier>, catalog: Catalog) -> Self {
        Self {
            classifier,
            catalog: Arc::new(catalog),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the endpoint router.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/classify", post(classify))
        .route("/api/items", get(items))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the endpoint on `addr` until interrupted.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, state: AppState, max_body_bytes: usize) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "Classification endpoint listening on http://{} ({})",
        listener.local_addr()?,
        state.classifier.name()
    );

    axum::serve(listener, router(state, max_body_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Classification endpoint stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// POST /api/classify
async fn classify(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ClassifyRequest>, JsonRejection>,
) -> Result<Json<Classification>> {
    let Json(request) = payload.map_err(|rejection| Error::invalid_request(rejection.body_text()))?;

    if request.image.trim().is_empty() {
        return Err(Error::invalid_request("missing image"));
    }
    let item_name = request.item_name.trim();
    if item_name.is_empty() {
        return Err(Error::invalid_request("missing itemName"));
    }

    let image = EncodedImage::parse(&request.image)?;
    let fragment = state
        .catalog
        .find(item_name)
        .map_or(item_name, |item| item.prompt_fragment.as_str());
    debug!("Classifying {} byte image as {:?}", image.len(), fragment);

    let classification = classify_fail_open(state.classifier.as_ref(), &image, fragment).await;
    Ok(Json(classification))
}

/// GET /api/items
async fn items(State(state): State<AppState>) -> Json<Catalog> {
    Json(state.catalog.as_ref().clone())
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::classify::FixedClassifier;
    use crate::test_support::sample_jpeg;

    /// Remembers the prompt fragment it was asked about.
    #[derive(Debug, Default)]
    struct RecordingClassifier {
        fragments: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Classifier for RecordingClassifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn classify(
            &self,
            _image: &EncodedImage,
            prompt_fragment: &str,
        ) -> Result<Classification> {
            self.fragments
                .lock()
                .unwrap()
                .push(prompt_fragment.to_string());
            Ok(Classification::rejected())
        }
    }

    fn app(classifier: Arc<dyn Classifier>) -> Router {
        router(AppState::new(classifier, Catalog::builtin()), 1024 * 1024)
    }

    fn post_json(body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/classify")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value, Response) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json, Response::from_parts(parts, Body::empty()))
    }

    #[tokio::test]
    async fn test_classify_match() {
        let body = json!({"image": sample_jpeg().to_base64(), "itemName": "a chair"});
        let (status, json, _) = send(app(Arc::new(FixedClassifier::yes())), post_json(&body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"match": true, "offline": false}));
    }

    #[tokio::test]
    async fn test_classify_accepts_data_url_and_snake_case() {
        let body = json!({"image": sample_jpeg().to_data_url(), "item_name": "a chair"});
        let (status, json, _) = send(app(Arc::new(FixedClassifier::no())), post_json(&body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["match"], false);
    }

    #[tokio::test]
    async fn test_classifier_failure_is_offline_match() {
        let body = json!({"image": sample_jpeg().to_base64(), "itemName": "a chair"});
        let (status, json, _) =
            send(app(Arc::new(FixedClassifier::unreachable())), post_json(&body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["match"], true);
        assert_eq!(json["offline"], true);
        assert_eq!(json["reason"], "Classifier unreachable");
    }

    #[tokio::test]
    async fn test_catalog_item_uses_its_fragment() {
        let classifier = Arc::new(RecordingClassifier::default());
        let image = sample_jpeg().to_base64();

        for item_name in ["mug", "Coffee Mug", "a lamp"] {
            let body = json!({"image": image, "itemName": item_name});
            let (status, _, _) = send(app(classifier.clone()), post_json(&body)).await;
            assert_eq!(status, StatusCode::OK);
        }

        assert_eq!(
            *classifier.fragments.lock().unwrap(),
            ["a coffee mug", "a coffee mug", "a lamp"]
        );
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let image = sample_jpeg().to_base64();
        let bodies = [
            json!({"itemName": "a chair"}),
            json!({"image": image}),
            json!({"image": "", "itemName": "a chair"}),
            json!({"image": image, "itemName": "   "}),
            json!({"image": "%%% not base64 %%%", "itemName": "a chair"}),
        ];

        for body in bodies {
            let classifier = Arc::new(FixedClassifier::yes());
            let (status, json, _) = send(app(classifier.clone()), post_json(&body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {body}");
            assert!(json["error"].is_string());
            assert_eq!(classifier.calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/classify")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, json, _) = send(app(Arc::new(FixedClassifier::yes())), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_items() {
        let request = Request::builder()
            .uri("/api/items")
            .body(Body::empty())
            .unwrap();
        let (status, json, _) = send(app(Arc::new(FixedClassifier::yes())), request).await;

        assert_eq!(status, StatusCode::OK);
        let items = json.as_array().unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0]["id"], "bottle");
        assert_eq!(items[0]["promptFragment"], "a water bottle");
    }

    #[tokio::test]
    async fn test_health_and_security_headers() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, json, response) = send(app(Arc::new(FixedClassifier::yes())), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"status": "ok"}));

        let headers = response.headers();
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::X_XSS_PROTECTION], "1; mode=block");
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let app = router(
            AppState::new(Arc::new(FixedClassifier::yes()), Catalog::builtin()),
            64,
        );
        let body = json!({"image": "A".repeat(1024), "itemName": "a chair"});
        let (status, _, _) = send(app, post_json(&body)).await;
        assert!(status.is_client_error());
    }
}
