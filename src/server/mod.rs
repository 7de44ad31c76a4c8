//! Read-only dashboard API.
//!
//! Serves the artifact written by `bcp analyze`:
//!
//! - `GET /`                  plain-text banner
//! - `GET /api/prices`        the `prices` array, verbatim
//! - `GET /api/change-point`  the `change_point` object, verbatim
//!
//! The artifact is read once at startup into an immutable, shared state.
//! CORS admits a single configured origin (the dashboard front-end).

use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use crate::domain::ServeConfig;
use crate::error::AppError;

pub const BANNER: &str = "Brent Oil Price Dashboard API. Use /api/prices or /api/change-point.";

/// Loaded artifact. Sub-documents are kept as raw JSON and returned as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub prices: Value,
    pub change_point: Value,
}

impl DashboardState {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Err(AppError::NotFound {
                what: "Dashboard data",
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        let doc: Value = serde_json::from_str(&text)?;
        Self::from_value(doc)
    }

    pub fn from_value(mut doc: Value) -> Result<Self, AppError> {
        let Some(obj) = doc.as_object_mut() else {
            return Err(AppError::Schema("Dashboard data must be a JSON object.".to_string()));
        };
        let prices = obj
            .remove("prices")
            .filter(Value::is_array)
            .ok_or_else(|| AppError::Schema("Dashboard data lacks a `prices` array.".to_string()))?;
        let change_point = obj
            .remove("change_point")
            .filter(Value::is_object)
            .ok_or_else(|| AppError::Schema("Dashboard data lacks a `change_point` object.".to_string()))?;
        Ok(Self { prices, change_point })
    }
}

type SharedState = Arc<DashboardState>;

/// Build the API router for `state`, admitting CORS requests from `cors_origin` only.
pub fn router(state: SharedState, cors_origin: &str) -> Result<Router, AppError> {
    let origin: HeaderValue = cors_origin
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("Invalid CORS origin '{cors_origin}'.")))?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([origin]))
        .allow_methods([Method::GET]);

    Ok(Router::new()
        .route("/", get(banner))
        .route("/api/prices", get(prices))
        .route("/api/change-point", get(change_point))
        .with_state(state)
        .layer(cors))
}

async fn banner() -> &'static str {
    BANNER
}

async fn prices(State(state): State<SharedState>) -> Json<Value> {
    Json(state.prices.clone())
}

async fn change_point(State(state): State<SharedState>) -> Json<Value> {
    Json(state.change_point.clone())
}

/// Load the artifact, bind `config.addr` and serve until Ctrl-C.
pub async fn serve(config: ServeConfig) -> Result<(), AppError> {
    let state = Arc::new(DashboardState::load(&config.data_path)?);
    let app = router(state.clone(), &config.cors_origin)?;

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .map_err(|e| AppError::Server(format!("Failed to bind {}: {e}", config.addr)))?;
    info!(
        addr = %config.addr,
        data = %config.data_path.display(),
        prices = state.prices.as_array().map_or(0, Vec::len),
        cors_origin = %config.cors_origin,
        "dashboard API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Server(e.to_string()))?;

    info!("dashboard API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until the process is killed.
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    const ORIGIN: &str = "http://localhost:5173";

    fn state() -> SharedState {
        Arc::new(
            DashboardState::from_value(json!({
                "prices": [
                    {"Date": "2020-03-02", "Price": 51.9, "Log_Returns": null},
                    {"Date": "2020-03-03", "Price": 51.86, "Log_Returns": -0.000771}
                ],
                "change_point": {
                    "change_point_date": "2020-03-09",
                    "associated_event": "Price war",
                    "event_date": "2020-03-08",
                    "event_description": "OPEC+ deal collapses",
                    "log_return_change": -0.0123
                }
            }))
            .unwrap(),
        )
    }

    async fn get_json(uri: &str, origin: &str) -> (StatusCode, Option<HeaderValue>, Value) {
        let app = router(state(), ORIGIN).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header(header::ORIGIN, origin)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let allow = response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).cloned();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, allow, body)
    }

    #[tokio::test]
    async fn prices_are_returned_verbatim() {
        let (status, allow, body) = get_json("/api/prices", ORIGIN).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(allow.unwrap(), ORIGIN);
        assert_eq!(body, state().prices);
        assert!(body[0]["Log_Returns"].is_null());
    }

    #[tokio::test]
    async fn change_point_is_returned_verbatim() {
        let (status, _, body) = get_json("/api/change-point", ORIGIN).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["associated_event"], "Price war");
        assert_eq!(body["log_return_change"], -0.0123);
    }

    #[tokio::test]
    async fn other_origins_get_no_cors_header() {
        let (status, allow, _) = get_json("/api/prices", "http://evil.example").await;
        assert_eq!(status, StatusCode::OK);
        assert!(allow.is_none());
    }

    #[tokio::test]
    async fn banner_and_unknown_routes() {
        let app = router(state(), ORIGIN).unwrap();
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], BANNER.as_bytes());

        let response = app
            .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn writes_are_not_allowed() {
        let app = router(state(), ORIGIN).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/prices")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn load_reports_missing_and_malformed_artifacts() {
        let dir = std::env::temp_dir().join(format!("bcp-server-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        assert!(matches!(
            DashboardState::load(&dir.join("absent.json")),
            Err(AppError::NotFound { .. })
        ));

        let path = dir.join("bad.json");
        std::fs::write(&path, r#"{"prices": {}, "change_point": {}}"#).unwrap();
        assert!(matches!(DashboardState::load(&path), Err(AppError::Schema(_))));

        std::fs::write(&path, r#"{"prices": []}"#).unwrap();
        assert!(matches!(DashboardState::load(&path), Err(AppError::Schema(_))));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(DashboardState::load(&path), Err(AppError::Json(_))));

        std::fs::write(&path, r#"{"prices": [], "change_point": {"x": 1}}"#).unwrap();
        let state = DashboardState::load(&path).unwrap();
        assert_eq!(state.change_point["x"], 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn invalid_origin_is_rejected() {
        assert!(matches!(
            router(state(), "bad\norigin"),
            Err(AppError::InvalidInput(_))
        ));
    }
}
