//! Dashboard: Axum web server over the run store.
//!
//! Serves a small REST API, an ingest endpoint for runs recorded elsewhere
//! (`rentwatch once --json` in a scheduled job), and a self-contained HTML
//! page. CORS is open for local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    response::Html,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub use routes::{AppState, DashboardState};

/// The embedded dashboard HTML (compiled into the binary).
const DASHBOARD_HTML: &str = include_str!("templates/index.html");

/// Bind `port` on all interfaces and serve until the server fails.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard listening on http://localhost:{port}");

    axum::serve(listener, app)
        .await
        .context("Dashboard server error")
}

/// Start the dashboard in a background task. Failures are logged; they do
/// not stop the caller.
pub fn spawn_dashboard(state: AppState, port: u16) {
    tokio::spawn(async move {
        if let Err(e) = serve(state, port).await {
            error!(error = %format!("{e:#}"), "Dashboard stopped");
        }
    });
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // API routes
        .route("/api/stats", get(routes::get_stats_summary))
        .route("/api/runs", get(routes::get_runs))
        .route("/api/ingest", post(routes::ingest_run))
        .route("/health", get(routes::health))
        // Dashboard HTML
        .route("/", get(serve_dashboard))
        .layer(cors)
        .with_state(state)
}

/// Serve the embedded HTML dashboard.
async fn serve_dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::temp_path;
    use crate::storage::{RunFilter, RunStore};
    use crate::types::{NewRun, RentalWindow};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn july() -> RentalWindow {
        RentalWindow::new("2026-07-01", "2026-07-08")
    }

    async fn test_state() -> AppState {
        let store = RunStore::open(temp_path()).await.unwrap();
        Arc::new(DashboardState::new(store, july(), 0.25))
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn ingest_request(json: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/ingest")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_router(test_state().await);
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let state = test_state().await;
        for per_day in [50.0, 60.0, 70.0, 80.0, 90.0] {
            state
                .store
                .append(&NewRun::new(july(), 7, Some(per_day * 7.0), 3, None))
                .await
                .unwrap();
        }
        let app = build_router(state);

        let resp = app
            .oneshot(Request::builder().uri("/api/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["count"], 5);
        assert_eq!(json["average"].as_f64(), Some(70.0));
        assert_eq!(json["median"].as_f64(), Some(70.0));
        assert_eq!(json["cheap_threshold"].as_f64(), Some(60.0));
        assert_eq!(json["latest"]["min_price_per_day"].as_f64(), Some(90.0));
    }

    #[tokio::test]
    async fn test_runs_endpoint_filters_by_query() {
        let state = test_state().await;
        let august = RentalWindow::new("2026-08-01", "2026-08-04");
        state
            .store
            .append(&NewRun::new(july(), 7, Some(210.0), 1, None))
            .await
            .unwrap();
        state
            .store
            .append(&NewRun::new(august, 3, Some(90.0), 1, None))
            .await
            .unwrap();
        let app = build_router(state);

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/api/runs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["pickup_date"], "2026-07-01");

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/runs?pickup_date=2026-08-01&dropoff_date=2026-08-04")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["min_price_per_day"].as_f64(), Some(30.0));
    }

    #[tokio::test]
    async fn test_ingest_accepts_once_json_shape() {
        let state = test_state().await;
        let app = build_router(state.clone());

        let resp = app
            .oneshot(ingest_request(
                r#"{
                    "run_at": "2026-05-01T06:00:00.000000Z",
                    "pickup_date": "2026-07-01",
                    "dropoff_date": "2026-07-08",
                    "rental_days": 7,
                    "min_total_price": 245.0,
                    "min_price_per_day": 1.0,
                    "num_offers": 12,
                    "url": "https://www.rentalcars.com/search-results?x=1"
                }"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let json = body_json(resp).await;
        assert_eq!(json["stored"], true);

        let runs = state.store.list(&RunFilter::window(&july())).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].min_price_per_day, Some(35.0));
        assert_eq!(runs[0].num_offers, 12);
    }

    #[tokio::test]
    async fn test_ingest_null_price_is_acknowledged() {
        let state = test_state().await;
        let app = build_router(state.clone());

        let resp = app
            .oneshot(ingest_request(
                r#"{"pickup_date":"2026-07-01","dropoff_date":"2026-07-08",
                    "rental_days":7,"min_total_price":null,"num_offers":0,"url":null}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["stored"], false);
        assert_eq!(state.store.count(&RunFilter::window(&july())).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ingest_rejects_malformed_body() {
        let app = build_router(test_state().await);
        let resp = app.oneshot(ingest_request(r#"{"rental_days": 7}"#)).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn test_ingest_negative_total_is_422_with_error() {
        let state = test_state().await;
        let app = build_router(state.clone());

        let resp = app
            .oneshot(ingest_request(
                r#"{"pickup_date":"2026-07-01","dropoff_date":"2026-07-08",
                    "rental_days":7,"min_total_price":-70.0,"num_offers":1}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().contains("min_total_price"));
        assert_eq!(state.store.count(&RunFilter::all()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dashboard_html() {
        let app = build_router(test_state().await);
        let resp = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("RENTWATCH"));
        assert!(html.contains("/api/stats"));
        // Run fields are written as text nodes, never parsed as markup.
        assert!(!html.contains("innerHTML"));
        assert!(html.contains("textContent"));
    }
}
