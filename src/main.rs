mod api;
mod catalog;
mod config;
mod idempotency;
mod metrics;
mod models;
mod photos;
mod routes;
mod sessions;
mod wizard;

use api::{HttpCategorySource, HttpListingApi};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use catalog::{CategorySource, CategoryTree, categories::StaticCategorySource};
use config::CategorySourceKind;
use eyre::WrapErr;
use idempotency::IdempotencyCache;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use routes::AppState;
use serde_json::json;
use sessions::SessionStore;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "wizard.api", "server crashed: {err:?}");
    }
}

async fn run() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let tree = load_category_tree().await?;
    info!(target = "wizard.api", categories = tree.nodes().len(), "category tree ready");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .wrap_err("installing prometheus recorder")?;
    let idempotency =
        IdempotencyCache::from_url(config::redis_url(), config::idempotency_ttl_secs());
    let state = AppState {
        sessions: SessionStore::new(tree),
        api: Arc::new(HttpListingApi::from_env()),
        idempotency,
    };
    let _sweeper = state.sessions.spawn_sweeper(*config::SESSION_IDLE_TTL);

    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .with_state(prometheus_handle)
        .merge(routes::router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config::body_limit()));

    let addr: SocketAddr = ([0, 0, 0, 0], config::port()).into();
    info!(target = "wizard.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("binding {addr}"))?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// The tree is fetched once at start-up and shared by every session.
async fn load_category_tree() -> eyre::Result<CategoryTree> {
    let tree = match *config::CATEGORY_SOURCE {
        CategorySourceKind::Static => StaticCategorySource.fetch_tree().await,
        CategorySourceKind::Remote => HttpCategorySource::from_env().fetch_tree().await,
    };
    let tree = tree.wrap_err("loading category tree")?;
    if tree.is_empty() {
        eyre::bail!("category tree is empty");
    }
    Ok(tree)
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "listing-wizard-rs",
    }))
}

/// Prometheus exposition, guarded by `X-Metrics-Key` when `METRICS_KEY` is set.
async fn metrics_endpoint(State(handle): State<PrometheusHandle>, headers: HeaderMap) -> Response {
    if let Some(secret) = config::metrics_key() {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_service_name() {
        let app: Router = Router::new().route("/health", get(health));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["service"], "listing-wizard-rs");
    }

    #[tokio::test]
    async fn static_category_source_is_the_default() {
        let tree = load_category_tree().await.expect("tree");
        assert!(tree.get("201").is_some());
    }
}
