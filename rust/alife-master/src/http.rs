// alife-master: Viewer and metrics HTTP surface

use std::future::Future;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::error;

use crate::error::MasterResult;
use crate::metrics::MasterMetrics;
use crate::websocket::ViewerHub;

#[derive(Clone)]
struct HttpState {
    hub: Arc<ViewerHub>,
    metrics: Arc<MasterMetrics>,
}

pub fn router(hub: Arc<ViewerHub>, metrics: Arc<MasterMetrics>) -> Router {
    Router::new()
        .route("/", get(viewer_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(HttpState { hub, metrics })
}

/// Upgrade a viewer to a websocket and hand it to the hub.
async fn viewer_handler(
    upgrade: WebSocketUpgrade,
    State(state): State<HttpState>,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| async move {
        state.hub.add(socket).await;
    })
}

async fn metrics_handler(State(state): State<HttpState>) -> impl IntoResponse {
    match state.metrics.encode_text() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Bind the viewer/metrics listener. Split from serving so bind failures can
/// abort startup.
pub async fn bind(port: u16) -> MasterResult<TcpListener> {
    Ok(TcpListener::bind(("0.0.0.0", port)).await?)
}

pub async fn serve(
    listener: TcpListener,
    hub: Arc<ViewerHub>,
    metrics: Arc<MasterMetrics>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> MasterResult<()> {
    axum::serve(listener, router(hub, metrics))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
