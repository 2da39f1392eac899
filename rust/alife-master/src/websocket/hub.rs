// alife-master: Viewer connection hub

use std::sync::Arc;

use alife_proto::Cell;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::stream::SplitStream;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::filters::FilterDefinition;
use crate::metrics::MasterMetrics;
use crate::websocket::ViewerConnection;

/// Holds all live viewer connections and prunes dead ones.
pub struct ViewerHub {
    connections: Mutex<Vec<Arc<ViewerConnection>>>,
    metrics: Arc<MasterMetrics>,
}

impl ViewerHub {
    pub fn new(metrics: Arc<MasterMetrics>) -> Arc<Self> {
        Arc::new(Self {
            connections: Mutex::new(Vec::new()),
            metrics,
        })
    }

    /// Adopt an upgraded socket: track it and start its reader task. The
    /// reader removes the connection from the hub on the first read error.
    pub async fn add(self: &Arc<Self>, socket: WebSocket) {
        let (sink, stream) = socket.split();
        let connection = Arc::new(ViewerConnection::new(sink));

        self.connections.lock().await.push(Arc::clone(&connection));
        self.metrics.websocket_connections_count.inc();
        info!("viewer connected");

        let hub = Arc::clone(self);
        tokio::spawn(async move {
            listen(stream, &connection).await;
            warn!("removing viewer connection after read failure or close");
            hub.remove(&connection).await;
        });
    }

    /// Send one filtered frame to every subscribed viewer. Connections whose
    /// write fails are assumed dead and dropped.
    pub async fn broadcast_cells(&self, cells: &[Cell]) {
        let mut connections = self.connections.lock().await;
        let mut alive = Vec::with_capacity(connections.len());

        for connection in connections.drain(..) {
            match connection.write_requested_cells(cells).await {
                Ok(()) => alive.push(connection),
                Err(error) => {
                    warn!(error = %error, "dropping viewer connection on write failure");
                    self.metrics.websocket_connections_count.dec();
                }
            }
        }

        *connections = alive;
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Close every connection; used on shutdown.
    pub async fn shutdown(&self) {
        let mut connections = self.connections.lock().await;
        for connection in connections.drain(..) {
            connection.close().await;
            self.metrics.websocket_connections_count.dec();
        }
    }

    async fn remove(&self, target: &Arc<ViewerConnection>) {
        let mut connections = self.connections.lock().await;
        let before = connections.len();
        connections.retain(|connection| !Arc::ptr_eq(connection, target));
        if connections.len() < before {
            self.metrics.websocket_connections_count.dec();
        }
    }
}

/// Reader loop: every text frame must be a JSON array of filter definitions;
/// a non-empty array replaces the connection's filter set. Any read or parse
/// failure ends the loop, which in turn removes the connection.
async fn listen(mut stream: SplitStream<WebSocket>, connection: &Arc<ViewerConnection>) {
    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(error) => {
                warn!(error = %error, "viewer read failed");
                return;
            }
        };

        match frame {
            WsMessage::Text(text) => {
                match serde_json::from_str::<Vec<FilterDefinition>>(&text) {
                    Ok(definitions) if !definitions.is_empty() => {
                        connection.replace_filter_set(&definitions);
                    }
                    Ok(_) => {}
                    Err(error) => {
                        warn!(error = %error, "viewer sent an unreadable filter frame");
                        return;
                    }
                }
            }
            WsMessage::Close(_) => return,
            // Pings are answered by the transport; other frames carry nothing.
            _ => {}
        }
    }
}
