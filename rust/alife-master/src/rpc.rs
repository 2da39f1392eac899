// alife-master: CIS registration service

use std::future::Future;
use std::sync::Arc;

use alife_proto::cell_interaction_service_client::CellInteractionServiceClient;
use alife_proto::master_service_server::{MasterService, MasterServiceServer};
use alife_proto::{CisRegistration, RegistrationAck};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use crate::error::MasterResult;
use crate::metrics::MasterMetrics;
use crate::pool::CisClientPool;

/// Inbound side of the CIS handshake: workers announce an address and a
/// thread count, and the master dials one client per thread into the pool.
pub struct RegistrationService {
    pool: Arc<CisClientPool>,
    metrics: Arc<MasterMetrics>,
}

impl RegistrationService {
    pub fn new(pool: Arc<CisClientPool>, metrics: Arc<MasterMetrics>) -> Self {
        Self { pool, metrics }
    }
}

#[tonic::async_trait]
impl MasterService for RegistrationService {
    async fn register(
        &self,
        request: Request<CisRegistration>,
    ) -> Result<Response<RegistrationAck>, Status> {
        let registration = request.into_inner();
        let endpoint = if registration.address.starts_with("http") {
            registration.address.clone()
        } else {
            format!("http://{}", registration.address)
        };

        info!(
            address = %registration.address,
            threads = registration.threads,
            "CIS registering"
        );

        for _ in 0..registration.threads {
            match CellInteractionServiceClient::connect(endpoint.clone()).await {
                Ok(client) => {
                    self.pool.add(client).await;
                    self.metrics.cis_client_count.inc();
                }
                Err(error) => {
                    warn!(address = %endpoint, error = %error, "failed to dial registering CIS");
                }
            }
        }

        Ok(Response::new(RegistrationAck {}))
    }
}

/// Bind the registration listener. Split from serving so bind failures can
/// abort startup.
pub async fn bind(port: u16) -> MasterResult<TcpListener> {
    Ok(TcpListener::bind(("0.0.0.0", port)).await?)
}

pub async fn serve(
    listener: TcpListener,
    pool: Arc<CisClientPool>,
    metrics: Arc<MasterMetrics>,
    shutdown: impl Future<Output = ()>,
) -> MasterResult<()> {
    tonic::transport::Server::builder()
        .add_service(MasterServiceServer::new(RegistrationService::new(
            pool, metrics,
        )))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;
    Ok(())
}
