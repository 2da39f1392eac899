// alife-master: Error types

use thiserror::Error;

/// Master result type
pub type MasterResult<T> = Result<T, MasterError>;

/// Master error types
#[derive(Debug, Error)]
pub enum MasterError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("gRPC error: {0}")]
    Grpc(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("metrics error: {0}")]
    Metrics(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<tonic::Status> for MasterError {
    fn from(status: tonic::Status) -> Self {
        MasterError::Grpc(status.message().to_string())
    }
}

impl From<tonic::transport::Error> for MasterError {
    fn from(err: tonic::transport::Error) -> Self {
        MasterError::Network(err.to_string())
    }
}

impl From<prometheus::Error> for MasterError {
    fn from(err: prometheus::Error) -> Self {
        MasterError::Metrics(err.to_string())
    }
}
