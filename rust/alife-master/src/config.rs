// alife-master: Configuration surface

use clap::Parser;

use crate::error::{MasterError, MasterResult};

/// Command line configuration of the master process.
#[derive(Debug, Clone, Parser)]
#[command(name = "alife-master", about = "Master orchestrator for the distributed artificial-life simulation")]
pub struct MasterConfig {
    /// Worker pool capacity. Must cover the peak number of concurrently
    /// borrowed CIS clients, otherwise returning a client can block.
    #[arg(long, env = "CONN_BUFFER_SIZE", default_value_t = 1000)]
    pub conn_buffer_size: usize,

    /// Port the CIS registration gRPC server listens on.
    #[arg(long, env = "GRPC_PORT", default_value_t = 3000)]
    pub grpc_port: u16,

    /// Port the viewer/metrics HTTP server listens on.
    #[arg(long, env = "HTTP_PORT", default_value_t = 4000)]
    pub http_port: u16,

    /// Edge length of the spatial partition lattice.
    #[arg(long, env = "BUCKET_WIDTH", default_value_t = 500)]
    pub bucket_width: u32,

    /// YAML file describing the universe to spawn when no state is loaded.
    #[arg(long, env = "BIG_BANG_CONFIG_PATH")]
    pub big_bang_config_path: Option<String>,

    /// Snapshot file to load instead of spawning a new universe.
    #[arg(long, env = "STATE_FILE_NAME")]
    pub state_file_name: Option<String>,

    /// Load the newest snapshot under states/ instead of spawning a new universe.
    #[arg(long, env = "LOAD_LATEST_STATE", default_value_t = false)]
    pub load_latest_state: bool,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            conn_buffer_size: 1000,
            grpc_port: 3000,
            http_port: 4000,
            bucket_width: 500,
            big_bang_config_path: None,
            state_file_name: None,
            load_latest_state: false,
        }
    }
}

impl MasterConfig {
    pub fn validate(&self) -> MasterResult<()> {
        if self.state_file_name.is_some() && self.load_latest_state {
            return Err(MasterError::Config(
                "--state-file-name and --load-latest-state are mutually exclusive".to_string(),
            ));
        }
        if self.bucket_width == 0 {
            return Err(MasterError::Config("bucket width must be positive".to_string()));
        }
        Ok(())
    }
}
