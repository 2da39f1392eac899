// alife-master: Big-bang configuration

use serde::{Deserialize, Serialize};

use crate::error::{MasterError, MasterResult};

/// Parameters of a freshly spawned universe, read from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BigBangConfig {
    pub spawn_dimension: SpawnDimension,
    pub energy_level: u64,
    pub cell_amount: u64,
    pub dna_length_range: DnaLengthRange,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpawnDimension {
    pub start: Vector,
    pub end: Vector,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnaLengthRange {
    pub min: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl BigBangConfig {
    pub fn from_path(path: &str) -> MasterResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MasterError::Config(format!("failed to read big bang config {path}: {e}"))
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            MasterError::Config(format!("failed to parse big bang config {path}: {e}"))
        })
    }

    pub fn to_request(&self) -> alife_proto::BigBangRequest {
        alife_proto::BigBangRequest {
            spawn_dimension: Some(alife_proto::SpawnDimension {
                start: Some(self.spawn_dimension.start.into()),
                end: Some(self.spawn_dimension.end.into()),
            }),
            energy_level: self.energy_level,
            cell_amount: self.cell_amount,
            dna_length_range: Some(alife_proto::DnaLengthRange {
                min: self.dna_length_range.min,
                max: self.dna_length_range.max,
            }),
        }
    }
}

impl From<Vector> for alife_proto::Vector {
    fn from(v: Vector) -> Self {
        alife_proto::Vector::new(v.x, v.y, v.z)
    }
}
