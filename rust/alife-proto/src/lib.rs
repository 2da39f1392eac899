// alife-proto: Generated wire types and gRPC service stubs

mod gen {
    tonic::include_proto!("alife");
}

pub use gen::*;

impl Vector {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Cell {
    /// Cell at a position with an empty payload. Mostly useful in tests.
    pub fn at(id: impl Into<String>, x: f32, y: f32, z: f32) -> Self {
        Self {
            id: id.into(),
            pos: Some(Vector::new(x, y, z)),
            ..Default::default()
        }
    }
}

impl std::fmt::Display for BucketRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.bx, self.by, self.bz)
    }
}
