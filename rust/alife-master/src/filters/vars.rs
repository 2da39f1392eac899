// alife-master: Filter operands

use alife_proto::Cell;

/// Which cell coordinate a filter side reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coordinate {
    X,
    Y,
    Z,
}

/// One side of a filter, compiled once from its textual definition.
///
/// Invalid sides are retained so evaluation can name them in warnings.
#[derive(Debug, Clone, PartialEq)]
pub enum Var {
    Number(f32),
    Coordinate(Coordinate),
    Invalid { value: String, kind: String },
}

impl Var {
    pub fn compile(value: &str, kind: &str) -> Var {
        match kind {
            "number" => match value.parse::<f32>() {
                Ok(number) => Var::Number(number),
                Err(_) => Var::invalid(value, "number"),
            },
            "coordinate" => match value {
                "cell.pos.x" => Var::Coordinate(Coordinate::X),
                "cell.pos.y" => Var::Coordinate(Coordinate::Y),
                "cell.pos.z" => Var::Coordinate(Coordinate::Z),
                _ => Var::invalid(value, "coordinate"),
            },
            _ => Var::invalid(value, kind),
        }
    }

    fn invalid(value: &str, kind: &str) -> Var {
        Var::Invalid {
            value: value.to_string(),
            kind: kind.to_string(),
        }
    }

    /// Resolve against a cell; coordinate sides read the cell's position.
    pub fn eval(&self, cell: &Cell) -> Var {
        match self {
            Var::Coordinate(coordinate) => {
                let pos = cell.pos.clone().unwrap_or_default();
                Var::Number(match coordinate {
                    Coordinate::X => pos.x,
                    Coordinate::Y => pos.y,
                    Coordinate::Z => pos.z,
                })
            }
            other => other.clone(),
        }
    }

    pub fn valid(&self) -> bool {
        !matches!(self, Var::Invalid { .. })
    }

    pub fn less_than(&self, other: &Var) -> bool {
        match (self, other) {
            (Var::Number(left), Var::Number(right)) => left < right,
            _ => false,
        }
    }

    pub fn greater_than(&self, other: &Var) -> bool {
        match (self, other) {
            (Var::Number(left), Var::Number(right)) => left > right,
            _ => false,
        }
    }

    pub fn equal(&self, other: &Var) -> bool {
        match (self, other) {
            // Exact comparison on 32-bit floats; callers supply literals.
            (Var::Number(left), Var::Number(right)) => left == right,
            _ => false,
        }
    }
}
