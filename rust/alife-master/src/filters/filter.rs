// alife-master: Single filter compilation and evaluation

use alife_proto::Cell;
use serde::{Deserialize, Serialize};

use super::vars::Var;

/// Wire format of one filter, as sent by viewers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub left_hand: String,
    pub left_hand_type: String,
    pub operator: String,
    pub right_hand: String,
    pub right_hand_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Invalid,
    LessThan,
    GreaterThan,
    Equal,
}

/// A compiled filter. Both sides are compiled up front; invalid sides and
/// operators survive compilation so evaluation can warn about them.
#[derive(Debug, Clone)]
pub struct Filter {
    left: Var,
    right: Var,
    operator: Operator,
}

impl Filter {
    pub fn new(definition: &FilterDefinition) -> Self {
        let operator = match definition.operator.as_str() {
            "<" => Operator::LessThan,
            ">" => Operator::GreaterThan,
            "=" => Operator::Equal,
            _ => Operator::Invalid,
        };

        Self {
            left: Var::compile(&definition.left_hand, &definition.left_hand_type),
            right: Var::compile(&definition.right_hand, &definition.right_hand_type),
            operator,
        }
    }

    /// Whether the cell passes this filter, along with warnings naming any
    /// invalid side or operator.
    pub fn eval(&self, cell: &Cell) -> (bool, Vec<String>) {
        let mut warnings = Vec::new();

        let left = self.left.eval(cell);
        if let Var::Invalid { value, kind } = &left {
            warnings.push(format!("left hand {{{value} {kind}}} is invalid"));
        }
        let right = self.right.eval(cell);
        if let Var::Invalid { value, kind } = &right {
            warnings.push(format!("right hand {{{value} {kind}}} is invalid"));
        }

        let passes = match self.operator {
            Operator::LessThan => left.less_than(&right),
            Operator::GreaterThan => left.greater_than(&right),
            Operator::Equal => left.equal(&right),
            Operator::Invalid => {
                warnings.push("operator is invalid".to_string());
                false
            }
        };

        (passes, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(
        left: &str,
        left_type: &str,
        operator: &str,
        right: &str,
        right_type: &str,
    ) -> FilterDefinition {
        FilterDefinition {
            left_hand: left.to_string(),
            left_hand_type: left_type.to_string(),
            operator: operator.to_string(),
            right_hand: right.to_string(),
            right_hand_type: right_type.to_string(),
        }
    }

    #[test]
    fn number_vars_on_both_sides() {
        let filter = Filter::new(&definition("30", "number", "<", "42", "number"));
        let (passed, warnings) = filter.eval(&Cell::default());
        assert!(passed);
        assert!(warnings.is_empty());
    }

    #[test]
    fn coordinate_var_on_one_side() {
        let filter = Filter::new(&definition("cell.pos.x", "coordinate", "<", "42", "number"));
        let (passed, warnings) = filter.eval(&Cell::at("1", 1.0, 2.0, 3.0));
        assert!(passed);
        assert!(warnings.is_empty());
    }

    #[test]
    fn coordinate_vars_on_both_sides() {
        let filter = Filter::new(&definition(
            "cell.pos.x",
            "coordinate",
            "<",
            "cell.pos.y",
            "coordinate",
        ));
        let (passed, warnings) = filter.eval(&Cell::at("1", 1.0, 2.0, 3.0));
        assert!(passed);
        assert!(warnings.is_empty());
    }

    #[test]
    fn incorrect_definition_produces_warnings() {
        let filter = Filter::new(&definition(
            "celll.pos.x",
            "cordinate",
            "foo",
            "cell.pos.y",
            "unmber",
        ));
        let (passed, warnings) = filter.eval(&Cell::at("1", 1.0, 2.0, 3.0));
        assert!(!passed);
        assert_eq!(
            warnings,
            vec![
                "left hand {celll.pos.x cordinate} is invalid".to_string(),
                "right hand {cell.pos.y unmber} is invalid".to_string(),
                "operator is invalid".to_string(),
            ],
        );
    }

    #[test]
    fn evaluation_is_pure() {
        let filter = Filter::new(&definition("cell.pos.z", "coordinate", "=", "3", "number"));
        let cell = Cell::at("1", 1.0, 2.0, 3.0);

        let first = filter.eval(&cell);
        let second = filter.eval(&cell);
        assert_eq!(first, second);
        assert!(first.0);
    }
}
