// alife-master: Filter sets

use alife_proto::Cell;

use super::filter::{Filter, FilterDefinition};

/// Everything a viewer has subscribed with; a cell must pass every filter.
#[derive(Debug, Clone, Default)]
pub struct FilterSet(Vec<Filter>);

impl FilterSet {
    pub fn from_definitions(definitions: &[FilterDefinition]) -> Self {
        Self(definitions.iter().map(Filter::new).collect())
    }

    /// Evaluate all filters; warnings concatenate in filter order.
    pub fn eval(&self, cell: &Cell) -> (bool, Vec<String>) {
        let mut passes = true;
        let mut warnings = Vec::new();

        for filter in &self.0 {
            let (filter_passed, mut filter_warnings) = filter.eval(cell);
            warnings.append(&mut filter_warnings);
            if !filter_passed {
                passes = false;
            }
        }

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
    fn a_cell_must_pass_every_filter() {
        let set = FilterSet::from_definitions(&[
            definition("cell.pos.x", "coordinate", "<", "42", "number"),
            definition("cell.pos.y", "coordinate", "<", "100", "number"),
        ]);

        let (passed, warnings) = set.eval(&Cell::at("1", 1.0, 2.0, 3.0));
        assert!(passed);
        assert!(warnings.is_empty());

        let (passed, warnings) = set.eval(&Cell::at("2", 100.0, 200.0, 300.0));
        assert!(!passed);
        assert!(warnings.is_empty());
    }

    #[test]
    fn warnings_concatenate_in_filter_order() {
        let set = FilterSet::from_definitions(&[
            definition("cell.pos.x", "coordinate", "foo", "42", "number"),
            definition("cell.pos.y", "coordinate", "<", "100", "nummber"),
        ]);

        let (passed, warnings) = set.eval(&Cell::at("1", 1.0, 2.0, 3.0));
        assert!(!passed);
        assert_eq!(
            warnings,
            vec![
                "operator is invalid".to_string(),
                "right hand {100 nummber} is invalid".to_string(),
            ],
        );
    }

    #[test]
    fn json_definitions_deserialize_with_snake_case_fields() {
        let raw = r#"[{
            "left_hand": "cell.pos.x",
            "left_hand_type": "coordinate",
            "operator": "<",
            "right_hand": "42",
            "right_hand_type": "number"
        }]"#;

        let definitions: Vec<FilterDefinition> = serde_json::from_str(raw).unwrap();
        let set = FilterSet::from_definitions(&definitions);
        let (passed, warnings) = set.eval(&Cell::at("1", 1.0, 2.0, 3.0));
        assert!(passed);
        assert!(warnings.is_empty());
    }
}
