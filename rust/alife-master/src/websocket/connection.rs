// alife-master: One viewer connection

use alife_proto::Cell;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use crate::filters::{FilterDefinition, FilterSet};

/// Frame sent to a viewer once per committed step.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct Message {
    pub cells: Vec<Cell>,
    pub warnings: Vec<String>,
}

impl Message {
    /// Run the broadcast cells through a filter set, collecting the cells
    /// that pass and every warning the filters produce.
    pub fn build(cells: &[Cell], filter_set: &FilterSet) -> Self {
        let mut message = Message::default();
        for cell in cells {
            let (passes, mut warnings) = filter_set.eval(cell);
            message.warnings.append(&mut warnings);
            if passes {
                message.cells.push(cell.clone());
            }
        }
        message
    }
}

/// A viewer connection carrying its own filter set.
///
/// The filter lock isolates filter swaps from broadcast evaluation; the
/// write half has its own lock so broadcasts serialize against each other.
pub struct ViewerConnection {
    sink: AsyncMutex<SplitSink<WebSocket, WsMessage>>,
    filter_set: Mutex<Option<FilterSet>>,
}

impl ViewerConnection {
    pub fn new(sink: SplitSink<WebSocket, WsMessage>) -> Self {
        Self {
            sink: AsyncMutex::new(sink),
            filter_set: Mutex::new(None),
        }
    }

    /// Atomically replace the filter set with a freshly compiled one.
    pub fn replace_filter_set(&self, definitions: &[FilterDefinition]) {
        *self.filter_set.lock() = Some(FilterSet::from_definitions(definitions));
    }

    /// Filter the broadcast cells and write one frame. A viewer that has not
    /// sent a filter set yet is not subscribed and receives nothing.
    pub async fn write_requested_cells(&self, cells: &[Cell]) -> Result<(), axum::Error> {
        let message = {
            let filter_set = self.filter_set.lock();
            match filter_set.as_ref() {
                Some(filter_set) => Message::build(cells, filter_set),
                None => return Ok(()),
            }
        };

        let text = serde_json::to_string(&message).map_err(axum::Error::new)?;
        self.sink.lock().await.send(WsMessage::Text(text)).await
    }

    pub async fn close(&self) {
        let _ = self.sink.lock().await.send(WsMessage::Close(None)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterDefinition;

    fn x_below(limit: &str) -> FilterDefinition {
        FilterDefinition {
            left_hand: "cell.pos.x".to_string(),
            left_hand_type: "coordinate".to_string(),
            operator: "<".to_string(),
            right_hand: limit.to_string(),
            right_hand_type: "number".to_string(),
        }
    }

    #[test]
    fn build_keeps_only_passing_cells() {
        let cells = vec![
            Cell::at("near", 1.0, 0.0, 0.0),
            Cell::at("far", 100.0, 0.0, 0.0),
        ];
        let filter_set = FilterSet::from_definitions(&[x_below("42")]);

        let message = Message::build(&cells, &filter_set);
        assert_eq!(message.cells.len(), 1);
        assert_eq!(message.cells[0].id, "near");
        assert!(message.warnings.is_empty());
    }

    #[test]
    fn build_collects_warnings_per_cell() {
        let cells = vec![Cell::at("1", 1.0, 0.0, 0.0), Cell::at("2", 2.0, 0.0, 0.0)];
        let mut bad = x_below("42");
        bad.right_hand_type = "nummber".to_string();
        let filter_set = FilterSet::from_definitions(&[bad]);

        let message = Message::build(&cells, &filter_set);
        assert!(message.cells.is_empty());
        assert_eq!(message.warnings.len(), 2);
    }

    #[test]
    fn frames_serialize_with_cells_and_warnings_fields() {
        let message = Message {
            cells: vec![Cell::at("1", 1.0, 2.0, 3.0)],
            warnings: vec!["operator is invalid".to_string()],
        };

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.starts_with("{\"cells\":["));
        assert!(json.contains("\"warnings\":[\"operator is invalid\"]"));
    }
}
