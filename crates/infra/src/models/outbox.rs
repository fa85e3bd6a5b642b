use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use catalog_core::AggregateId;
use catalog_events::{OutboxEvent, OutboxStatus};

use crate::error::StoreError;

pub const TABLE: &str = "outbox_events";

/// Column names of the `outbox_events` table.
pub mod columns {
    pub const EVENT_ID: &str = "event_id";
    pub const EVENT_TYPE: &str = "event_type";
    pub const AGGREGATE_ID: &str = "aggregate_id";
    pub const PAYLOAD: &str = "payload";
    pub const CREATED_AT: &str = "created_at";
    pub const STATUS: &str = "status";
    pub const PROCESSED_AT: &str = "processed_at";

    pub const ALL: [&str; 7] = [
        EVENT_ID,
        EVENT_TYPE,
        AGGREGATE_ID,
        PAYLOAD,
        CREATED_AT,
        STATUS,
        PROCESSED_AT,
    ];
}

/// One row of the `outbox_events` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxRow {
    pub event_id: Uuid,
    pub event_type: String,
    pub aggregate_id: Uuid,
    pub payload: JsonValue,
    pub created_at: DateTime<Utc>,
    pub status: String,
    /// Set by the relay once the record has been published.
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<&OutboxEvent> for OutboxRow {
    fn from(event: &OutboxEvent) -> Self {
        Self {
            event_id: event.id(),
            event_type: event.event_type().to_string(),
            aggregate_id: *event.aggregate_id().as_uuid(),
            payload: event.payload().clone(),
            created_at: event.created_at(),
            status: event.status().as_str().to_string(),
            processed_at: None,
        }
    }
}

impl OutboxRow {
    pub fn into_event(self) -> Result<OutboxEvent, StoreError> {
        let status = self
            .status
            .parse::<OutboxStatus>()
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(OutboxEvent::pending(
            self.event_id,
            self.event_type,
            AggregateId::from_uuid(self.aggregate_id),
            self.payload,
            self.created_at,
        )
        .with_status(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_keeps_record_fields() {
        let event = OutboxEvent::pending(
            Uuid::now_v7(),
            "product.created",
            AggregateId::new(),
            serde_json::json!({ "name": "Widget" }),
            Utc::now(),
        );

        let row = OutboxRow::from(&event);
        assert_eq!(row.status, "pending");
        assert!(row.processed_at.is_none());
        assert_eq!(row.into_event().unwrap(), event);
    }

    #[test]
    fn processed_rows_decode_with_their_status() {
        let event = OutboxEvent::pending(
            Uuid::now_v7(),
            "product.updated",
            AggregateId::new(),
            serde_json::json!({}),
            Utc::now(),
        );
        let mut row = OutboxRow::from(&event);
        row.status = "processed".to_string();
        row.processed_at = Some(Utc::now());

        assert_eq!(row.clone().into_event().unwrap().status(), OutboxStatus::Processed);

        row.status = "lost".to_string();
        assert!(matches!(row.into_event(), Err(StoreError::Decode(_))));
    }
}
