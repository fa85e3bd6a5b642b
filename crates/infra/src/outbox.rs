//! Outbox enrichment: domain event -> durable outbox record.

use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use catalog_core::AggregateId;
use catalog_events::{Event, OutboxEvent};
use catalog_products::{ProductEvent, format_decimal};

/// Build the pending outbox record for `event`.
///
/// The record gets a fresh time-ordered id and inherits the event's occurred-at instant.
pub fn enrich(aggregate_id: AggregateId, event: &ProductEvent) -> OutboxEvent {
    OutboxEvent::pending(
        Uuid::now_v7(),
        event.event_type(),
        aggregate_id,
        payload(event),
        event.occurred_at(),
    )
}

/// Type-specific payload. Variants this version does not know serialize to `{}`.
pub fn payload(event: &ProductEvent) -> JsonValue {
    match event {
        ProductEvent::ProductCreated(e) => json!({
            "product_id": e.product_id.to_string(),
            "name": e.name,
            "category": e.category,
        }),
        ProductEvent::DiscountApplied(e) => json!({
            "product_id": e.product_id.to_string(),
            "percentage": format_decimal(&e.percentage, 2),
            "start_date": e.starts_at.to_rfc3339(),
            "end_date": e.ends_at.to_rfc3339(),
        }),
        ProductEvent::ProductUpdated(e) => json!({ "product_id": e.product_id.to_string() }),
        ProductEvent::ProductActivated(e) => json!({ "product_id": e.product_id.to_string() }),
        ProductEvent::ProductDeactivated(e) => json!({ "product_id": e.product_id.to_string() }),
        ProductEvent::DiscountRemoved(e) => json!({ "product_id": e.product_id.to_string() }),
        _ => json!({}),
    }
}
