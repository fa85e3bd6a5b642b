use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use catalog_core::AggregateId;

/// Processing state of an outbox record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    /// Written alongside the state change, not yet relayed.
    Pending,
    /// Relayed to downstream consumers.
    Processed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Processed => "processed",
        }
    }
}

impl core::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown outbox status '{0}'")]
pub struct UnknownOutboxStatus(pub String);

impl FromStr for OutboxStatus {
    type Err = UnknownOutboxStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxStatus::Pending),
            "processed" => Ok(OutboxStatus::Processed),
            other => Err(UnknownOutboxStatus(other.to_string())),
        }
    }
}

/// Durable record of "an event happened", persisted in the same transaction as the
/// state change that caused it.
///
/// Once written, the record is owned by the outbox store and lives independently of the
/// aggregate that produced it. A separate relay reads `Pending` records and publishes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEvent {
    id: Uuid,
    event_type: String,
    aggregate_id: AggregateId,
    payload: JsonValue,
    created_at: DateTime<Utc>,
    status: OutboxStatus,
}

impl OutboxEvent {
    /// A freshly enriched record, not yet relayed.
    pub fn pending(
        id: Uuid,
        event_type: impl Into<String>,
        aggregate_id: AggregateId,
        payload: JsonValue,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            event_type: event_type.into(),
            aggregate_id,
            payload,
            created_at,
            status: OutboxStatus::Pending,
        }
    }

    /// Rehydrate a stored record at whatever status the relay left it.
    pub fn with_status(mut self, status: OutboxStatus) -> Self {
        self.status = status;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> OutboxStatus {
        self.status
    }
}
