//! Bulk writes: per-card field updates and card moves.
//!
//! Cards are independent of each other. Per-card failures are reported as
//! outcomes, never as errors, and outcomes keep the input order. Cards are
//! processed with bounded concurrency; the fields of one card are written
//! sequentially and the first failing field stops that card.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use openpipes_core::template::{RecordUpdate, UpdateBatch};
use serde::Serialize;
use serde_json::{json, Value};

use crate::client::{GraphqlResponse, GraphqlTransport};
use crate::queries::{MOVE_CARD_TO_PHASE, UPDATE_CARD_FIELD};

/// Default number of cards processed at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of applying one record's updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    pub card_id: String,
    pub success: bool,
    pub message: String,
    /// Fields written before the record finished or failed.
    pub fields_applied: usize,
}

/// Result of moving one card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveOutcome {
    pub card_id: String,
    pub success: bool,
    pub message: String,
}

/// Aggregate result of a move. `success` is false only when no card moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveSummary {
    pub success: bool,
    pub message: String,
    pub results: Vec<MoveOutcome>,
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Applies update batches and card moves through a [`GraphqlTransport`].
#[derive(Clone)]
pub struct BulkUpdater {
    transport: Arc<dyn GraphqlTransport>,
    concurrency: usize,
}

impl BulkUpdater {
    /// `concurrency` is clamped to at least 1.
    pub fn new(transport: Arc<dyn GraphqlTransport>, concurrency: usize) -> Self {
        Self {
            transport,
            concurrency: concurrency.max(1),
        }
    }

    /// Apply every record of `batch`, one outcome per record in batch order.
    pub async fn apply_field_updates(&self, batch: &UpdateBatch, token: &str) -> Vec<RecordOutcome> {
        // Owned items keep the stream `Send` for axum handlers.
        let outcomes: Vec<RecordOutcome> = stream::iter(batch.records.iter().cloned())
            .map(|record| async move { self.update_record(&record, token).await })
            .buffered(self.concurrency)
            .collect()
            .await;

        let failed = outcomes.iter().filter(|o| !o.success).count();
        tracing::info!(
            records = outcomes.len(),
            failed,
            "Applied field updates"
        );
        outcomes
    }

    /// Move every card to `destination_phase_id`.
    pub async fn move_records(
        &self,
        card_ids: &[String],
        destination_phase_id: &str,
        token: &str,
    ) -> MoveSummary {
        let results: Vec<MoveOutcome> = stream::iter(card_ids.to_vec())
            .map(|card_id| async move {
                self.move_card(&card_id, destination_phase_id, token).await
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let moved = results.iter().filter(|r| r.success).count();
        tracing::info!(
            cards = results.len(),
            moved,
            destination_phase_id,
            "Moved cards"
        );

        if moved == 0 {
            MoveSummary {
                success: false,
                message: "No cards could be moved".into(),
                results,
            }
        } else {
            MoveSummary {
                success: true,
                message: format!("{moved} of {} cards moved", results.len()),
                results,
            }
        }
    }

    // ---- private helpers ----

    async fn update_record(&self, record: &RecordUpdate, token: &str) -> RecordOutcome {
        let card_id = record.record_id.clone();
        let pending: Vec<(&str, &str)> = record
            .updates
            .iter()
            .map(|(field_id, value)| (field_id.as_str(), value.trim()))
            .filter(|(_, value)| !value.is_empty())
            .collect();

        if pending.is_empty() {
            return RecordOutcome {
                card_id,
                success: true,
                message: "No changes requested".into(),
                fields_applied: 0,
            };
        }

        let mut fields_applied = 0;
        for (field_id, value) in pending {
            if let Err(message) = self.update_field(&card_id, field_id, value, token).await {
                tracing::warn!(card_id = %card_id, field_id, error = %message, "Card update failed");
                return RecordOutcome {
                    card_id,
                    success: false,
                    message,
                    fields_applied,
                };
            }
            fields_applied += 1;
        }

        RecordOutcome {
            card_id,
            success: true,
            message: "All fields updated successfully".into(),
            fields_applied,
        }
    }

    async fn update_field(
        &self,
        card_id: &str,
        field_id: &str,
        value: &str,
        token: &str,
    ) -> Result<(), String> {
        let variables = json!({
            "input": {
                "card_id": card_id,
                "field_id": field_id,
                "new_value": value,
            }
        });

        let response = self
            .transport
            .execute(&UPDATE_CARD_FIELD, variables, token)
            .await
            .map_err(|e| format!("Error updating card fields: {e}"))?;
        check_errors(&response)?;

        let success = payload(&response, "updateCardField")?
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !success {
            return Err(format!("Failed to update field {field_id} for card {card_id}"));
        }
        Ok(())
    }

    async fn move_card(&self, card_id: &str, destination_phase_id: &str, token: &str) -> MoveOutcome {
        match self.try_move_card(card_id, destination_phase_id, token).await {
            Ok(()) => MoveOutcome {
                card_id: card_id.to_string(),
                success: true,
                message: format!("Card {card_id} moved successfully"),
            },
            Err(message) => {
                tracing::warn!(card_id, error = %message, "Card move failed");
                MoveOutcome {
                    card_id: card_id.to_string(),
                    success: false,
                    message,
                }
            }
        }
    }

    async fn try_move_card(
        &self,
        card_id: &str,
        destination_phase_id: &str,
        token: &str,
    ) -> Result<(), String> {
        let variables = json!({
            "input": {
                "card_id": card_id,
                "destination_phase_id": destination_phase_id,
            }
        });

        let response = self
            .transport
            .execute(&MOVE_CARD_TO_PHASE, variables, token)
            .await
            .map_err(|e| format!("Error moving card: {e}"))?;
        check_errors(&response)?;

        let moved = payload(&response, "moveCardToPhase")?;

        // Not selected by `MOVE_CARD_TO_PHASE`; honoured when present.
        if let Some(errors) = moved.get("errors").and_then(Value::as_array) {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str).or_else(|| e.as_str()))
                .collect();
            if !errors.is_empty() {
                return Err(format!("Pipefy API error: {}", messages.join("; ")));
            }
        }

        match moved.get("card") {
            Some(card) if !card.is_null() => Ok(()),
            _ => Err(format!("Card {card_id} was not moved")),
        }
    }
}

/// Top-level GraphQL errors as a per-item message.
fn check_errors(response: &GraphqlResponse) -> Result<(), String> {
    if response.errors.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "Pipefy API error: {}",
            response.error_messages().join("; ")
        ))
    }
}

/// `data[key]`, non-null, or an "unexpected structure" message.
fn payload<'a>(response: &'a GraphqlResponse, key: &str) -> Result<&'a Value, String> {
    response
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .filter(|value| !value.is_null())
        .ok_or_else(|| {
            format!(
                "Unexpected response structure from Pipefy API: missing `{key}` in {}",
                response.data.as_ref().map(Value::to_string).unwrap_or_else(|| "null".into())
            )
        })
}
