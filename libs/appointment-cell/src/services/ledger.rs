// libs/appointment-cell/src/services/ledger.rs
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use shared_database::DocumentClient;

use crate::models::BookingError;

const DOCTORS: &str = "doctors";

/// Store-backed slot ledger. Every mutation is a single conditional update
/// against the doctor document, so two requests racing for the same
/// (date, time) cannot both win: the filter carries the "time label not yet
/// present" condition and the store applies filter + update atomically.
pub struct SlotLedgerService {
    db: Arc<DocumentClient>,
}

impl SlotLedgerService {
    pub fn new(db: Arc<DocumentClient>) -> Self {
        Self { db }
    }

    fn slot_path(date: &str) -> String {
        format!("slots_booked.{}", date)
    }

    pub async fn is_reserved(
        &self,
        doc_id: &str,
        date: &str,
        time: &str,
    ) -> Result<bool, BookingError> {
        let mut filter = json!({ "_id": doc_id });
        filter[Self::slot_path(date)] = json!(time);

        let found = self
            .db
            .find_one(DOCTORS, filter)
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        Ok(found.is_some())
    }

    /// Reserve (doc_id, date, time). Fails with `SlotUnavailable` when the
    /// time label is already present for that date; the ledger is untouched
    /// in that case. The matched write IS the persistence step.
    pub async fn reserve(&self, doc_id: &str, date: &str, time: &str) -> Result<(), BookingError> {
        debug!("Reserving slot {} {} for doctor {}", date, time, doc_id);

        let mut filter = json!({ "_id": doc_id });
        filter[Self::slot_path(date)] = json!({ "$ne": time });

        let mut push = json!({});
        push[Self::slot_path(date)] = json!(time);
        let update = json!({ "$push": push });

        let result = self
            .db
            .update_one(DOCTORS, filter, update)
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        if result.matched_count == 0 {
            warn!(
                "Slot {} {} already reserved for doctor {}",
                date, time, doc_id
            );
            return Err(BookingError::SlotUnavailable);
        }

        Ok(())
    }

    /// Release (doc_id, date, time). Idempotent: a missing doctor, date or
    /// time label is a silent no-op, never an error, so a cancellation
    /// interrupted after a partial failure can simply be retried.
    pub async fn release(&self, doc_id: &str, date: &str, time: &str) -> Result<(), BookingError> {
        debug!("Releasing slot {} {} for doctor {}", date, time, doc_id);

        let mut pull = json!({});
        pull[Self::slot_path(date)] = json!(time);
        let update = json!({ "$pull": pull });

        let result = self
            .db
            .update_one(DOCTORS, json!({ "_id": doc_id }), update)
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        if result.matched_count == 0 {
            warn!("Release for unknown doctor {} ignored", doc_id);
        }

        Ok(())
    }
}
