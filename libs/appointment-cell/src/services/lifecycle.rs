// libs/appointment-cell/src/services/lifecycle.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::DocumentClient;

use crate::models::{
    Appointment, AppointmentStatus, BookAppointmentRequest, BookingError, Doctor, DoctorDashboard,
};
use crate::services::ledger::SlotLedgerService;

const APPOINTMENTS: &str = "appointments";
const DOCTORS: &str = "doctors";
const USERS: &str = "users";

/// Creates, cancels, reschedules, completes and deletes appointments,
/// keeping the slot ledger consistent with appointment state on every
/// transition. This is the only writer of the ledger.
pub struct AppointmentLifecycleService {
    db: Arc<DocumentClient>,
    ledger: SlotLedgerService,
}

impl AppointmentLifecycleService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(DocumentClient::new(config)))
    }

    pub fn with_client(db: Arc<DocumentClient>) -> Self {
        Self {
            ledger: SlotLedgerService::new(Arc::clone(&db)),
            db,
        }
    }

    pub fn ledger(&self) -> &SlotLedgerService {
        &self.ledger
    }

    /// Book a slot with `doc_id` for `user_id`. The reservation is taken
    /// first; if the appointment record cannot be written afterwards the
    /// reservation is rolled back so no slot leaks.
    pub async fn book(
        &self,
        user_id: &str,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, BookingError> {
        info!(
            "Booking appointment for user {} with doctor {} at {} {}",
            user_id, request.doc_id, request.slot_date, request.slot_time
        );

        let doctor: Doctor = self
            .db
            .find_one_as(DOCTORS, json!({ "_id": request.doc_id }))
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?
            .ok_or(BookingError::DoctorNotFound)?;

        if !doctor.available {
            return Err(BookingError::DoctorNotAvailable);
        }

        let user_data = self.fetch_user_snapshot(user_id).await?;

        self.ledger
            .reserve(&request.doc_id, &request.slot_date, &request.slot_time)
            .await?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            doc_id: request.doc_id.clone(),
            slot_date: request.slot_date.clone(),
            slot_time: request.slot_time.clone(),
            amount: doctor.fees,
            user_data,
            doc_data: doctor.snapshot(),
            status: AppointmentStatus::Booked,
            paid: false,
            created_at: now,
            updated_at: now,
        };

        let document = serde_json::to_value(&appointment)
            .map_err(|e| BookingError::Database(e.to_string()))?;

        if let Err(e) = self.db.insert_one(APPOINTMENTS, document).await {
            error!("Appointment insert failed after reservation: {}", e);
            if let Err(rollback) = self
                .ledger
                .release(&request.doc_id, &request.slot_date, &request.slot_time)
                .await
            {
                error!("Reservation rollback failed: {}", rollback);
            }
            return Err(BookingError::Database(e.to_string()));
        }

        info!("Appointment {} booked", appointment.id);
        Ok(appointment)
    }

    /// Cancel on behalf of the owning user. Idempotent: cancelling an
    /// already-cancelled appointment succeeds and leaves the ledger alone
    /// (the release below finds nothing to remove).
    pub async fn cancel(
        &self,
        requester_id: &str,
        appointment_id: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get(appointment_id).await?;
        if appointment.user_id != requester_id {
            return Err(BookingError::Unauthorized);
        }
        self.cancel_inner(appointment).await
    }

    /// Cancel on behalf of the treating doctor.
    pub async fn cancel_by_doctor(
        &self,
        doc_id: &str,
        appointment_id: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get(appointment_id).await?;
        if appointment.doc_id != doc_id {
            return Err(BookingError::Unauthorized);
        }
        self.cancel_inner(appointment).await
    }

    async fn cancel_inner(&self, appointment: Appointment) -> Result<Appointment, BookingError> {
        debug!("Cancelling appointment {}", appointment.id);

        if appointment.status == AppointmentStatus::Completed {
            return Err(BookingError::InvalidStatusTransition(appointment.status));
        }

        self.update_fields(
            &appointment.id,
            json!({ "status": AppointmentStatus::Cancelled }),
        )
        .await?;

        // Runs even when the appointment was already cancelled: release is
        // idempotent and this heals a cancel interrupted between the two
        // writes.
        self.ledger
            .release(
                &appointment.doc_id,
                &appointment.slot_date,
                &appointment.slot_time,
            )
            .await?;

        info!("Appointment {} cancelled", appointment.id);
        self.get(&appointment.id).await
    }

    /// Move an appointment to a new slot. The new slot is reserved before
    /// the old one is released; a cancelled appointment no longer holds its
    /// old slot, so only the reserve side applies to it. Rescheduling
    /// un-cancels.
    pub async fn reschedule(
        &self,
        requester_id: &str,
        appointment_id: &str,
        new_date: &str,
        new_time: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get(appointment_id).await?;
        if appointment.user_id != requester_id {
            return Err(BookingError::Unauthorized);
        }
        if appointment.status == AppointmentStatus::Completed {
            return Err(BookingError::InvalidStatusTransition(appointment.status));
        }

        let holds_old_slot = appointment.holds_slot();
        let same_slot =
            appointment.slot_date == new_date && appointment.slot_time == new_time;

        if !(same_slot && holds_old_slot) {
            self.ledger
                .reserve(&appointment.doc_id, new_date, new_time)
                .await?;
        }

        if holds_old_slot && !same_slot {
            self.ledger
                .release(
                    &appointment.doc_id,
                    &appointment.slot_date,
                    &appointment.slot_time,
                )
                .await?;
        }

        let update = json!({
            "slot_date": new_date,
            "slot_time": new_time,
            "status": AppointmentStatus::Booked,
        });

        if let Err(e) = self.update_fields(&appointment.id, update).await {
            error!("Reschedule update failed, restoring ledger: {}", e);
            if !(same_slot && holds_old_slot) {
                let _ = self
                    .ledger
                    .release(&appointment.doc_id, new_date, new_time)
                    .await;
            }
            if holds_old_slot && !same_slot {
                let _ = self
                    .ledger
                    .reserve(
                        &appointment.doc_id,
                        &appointment.slot_date,
                        &appointment.slot_time,
                    )
                    .await;
            }
            return Err(e);
        }

        info!(
            "Appointment {} rescheduled to {} {}",
            appointment.id, new_date, new_time
        );
        self.get(&appointment.id).await
    }

    /// Mark a visit as completed. Only the treating doctor may do this, and
    /// a cancelled appointment cannot be completed. No ledger effect.
    pub async fn complete(
        &self,
        doc_id: &str,
        appointment_id: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get(appointment_id).await?;
        if appointment.doc_id != doc_id {
            return Err(BookingError::Unauthorized);
        }

        match appointment.status {
            AppointmentStatus::Completed => Ok(appointment),
            AppointmentStatus::Cancelled => {
                Err(BookingError::InvalidStatusTransition(appointment.status))
            }
            AppointmentStatus::Booked => {
                self.update_fields(
                    &appointment.id,
                    json!({ "status": AppointmentStatus::Completed }),
                )
                .await?;
                info!("Appointment {} completed", appointment.id);
                self.get(&appointment.id).await
            }
        }
    }

    /// Hard-delete the record. The slot is released first when the
    /// appointment still holds it, so a deleted booking frees its slot.
    pub async fn delete(
        &self,
        requester_id: &str,
        appointment_id: &str,
    ) -> Result<(), BookingError> {
        let appointment = self.get(appointment_id).await?;
        if appointment.user_id != requester_id {
            return Err(BookingError::Unauthorized);
        }

        if appointment.holds_slot() {
            self.ledger
                .release(
                    &appointment.doc_id,
                    &appointment.slot_date,
                    &appointment.slot_time,
                )
                .await?;
        }

        let deleted = self
            .db
            .delete_one(APPOINTMENTS, json!({ "_id": appointment_id }))
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        if deleted == 0 {
            warn!("Appointment {} vanished before delete", appointment_id);
        }

        info!("Appointment {} deleted", appointment_id);
        Ok(())
    }

    /// Payment reconciliation hook: flip the orthogonal paid flag.
    /// Idempotent by construction; replaying a confirmation changes nothing.
    pub async fn mark_paid(&self, appointment_id: &str) -> Result<(), BookingError> {
        let result = self
            .db
            .update_one(
                APPOINTMENTS,
                json!({ "_id": appointment_id }),
                json!({ "$set": { "paid": true, "updated_at": Utc::now() } }),
            )
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        if result.matched_count == 0 {
            return Err(BookingError::AppointmentNotFound);
        }

        Ok(())
    }

    pub async fn get(&self, appointment_id: &str) -> Result<Appointment, BookingError> {
        self.db
            .find_one_as(APPOINTMENTS, json!({ "_id": appointment_id }))
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?
            .ok_or(BookingError::AppointmentNotFound)
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Appointment>, BookingError> {
        self.list(json!({ "user_id": user_id })).await
    }

    pub async fn list_for_doctor(&self, doc_id: &str) -> Result<Vec<Appointment>, BookingError> {
        self.list(json!({ "doc_id": doc_id })).await
    }

    pub async fn list_all(&self) -> Result<Vec<Appointment>, BookingError> {
        self.list(json!({})).await
    }

    async fn list(&self, filter: Value) -> Result<Vec<Appointment>, BookingError> {
        self.db
            .find_as(
                APPOINTMENTS,
                filter,
                Some(json!({ "created_at": -1 })),
                None,
            )
            .await
            .map_err(|e| BookingError::Database(e.to_string()))
    }

    /// Aggregates for the doctor dashboard. Earnings sum every appointment
    /// that is completed OR paid.
    pub async fn dashboard(&self, doc_id: &str) -> Result<DoctorDashboard, BookingError> {
        let appointments = self.list_for_doctor(doc_id).await?;

        let patients: HashSet<&str> = appointments.iter().map(|a| a.user_id.as_str()).collect();
        let earnings: i64 = appointments
            .iter()
            .filter(|a| a.counts_toward_earnings())
            .map(|a| a.amount)
            .sum();

        let latest_appointments = appointments.iter().take(5).cloned().collect();

        Ok(DoctorDashboard {
            appointments: appointments.len() as i64,
            patients: patients.len() as i64,
            earnings,
            latest_appointments,
        })
    }

    async fn fetch_user_snapshot(&self, user_id: &str) -> Result<Value, BookingError> {
        let mut user = self
            .db
            .find_one(USERS, json!({ "_id": user_id }))
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?
            .ok_or(BookingError::UserNotFound)?;

        if let Some(map) = user.as_object_mut() {
            map.remove("password");
        }

        Ok(user)
    }

    async fn update_fields(&self, appointment_id: &str, fields: Value) -> Result<(), BookingError> {
        let mut set = fields;
        if let Some(map) = set.as_object_mut() {
            map.insert("updated_at".to_string(), json!(Utc::now()));
        }

        let result = self
            .db
            .update_one(
                APPOINTMENTS,
                json!({ "_id": appointment_id }),
                json!({ "$set": set }),
            )
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        if result.matched_count == 0 {
            return Err(BookingError::AppointmentNotFound);
        }

        Ok(())
    }
}
