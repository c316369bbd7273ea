//! Record store seam.
//!
//! Persistence is an external collaborator: the engine only needs
//! get/update by key, an active-enrollment phone lookup, and two
//! append-only collections. The contract the engine relies on is
//! atomic single-record field updates — no cross-record transactions.
//! `MemoryStore` is the reference implementation used by the default
//! binary and the tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::models::{CheckinRecord, Enrollment, EnrollmentPatch, EscalationAlert};
use crate::phone;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Persistence operations the engine needs. Implementations must make
/// `update` atomic per record; the engine's correctness around the
/// reply/timeout race depends on a patch becoming visible as a unit.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch an enrollment by patient key.
    async fn get(&self, patient_key: &str) -> Result<Option<Enrollment>, StoreError>;

    /// Find the active enrollment whose phone matches the (raw) inbound
    /// number, tolerating format differences.
    async fn find_active_by_phone(&self, raw_phone: &str)
        -> Result<Option<Enrollment>, StoreError>;

    /// Insert or replace an enrollment. Replacing under the same key is
    /// how a new enrollment supersedes a prior active one.
    async fn put(&self, enrollment: Enrollment) -> Result<(), StoreError>;

    /// Apply a field patch to one enrollment, atomically.
    async fn update(&self, patient_key: &str, patch: EnrollmentPatch) -> Result<(), StoreError>;

    /// Append a daily check-in record.
    async fn append_checkin(&self, record: CheckinRecord) -> Result<(), StoreError>;

    /// Append an escalation alert.
    async fn append_alert(&self, alert: EscalationAlert) -> Result<(), StoreError>;
}

/// In-memory store keyed by patient. One RwLock'd map for enrollments
/// (a patch applies under the write lock, which is the atomicity
/// guarantee), plus append-only vectors for the two collections.
/// `default_country_code` feeds phone normalization so a national-format
/// stored number matches an international-format inbound one.
#[derive(Default)]
pub struct MemoryStore {
    enrollments: RwLock<HashMap<String, Enrollment>>,
    checkins: Mutex<Vec<CheckinRecord>>,
    alerts: Mutex<Vec<EscalationAlert>>,
    default_country_code: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Country code applied when normalizing bare national numbers on
    /// both sides of the phone lookup.
    pub fn with_default_country_code(mut self, code: Option<String>) -> Self {
        self.default_country_code = code;
        self
    }

    /// Snapshot of recorded check-ins, oldest first.
    pub async fn checkins(&self) -> Vec<CheckinRecord> {
        self.checkins.lock().await.clone()
    }

    /// Snapshot of appended alerts, oldest first.
    pub async fn alerts(&self) -> Vec<EscalationAlert> {
        self.alerts.lock().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, patient_key: &str) -> Result<Option<Enrollment>, StoreError> {
        Ok(self.enrollments.read().await.get(patient_key).cloned())
    }

    async fn find_active_by_phone(
        &self,
        raw_phone: &str,
    ) -> Result<Option<Enrollment>, StoreError> {
        let cc = self.default_country_code.as_deref();
        let wanted = phone::normalize(raw_phone, cc);
        if wanted.is_empty() {
            return Ok(None);
        }
        let enrollments = self.enrollments.read().await;
        Ok(enrollments
            .values()
            .find(|e| e.is_active() && phone::normalize(&e.phone, cc) == wanted)
            .cloned())
    }

    async fn put(&self, enrollment: Enrollment) -> Result<(), StoreError> {
        let mut enrollments = self.enrollments.write().await;
        if enrollments
            .insert(enrollment.patient_key.clone(), enrollment)
            .is_some()
        {
            tracing::debug!("Superseded existing enrollment");
        }
        Ok(())
    }

    async fn update(&self, patient_key: &str, patch: EnrollmentPatch) -> Result<(), StoreError> {
        let mut enrollments = self.enrollments.write().await;
        match enrollments.get_mut(patient_key) {
            Some(enrollment) => {
                enrollment.apply(patch);
                Ok(())
            }
            None => Err(StoreError::NotFound(patient_key.to_string())),
        }
    }

    async fn append_checkin(&self, record: CheckinRecord) -> Result<(), StoreError> {
        self.checkins.lock().await.push(record);
        Ok(())
    }

    async fn append_alert(&self, alert: EscalationAlert) -> Result<(), StoreError> {
        self.alerts.lock().await.push(alert);
        Ok(())
    }
}
