//! In-memory performance store.
//!
//! One history per (student, domain). Writers to the same key are
//! serialized through that key's mutex; the outer map lock is only held
//! long enough to find or create the slot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::model::Domain;
use crate::performance::{predict, PerformanceMetric, Prediction, StudentAnalysis, StudentProfile};

/// Key of one history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKey {
    pub student_id: String,
    pub domain: Domain,
}

impl StoreKey {
    pub fn new(student_id: &str, domain: Domain) -> Self {
        Self {
            student_id: student_id.to_string(),
            domain,
        }
    }
}

/// A history in transportable form, as produced by [`PerformanceStore::export`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedHistory {
    pub student_id: String,
    pub domain: Domain,
    pub base_grade: u8,
    pub entries: Vec<PerformanceMetric>,
}

#[derive(Debug)]
struct Slot {
    history: Vec<PerformanceMetric>,
    profile: StudentProfile,
}

/// Explicit store for performance histories and their derived profiles.
#[derive(Debug, Default)]
pub struct PerformanceStore {
    slots: RwLock<HashMap<StoreKey, Arc<Mutex<Slot>>>>,
}

// Histories are append-only, so a writer that panicked mid-call leaves at
// worst a profile one entry behind. Keep serving it.
fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PerformanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &StoreKey) -> Option<Arc<Mutex<Slot>>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.get(key).cloned()
    }

    fn slot_or_insert(&self, key: &StoreKey, base_grade: u8) -> Arc<Mutex<Slot>> {
        if let Some(slot) = self.slot(key) {
            return slot;
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Slot {
                    history: Vec::new(),
                    profile: StudentProfile::new(&key.student_id, key.domain, base_grade),
                }))
            })
            .clone()
    }

    /// Append a metric and return the updated profile.
    ///
    /// `base_grade` is only used when this is the first entry for the key.
    pub fn record(
        &self,
        student_id: &str,
        domain: Domain,
        base_grade: u8,
        metric: PerformanceMetric,
    ) -> StudentProfile {
        let key = StoreKey::new(student_id, domain);
        let slot = self.slot_or_insert(&key, base_grade);
        let mut slot = lock(&slot);
        slot.history.push(metric);
        let Slot { history, profile } = &mut *slot;
        profile.observe(history);
        tracing::debug!(
            student = student_id,
            %domain,
            entries = history.len(),
            competency = profile.competency,
            "recorded response"
        );
        profile.clone()
    }

    pub fn profile(&self, student_id: &str, domain: Domain) -> Option<StudentProfile> {
        let slot = self.slot(&StoreKey::new(student_id, domain))?;
        let profile = lock(&slot).profile.clone();
        Some(profile)
    }

    pub fn history(&self, student_id: &str, domain: Domain) -> Vec<PerformanceMetric> {
        match self.slot(&StoreKey::new(student_id, domain)) {
            Some(slot) => {
                let history = lock(&slot).history.clone();
                history
            }
            None => Vec::new(),
        }
    }

    pub fn analysis(&self, student_id: &str, domain: Domain) -> Option<StudentAnalysis> {
        let slot = self.slot(&StoreKey::new(student_id, domain))?;
        let slot = lock(&slot);
        Some(StudentAnalysis::new(slot.profile.clone(), &slot.history))
    }

    pub fn predict(&self, student_id: &str, domain: Domain) -> Option<Prediction> {
        let slot = self.slot(&StoreKey::new(student_id, domain))?;
        let slot = lock(&slot);
        Some(predict(&slot.profile, &slot.history))
    }

    /// Drop the history for a key. Returns whether anything was removed.
    pub fn clear(&self, student_id: &str, domain: Domain) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.remove(&StoreKey::new(student_id, domain)).is_some()
    }

    pub fn export(&self, student_id: &str, domain: Domain) -> Option<ExportedHistory> {
        let slot = self.slot(&StoreKey::new(student_id, domain))?;
        let slot = lock(&slot);
        Some(ExportedHistory {
            student_id: student_id.to_string(),
            domain,
            base_grade: slot.profile.base_grade,
            entries: slot.history.clone(),
        })
    }

    /// Replace the history for the exported key and rebuild its profile.
    pub fn import(&self, exported: ExportedHistory) -> StudentProfile {
        let profile = StudentProfile::rebuild(
            &exported.student_id,
            exported.domain,
            exported.base_grade,
            &exported.entries,
        );
        let key = StoreKey::new(&exported.student_id, exported.domain);
        let slot = Slot {
            history: exported.entries,
            profile: profile.clone(),
        };
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.insert(key, Arc::new(Mutex::new(slot)));
        profile
    }

    /// Keys with at least one recorded history.
    pub fn keys(&self) -> Vec<StoreKey> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.keys().cloned().collect()
    }
}
