//! Session-scoped holder for the current principal's evaluator.

use crate::evaluator::PermissionEvaluator;
use crate::grant::RawGrant;
use crate::grant_set::GrantSet;
use crate::{Result, ValidationError};
use datatools_core::{Catalog, Timestamp};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

#[derive(Debug, Default)]
struct SessionState {
    evaluator: Arc<PermissionEvaluator>,
    loaded_at: Option<Timestamp>,
}

/// Holds the evaluator for the signed-in principal.
///
/// Loading a new grant list swaps in a fresh evaluator; readers that took a
/// [`snapshot`](Self::snapshot) before the swap keep answering from the old
/// one. Clones share state.
///
/// The guarded state is replaced whole, never edited in place, so a panic
/// while the lock is held cannot leave it half-written; poisoning is ignored.
#[derive(Debug, Clone, Default)]
pub struct PermissionSession {
    state: Arc<RwLock<SessionState>>,
    catalog: Option<Arc<Catalog>>,
}

impl PermissionSession {
    /// Create a session with no grants loaded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session whose evaluators resolve project owners through
    /// `catalog`.
    #[must_use]
    pub fn with_catalog(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog: Some(catalog),
            ..Self::default()
        }
    }

    /// Replace the current grants.
    ///
    /// On a validation failure the session falls back to an empty evaluator
    /// and the error is returned.
    pub fn load(&self, raw: &[RawGrant]) -> std::result::Result<(), ValidationError> {
        match self.preview(raw) {
            Ok(evaluator) => {
                info!(grants = raw.len(), "permissions loaded");
                self.swap(evaluator);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "rejected grant list, session has no access");
                self.reset();
                Err(e)
            }
        }
    }

    /// Replace the current grants from a JSON array of grant records.
    ///
    /// Malformed JSON also leaves the session with no access.
    pub fn load_json(&self, json: &str) -> Result<()> {
        let raw: Vec<RawGrant> = match serde_json::from_str(json) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "malformed grant list, session has no access");
                self.reset();
                return Err(e.into());
            }
        };
        Ok(self.load(&raw)?)
    }

    /// Evaluator for the current grants.
    #[must_use]
    pub fn snapshot(&self) -> Arc<PermissionEvaluator> {
        Arc::clone(&self.read().evaluator)
    }

    /// Drop the current grants, e.g. on sign-out.
    pub fn clear(&self) {
        info!("permissions cleared");
        self.reset();
    }

    /// When the current grants were loaded, `None` if nothing is loaded.
    #[must_use]
    pub fn loaded_at(&self) -> Option<Timestamp> {
        self.read().loaded_at
    }

    /// Build an evaluator for `raw` without installing it.
    pub fn preview(
        &self,
        raw: &[RawGrant],
    ) -> std::result::Result<PermissionEvaluator, ValidationError> {
        match &self.catalog {
            Some(catalog) => Ok(PermissionEvaluator::with_catalog(
                GrantSet::with_catalog(raw, catalog)?,
                Arc::clone(catalog),
            )),
            None => Ok(PermissionEvaluator::new(GrantSet::new(raw)?)),
        }
    }

    fn swap(&self, evaluator: PermissionEvaluator) {
        *self.write() = SessionState {
            evaluator: Arc::new(evaluator),
            loaded_at: Some(Timestamp::now()),
        };
    }

    fn reset(&self) {
        *self.write() = SessionState::default();
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
