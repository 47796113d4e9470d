use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::PlannerError;
use crate::preferences::{parse_update, CampaignParameters, InputsStatus, SubmitOutcome};

/// Preference state for one conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub parameters: CampaignParameters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            parameters: CampaignParameters::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge recognized fields from free text into the stored parameters.
    pub fn submit(&mut self, text: &str) -> SubmitOutcome {
        let update = parse_update(text);
        let (accepted, ignored) = self.parameters.merge(&update);
        self.updated_at = Utc::now();
        debug!(
            session = %self.id,
            accepted = ?accepted,
            ignored = ignored.len(),
            "merged campaign inputs"
        );
        SubmitOutcome::new(self.parameters, accepted, ignored)
    }

    pub fn current(&self) -> InputsStatus {
        InputsStatus::from(self.parameters)
    }

    /// Start a new campaign in the same conversation.
    pub fn reset(&mut self) {
        self.parameters = CampaignParameters::default();
        self.updated_at = Utc::now();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Conversation-scoped sessions behind one lock, so a submit and the read
/// that follows it never interleave with another request on the same store.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Session>> {
        // Entries are plain Copy data, so a poisoned map is still consistent
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open(&self) -> Uuid {
        let session = Session::new();
        let id = session.id;
        self.lock().insert(id, session);
        info!(session = %id, "opened planning session");
        id
    }

    pub fn submit(&self, id: Uuid, text: &str) -> Result<SubmitOutcome, PlannerError> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(&id)
            .ok_or(PlannerError::SessionNotFound(id))?;
        Ok(session.submit(text))
    }

    pub fn current(&self, id: Uuid) -> Result<InputsStatus, PlannerError> {
        self.lock()
            .get(&id)
            .map(Session::current)
            .ok_or(PlannerError::SessionNotFound(id))
    }

    pub fn parameters(&self, id: Uuid) -> Result<CampaignParameters, PlannerError> {
        self.lock()
            .get(&id)
            .map(|s| s.parameters)
            .ok_or(PlannerError::SessionNotFound(id))
    }

    pub fn reset(&self, id: Uuid) -> Result<(), PlannerError> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(&id)
            .ok_or(PlannerError::SessionNotFound(id))?;
        session.reset();
        Ok(())
    }

    /// Returns whether the session existed.
    pub fn close(&self, id: Uuid) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Drop sessions untouched for longer than `max_idle`. Returns how many.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.updated_at >= cutoff);
        let pruned = before - sessions.len();
        if pruned > 0 {
            info!(pruned, "pruned idle planning sessions");
        }
        pruned
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
