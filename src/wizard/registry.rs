use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::session::AttendanceWizard;

pub type SharedWizard = Arc<tokio::sync::Mutex<AttendanceWizard>>;

struct SessionSlot {
    owner: Uuid,
    wizard: SharedWizard,
    touched: Instant,
}

/// Open attendance sessions, each private to the operator that opened it.
///
/// The map lock only guards lookups; store calls happen while holding the
/// per-session async lock.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SessionSlot>>,
    idle_timeout: Duration,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionRegistry({} sessions)", self.len())
    }
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> SessionRegistry {
        SessionRegistry {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, SessionSlot>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, owner: Uuid, wizard: AttendanceWizard) -> SharedWizard {
        let id = wizard.id();
        let wizard = Arc::new(tokio::sync::Mutex::new(wizard));

        let mut sessions = self.lock();
        Self::purge(&mut sessions, self.idle_timeout);
        sessions.insert(
            id,
            SessionSlot {
                owner,
                wizard: wizard.clone(),
                touched: Instant::now(),
            },
        );
        tracing::debug!("Attendance session {} opened ({} active).", id, sessions.len());

        wizard
    }

    /// Looks a session up for `owner`. Sessions of other operators and
    /// expired ones are reported as missing.
    pub fn get(&self, owner: Uuid, id: Uuid) -> Option<SharedWizard> {
        let mut sessions = self.lock();
        Self::purge(&mut sessions, self.idle_timeout);

        let slot = sessions.get_mut(&id).filter(|slot| slot.owner == owner)?;
        slot.touched = Instant::now();
        Some(slot.wizard.clone())
    }

    pub fn remove(&self, owner: Uuid, id: Uuid) -> bool {
        let mut sessions = self.lock();
        match sessions.get(&id) {
            Some(slot) if slot.owner == owner => sessions.remove(&id).is_some(),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge(sessions: &mut HashMap<Uuid, SessionSlot>, idle_timeout: Duration) {
        let before = sessions.len();
        sessions.retain(|_, slot| slot.touched.elapsed() < idle_timeout);
        let expired = before - sessions.len();
        if expired > 0 {
            tracing::debug!("Dropped {} idle attendance sessions.", expired);
        }
    }
}
