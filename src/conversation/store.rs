// Per-user conversation sessions with keyed locks

use crate::models::{ConversationSession, UserId};
use std::collections::HashMap;
use std::sync::{Arc, MutexGuard, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One user's session plus the token that aborts work started for it.
struct UserSlot {
    session: Arc<Mutex<ConversationSession>>,
    cancel: CancellationToken,
}

impl UserSlot {
    fn fresh(user: &UserId) -> Arc<Self> {
        Arc::new(Self {
            session: Arc::new(Mutex::new(ConversationSession::new(user.clone()))),
            cancel: CancellationToken::new(),
        })
    }
}

/// Exclusive access to a user's session for the length of one turn.
pub struct Turn {
    pub session: OwnedMutexGuard<ConversationSession>,
    pub cancel: CancellationToken,
}

/// Process-wide map from user to conversation state.
///
/// The map lock is a plain mutex held only for lookups and swaps, never
/// across an await. Each user has a separate session lock that a turn holds
/// from start to finish, so turns of one user are serialised (in the order
/// they asked for the lock) while different users proceed independently.
#[derive(Default)]
pub struct SessionStore {
    slots: std::sync::Mutex<HashMap<UserId, Arc<UserSlot>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<UserId, Arc<UserSlot>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, user: &UserId) -> Arc<UserSlot> {
        self.slots()
            .entry(user.clone())
            .or_insert_with(|| {
                debug!(user_id = %user, "Creating conversation session");
                UserSlot::fresh(user)
            })
            .clone()
    }

    /// Wait for the user's session lock, creating the session on first contact.
    pub async fn begin_turn(&self, user: &UserId) -> Turn {
        let slot = self.slot(user);
        let cancel = slot.cancel.clone();
        let session = slot.session.clone().lock_owned().await;
        Turn { session, cancel }
    }

    /// Fire the cancel token of the user's current session without touching
    /// the session itself. Turns already running or waiting for it end quietly.
    pub fn interrupt(&self, user: &UserId) {
        if let Some(slot) = self.slots().get(user) {
            slot.cancel.cancel();
            debug!(user_id = %user, "Conversation session interrupted");
        }
    }

    /// Abort in-flight work for `user` and forget the session.
    pub async fn cancel(&self, user: &UserId) -> bool {
        let removed = self.slots().remove(user);
        match removed {
            Some(slot) => {
                slot.cancel.cancel();
                debug!(user_id = %user, "Conversation session discarded");
                true
            }
            None => false,
        }
    }

    /// Abort in-flight work for `user` and start over with a fresh session.
    pub async fn restart(&self, user: &UserId) {
        let previous = self.slots().insert(user.clone(), UserSlot::fresh(user));
        if let Some(slot) = previous {
            slot.cancel.cancel();
        }
        debug!(user_id = %user, "Conversation session replaced");
    }

    /// True while `turn` still belongs to the user's current session.
    pub fn is_current(turn: &Turn) -> bool {
        !turn.cancel.is_cancelled()
    }

    /// Number of users with a live session
    pub async fn len(&self) -> usize {
        self.slots().len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy of the user's session; waits for any running turn to finish.
    pub async fn snapshot(&self, user: &UserId) -> Option<ConversationSession> {
        let slot = self.slots().get(user).cloned()?;
        let session = slot.session.lock().await;
        Some(session.clone())
    }
}
