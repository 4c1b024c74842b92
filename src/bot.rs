//! Bot Runner
//!
//! Long-polls Telegram and hands messages to the conversation state machine.
//! Each active user gets a worker task fed by a queue, so one user's
//! messages are handled in the order Telegram delivered them while a slow
//! report for one user never delays another user.

use crate::channel::{InboundContent, InboundMessage, TelegramChannel};
use crate::conversation::ConversationStateMachine;
use crate::models::UserId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);
const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

type Queues = Arc<Mutex<HashMap<UserId, mpsc::UnboundedSender<InboundMessage>>>>;

fn lock_queues(queues: &Queues) -> MutexGuard<'_, HashMap<UserId, mpsc::UnboundedSender<InboundMessage>>> {
    queues.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Routes inbound messages to per-user workers.
pub struct MessageDispatcher {
    machine: Arc<ConversationStateMachine>,
    queues: Queues,
    idle_timeout: Duration,
}

impl MessageDispatcher {
    pub fn new(machine: Arc<ConversationStateMachine>) -> Self {
        Self {
            machine,
            queues: Arc::default(),
            idle_timeout: WORKER_IDLE_TIMEOUT,
        }
    }

    /// How long a worker waits for its user's next message before exiting
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Queue `message` behind the sender's earlier messages.
    ///
    /// `/start` and `/cancel` also interrupt the sender's running and queued
    /// turns right away; those turns end quietly before the command itself
    /// is handled in order.
    pub fn dispatch(&self, message: InboundMessage) {
        if matches!(message.content, InboundContent::Command(_)) {
            self.machine.store().interrupt(&message.user_id);
        }

        let mut queues = lock_queues(&self.queues);
        let message = match queues.get(&message.user_id) {
            Some(tx) => match tx.send(message) {
                Ok(()) => return,
                Err(mpsc::error::SendError(message)) => message,
            },
            None => message,
        };

        let user_id = message.user_id.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        queues.insert(user_id.clone(), tx);
        debug!(user_id = %user_id, "Starting user worker");
        tokio::spawn(run_worker(
            self.machine.clone(),
            self.queues.clone(),
            user_id,
            message,
            rx,
            self.idle_timeout,
        ));
    }

    /// Users with a running worker
    pub fn active_users(&self) -> usize {
        lock_queues(&self.queues).len()
    }
}

async fn run_worker(
    machine: Arc<ConversationStateMachine>,
    queues: Queues,
    user_id: UserId,
    first: InboundMessage,
    mut rx: mpsc::UnboundedReceiver<InboundMessage>,
    idle_timeout: Duration,
) {
    let mut next = Some(first);
    while let Some(message) = next.take() {
        if let Err(e) = machine.handle(message).await {
            error!(user_id = %user_id, error = %e, "Failed to handle message");
        }

        next = match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(message) => message,
            Err(_) => {
                // dispatch() only sends while holding the map lock
                let mut open = lock_queues(&queues);
                match rx.try_recv() {
                    Ok(message) => Some(message),
                    Err(_) => {
                        open.remove(&user_id);
                        None
                    }
                }
            }
        };
    }
    debug!(user_id = %user_id, "User worker stopped");
}

pub struct BotRunner {
    channel: Arc<TelegramChannel>,
    dispatcher: MessageDispatcher,
}

impl BotRunner {
    pub fn new(channel: Arc<TelegramChannel>, machine: Arc<ConversationStateMachine>) -> Self {
        Self {
            channel,
            dispatcher: MessageDispatcher::new(machine),
        }
    }

    /// Poll until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Bot polling started");
        let mut offset = 0;

        loop {
            let batch = tokio::select! {
                _ = shutdown.cancelled() => break,
                batch = self.channel.get_updates(offset) => batch,
            };

            match batch {
                Ok(batch) => {
                    offset = batch.next_offset;
                    for message in batch.messages {
                        self.dispatcher.dispatch(message);
                    }
                }
                Err(e) => {
                    error!(error = %e, "Polling Telegram failed");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        info!("Bot polling stopped");
    }
}
