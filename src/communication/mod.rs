//! Agent Communication Protocol
//!
//! In-process message bus between research agents. Every registered agent
//! gets a bounded inbox and a dedicated worker task; senders get back a
//! message id and collect the correlated reply later.
//!
//! ```text
//!  send_message ──► [inbox: mpsc] ──► worker ──► agent.process_message
//!       │                                              │
//!       └── pending (oneshot rx) ◄──── AgentResponse ◄─┘
//!                  │
//!           get_response / await_response
//! ```
//!
//! Each message carries a cancellation token derived from the bus root
//! token. A timed-out wait, `clear_queues` and `shutdown` cancel it; the
//! worker then discards the message or abandons the work in flight, and
//! the reply slot is gone so a late answer can never reach another caller.

pub mod message;
pub mod workflow;

pub use message::{AgentId, AgentResponse, Message};
pub use workflow::{run_advanced_messaging_workflow, AdvancedWorkflowResult};

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agents::Agent;
use crate::config::BusConfig;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Unknown recipient: {0}")]
    UnknownRecipient(AgentId),

    #[error("Agent already registered: {0}")]
    DuplicateAgent(AgentId),

    #[error("Inbox full for agent {0}")]
    QueueFull(AgentId),

    #[error("Message bus is shut down")]
    Shutdown,

    #[error("Message bus must be created inside a tokio runtime")]
    NoRuntime,
}

/// What a worker receives
struct Envelope {
    message: Message,
    reply: oneshot::Sender<AgentResponse>,
    cancel: CancellationToken,
}

/// A message whose reply has not been collected yet
struct Pending {
    message_id: Uuid,
    reply: oneshot::Receiver<AgentResponse>,
    cancel: CancellationToken,
}

struct Mailbox {
    inbox: mpsc::Sender<Envelope>,
    /// At most `capacity` uncollected replies
    pending: Mutex<VecDeque<Pending>>,
    capacity: usize,
}

impl Mailbox {
    fn pending(&self) -> std::sync::MutexGuard<'_, VecDeque<Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct AgentCommunicationProtocol {
    order: Vec<AgentId>,
    mailboxes: HashMap<AgentId, Mailbox>,
    root: CancellationToken,
    /// Parent of every live message token; replaced by `clear_queues`
    generation: Mutex<CancellationToken>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl AgentCommunicationProtocol {
    /// Register `agents` and spawn one worker per agent
    pub fn new(agents: Vec<(AgentId, Arc<dyn Agent>)>, config: BusConfig) -> Result<Self, BusError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BusError::NoRuntime)?;

        let mut order = Vec::with_capacity(agents.len());
        for (id, _) in &agents {
            if order.contains(id) {
                return Err(BusError::DuplicateAgent(id.clone()));
            }
            order.push(id.clone());
        }

        let root = CancellationToken::new();
        let capacity = config.queue_capacity.max(1);
        let mut mailboxes = HashMap::with_capacity(agents.len());
        let mut workers = Vec::with_capacity(agents.len());

        for (id, agent) in agents {
            let (tx, rx) = mpsc::channel(capacity);
            workers.push(runtime.spawn(run_worker(id.clone(), agent, rx, root.clone())));
            mailboxes.insert(
                id,
                Mailbox {
                    inbox: tx,
                    pending: Mutex::new(VecDeque::with_capacity(capacity)),
                    capacity,
                },
            );
        }

        info!(agents = order.len(), queue_capacity = capacity, "Message bus started");

        Ok(Self {
            order,
            mailboxes,
            generation: Mutex::new(root.child_token()),
            root,
            workers: Mutex::new(workers),
        })
    }

    /// Registered agent ids in registration order
    pub fn agent_ids(&self) -> &[AgentId] {
        &self.order
    }

    pub fn has_agent(&self, id: &str) -> bool {
        self.mailboxes.contains_key(id)
    }

    /// Replies sent to `agent` that nobody has collected yet
    pub fn pending_responses(&self, agent: &str) -> usize {
        self.mailboxes.get(agent).map_or(0, |m| m.pending().len())
    }

    /// Enqueue `content` for `recipient` and return the new message id
    pub fn send_message(&self, sender: &str, recipient: &str, content: Value) -> Result<Uuid, BusError> {
        let (recipient_id, mailbox) = self
            .mailboxes
            .get_key_value(recipient)
            .ok_or_else(|| BusError::UnknownRecipient(AgentId::from(recipient)))?;
        if self.root.is_cancelled() {
            return Err(BusError::Shutdown);
        }

        let message = Message::new(sender, recipient_id.clone(), content);
        let message_id = message.id;
        let cancel = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .child_token();
        let (reply_tx, reply_rx) = oneshot::channel();

        // Enqueue and record under one lock so pending order matches inbox order
        let mut pending = mailbox.pending();
        if pending.len() >= mailbox.capacity && !evict_answered(recipient_id, &mut pending) {
            warn!(recipient = %recipient_id, outstanding = pending.len(), "Too many uncollected replies, rejecting message");
            return Err(BusError::QueueFull(recipient_id.clone()));
        }
        let envelope = Envelope {
            message,
            reply: reply_tx,
            cancel: cancel.clone(),
        };
        match mailbox.inbox.try_send(envelope) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(recipient = %recipient_id, "Agent inbox full, rejecting message");
                return Err(BusError::QueueFull(recipient_id.clone()));
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return Err(BusError::Shutdown),
        }
        pending.push_back(Pending {
            message_id,
            reply: reply_rx,
            cancel,
        });

        debug!(sender = %sender, recipient = %recipient_id, message_id = %message_id, "Message queued");
        Ok(message_id)
    }

    /// Send `content` to every agent except `sender`, in registration order.
    ///
    /// Stops at the first failure; messages already sent stay sent.
    pub fn broadcast_message(&self, sender: &str, content: Value) -> Result<Vec<Uuid>, BusError> {
        let mut ids = Vec::with_capacity(self.order.len());
        for recipient in self.order.iter().filter(|id| id.as_str() != sender) {
            ids.push(self.send_message(sender, recipient.as_str(), content.clone())?);
        }
        Ok(ids)
    }

    /// Wait for the reply to the oldest uncollected message sent to `agent`.
    ///
    /// Never fails: unknown agents, an empty queue and timeouts all come back
    /// as error responses.
    pub async fn get_response(&self, agent: &str, timeout: Duration) -> AgentResponse {
        let Some((agent_id, mailbox)) = self.mailboxes.get_key_value(agent) else {
            return AgentResponse::failure(None, AgentId::from(agent), format!("Unknown agent: {}", agent));
        };
        let next = mailbox.pending().pop_front();
        match next {
            Some(pending) => wait_for_reply(agent_id, pending, timeout).await,
            None => AgentResponse::failure(
                None,
                agent_id.clone(),
                format!("No outstanding message for {}", agent_id),
            ),
        }
    }

    /// Wait for the reply to one specific message
    pub async fn await_response(&self, message_id: Uuid, timeout: Duration) -> AgentResponse {
        for (agent_id, mailbox) in &self.mailboxes {
            let found = {
                let mut pending = mailbox.pending();
                pending
                    .iter()
                    .position(|p| p.message_id == message_id)
                    .and_then(|index| pending.remove(index))
            };
            if let Some(pending) = found {
                return wait_for_reply(agent_id, pending, timeout).await;
            }
        }

        AgentResponse::failure(
            Some(message_id),
            AgentId::from("unknown"),
            format!("No outstanding message with id {}", message_id),
        )
    }

    /// Cancel every queued and in-flight message and drop all reply slots
    pub fn clear_queues(&self) {
        {
            let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
            generation.cancel();
            *generation = self.root.child_token();
        }

        let mut dropped = 0;
        for mailbox in self.mailboxes.values() {
            let mut pending = mailbox.pending();
            dropped += pending.len();
            pending.clear();
        }
        info!(dropped, "Message queues cleared");
    }

    /// Stop every worker and wait for them to exit
    pub async fn shutdown(&self) {
        self.root.cancel();
        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for result in futures::future::join_all(workers).await {
            if let Err(e) = result {
                warn!(error = %e, "Bus worker ended abnormally");
            }
        }
        info!("Message bus shut down");
    }
}

impl Drop for AgentCommunicationProtocol {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// Drop the oldest reply slot that is already settled (answered or
/// abandoned). Returns false when every outstanding message is still queued
/// or in flight.
fn evict_answered(agent: &AgentId, pending: &mut VecDeque<Pending>) -> bool {
    let settled = pending
        .iter_mut()
        .position(|p| !matches!(p.reply.try_recv(), Err(oneshot::error::TryRecvError::Empty)));
    match settled.and_then(|index| pending.remove(index)) {
        Some(evicted) => {
            warn!(agent = %agent, message_id = %evicted.message_id, "Evicting uncollected reply");
            true
        }
        None => false,
    }
}

async fn wait_for_reply(agent: &AgentId, pending: Pending, timeout: Duration) -> AgentResponse {
    let Pending {
        message_id,
        reply,
        cancel,
    } = pending;

    match tokio::time::timeout(timeout, reply).await {
        Ok(Ok(response)) => response,
        Ok(Err(_)) => AgentResponse::failure(
            Some(message_id),
            agent.clone(),
            format!("Message {} to {} was cancelled", message_id, agent),
        ),
        Err(_) => {
            cancel.cancel();
            warn!(agent = %agent, message_id = %message_id, ?timeout, "Agent response timed out");
            AgentResponse::failure(
                Some(message_id),
                agent.clone(),
                format!("No response from {} within {:?}", agent, timeout),
            )
        }
    }
}

async fn run_worker(
    id: AgentId,
    agent: Arc<dyn Agent>,
    mut inbox: mpsc::Receiver<Envelope>,
    shutdown: CancellationToken,
) {
    debug!(agent = %id, "Bus worker started");

    loop {
        let envelope = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = inbox.recv() => match next {
                Some(envelope) => envelope,
                None => break,
            },
        };
        let Envelope { message, reply, cancel } = envelope;

        if cancel.is_cancelled() {
            debug!(agent = %id, message_id = %message.id, "Discarding cancelled message");
            continue;
        }

        let work = AssertUnwindSafe(agent.process_message(&message)).catch_unwind();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err("Message was cancelled".to_string()),
            result = work => match result {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(e.to_string()),
                Err(panic) => {
                    warn!(agent = %id, message_id = %message.id, "Agent panicked while processing message");
                    Err(format!("Agent panicked: {}", panic_message(panic.as_ref())))
                }
            },
        };

        let response = match outcome {
            Ok(value) => AgentResponse::success(message.id, id.clone(), value),
            Err(error) => AgentResponse::failure(Some(message.id), id.clone(), error),
        };
        if reply.send(response).is_err() {
            debug!(agent = %id, message_id = %message.id, "Reply dropped, caller stopped waiting");
        }
    }

    debug!(agent = %id, "Bus worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
