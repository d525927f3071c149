//! Runtime for driving chat exchanges
//!
//! One [`ChatRuntime`] task owns the conversation and the request lifecycle
//! state. Callers talk to it through a cloneable [`ChatHandle`]: commands go in
//! over an mpsc queue, observers watch snapshots or subscribe to updates.

mod executor;
pub mod traits;


pub use executor::ChatRuntime;
pub use traits::*;

use crate::client::ChatClient;
use crate::config::ClientConfig;
use crate::conversation::{IdAllocator, Message, MessageId};
use crate::state_machine::{ChatPhase, Event, ExchangeId, ExchangeOutcome};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// Capacity of the update broadcast channel
const UPDATE_BUFFER: usize = 256;

/// Incremental changes published to subscribers
#[derive(Debug, Clone)]
pub enum ChatUpdate {
    /// A message was appended or changed (new segment, error flag)
    MessageChanged { message: Message },
    PhaseChanged { phase: ChatPhase },
    /// A command was refused; the conversation is unchanged
    Rejected { reason: String },
    ExchangeFinished {
        exchange_id: ExchangeId,
        outcome: ExchangeOutcome,
    },
}

/// Full observable state, republished after every processed event.
///
/// `messages` is shared between snapshots until a message changes, so
/// publishing after a frame or an input edit does not copy the conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSnapshot {
    pub phase: ChatPhase,
    #[serde(serialize_with = "serialize_messages")]
    pub messages: Arc<[Message]>,
    /// Draft text in the input buffer
    pub input: String,
    pub exchanges_finished: u64,
    pub last_outcome: Option<ExchangeOutcome>,
}

impl Default for ChatSnapshot {
    fn default() -> Self {
        Self {
            phase: ChatPhase::default(),
            messages: Arc::from(Vec::new()),
            input: String::new(),
            exchanges_finished: 0,
            last_outcome: None,
        }
    }
}

impl ChatSnapshot {
    #[must_use]
    pub fn find(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }
}

fn serialize_messages<S: Serializer>(
    messages: &Arc<[Message]>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(messages.iter())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Chat runtime has stopped")]
    RuntimeClosed,
}

/// Handle to interact with a running chat runtime
#[derive(Clone)]
pub struct ChatHandle {
    event_tx: mpsc::Sender<Event>,
    ids: Arc<IdAllocator>,
    updates_tx: broadcast::Sender<ChatUpdate>,
    snapshot_rx: watch::Receiver<ChatSnapshot>,
}

impl ChatHandle {
    /// Send a new prompt. Rejections (busy, blank) arrive as [`ChatUpdate::Rejected`].
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::RuntimeClosed`] if the runtime task has exited.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), ChatError> {
        let message_id = self.ids.next_message_id();
        let exchange_id = ExchangeId::new(self.ids.next_raw());
        let reply_id = self.ids.next_message_id();
        self.dispatch(Event::UserSend {
            text: text.into(),
            message_id,
            exchange_id,
            reply_id,
        })
        .await
    }

    /// Re-issue the prompt of an existing user message
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::RuntimeClosed`] if the runtime task has exited.
    pub async fn resend(&self, message_id: MessageId) -> Result<(), ChatError> {
        let exchange_id = ExchangeId::new(self.ids.next_raw());
        let reply_id = self.ids.next_message_id();
        self.dispatch(Event::UserResend {
            message_id,
            exchange_id,
            reply_id,
        })
        .await
    }

    /// Cancel the exchange in flight, if any
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::RuntimeClosed`] if the runtime task has exited.
    pub async fn stop(&self) -> Result<(), ChatError> {
        self.dispatch(Event::UserStop).await
    }

    /// # Errors
    ///
    /// Returns [`ChatError::RuntimeClosed`] if the runtime task has exited.
    pub async fn set_input(&self, text: impl Into<String>) -> Result<(), ChatError> {
        self.dispatch(Event::InputChanged { text: text.into() }).await
    }

    /// Latest published snapshot
    #[must_use]
    pub fn snapshot(&self) -> ChatSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChatUpdate> {
        self.updates_tx.subscribe()
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ChatSnapshot> {
        self.snapshot_rx.clone()
    }

    async fn dispatch(&self, event: Event) -> Result<(), ChatError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| ChatError::RuntimeClosed)
    }
}

/// Start a chat runtime in the background.
///
/// The runtime stops once every [`ChatHandle`] has been dropped and the
/// reply stream (if any) has wound down.
#[must_use]
pub fn start<C, N>(config: ClientConfig, client: C, notifier: N) -> (ChatHandle, JoinHandle<()>)
where
    C: ChatClient + 'static,
    N: Notifier + 'static,
{
    let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));
    let (updates_tx, _) = broadcast::channel(UPDATE_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(ChatSnapshot::default());

    let runtime = ChatRuntime::new(
        config,
        client,
        notifier,
        event_rx,
        event_tx.downgrade(),
        updates_tx.clone(),
        snapshot_tx,
    );

    let task = tokio::spawn(async move {
        runtime.run().await;
    });

    let handle = ChatHandle {
        event_tx,
        ids: Arc::new(IdAllocator::new()),
        updates_tx,
        snapshot_rx,
    };

    (handle, task)
}
