//! Chat runtime executor

use super::traits::Notifier;
use super::{ChatSnapshot, ChatUpdate};

use crate::client::{ChatClient, ChatRequest};
use crate::config::ClientConfig;
use crate::conversation::{Conversation, Message, MessageId};
use crate::state_machine::{
    transition, ChatState, Effect, Event, Exchange, ExchangeOutcome, StreamFailure,
    TransitionError,
};
use crate::stream::{classify, Frame, FrameDecoder};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Generic chat runtime that can work with any client and notifier implementation
pub struct ChatRuntime<C, N>
where
    C: ChatClient + 'static,
    N: Notifier + 'static,
{
    config: ClientConfig,
    state: ChatState,
    conversation: Conversation,
    input: String,
    client: Arc<C>,
    notifier: N,
    event_rx: mpsc::Receiver<Event>,
    /// Weak so that dropping every handle shuts the runtime down
    event_tx: mpsc::WeakSender<Event>,
    updates_tx: broadcast::Sender<ChatUpdate>,
    snapshot_tx: watch::Sender<ChatSnapshot>,
    /// Token for the reply stream of the current exchange
    stream_cancel_token: Option<CancellationToken>,
    exchanges_finished: u64,
    last_outcome: Option<ExchangeOutcome>,
    /// Messages as last published; rebuilt only after a message changed
    published_messages: Arc<[Message]>,
    messages_dirty: bool,
}

impl<C, N> ChatRuntime<C, N>
where
    C: ChatClient + 'static,
    N: Notifier + 'static,
{
    #[must_use]
    pub fn new(
        config: ClientConfig,
        client: C,
        notifier: N,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::WeakSender<Event>,
        updates_tx: broadcast::Sender<ChatUpdate>,
        snapshot_tx: watch::Sender<ChatSnapshot>,
    ) -> Self {
        Self {
            config,
            state: ChatState::Idle,
            conversation: Conversation::new(),
            input: String::new(),
            client: Arc::new(client),
            notifier,
            event_rx,
            event_tx,
            updates_tx,
            snapshot_tx,
            stream_cancel_token: None,
            exchanges_finished: 0,
            last_outcome: None,
            published_messages: Arc::from(Vec::new()),
            messages_dirty: false,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(endpoint = ?self.config.chat_endpoint(), "Starting chat runtime");

        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event);
        }

        if let Some(token) = self.stream_cancel_token.take() {
            token.cancel();
        }
        tracing::info!("Chat runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        // Effects may generate follow-up events (e.g. a missing endpoint)
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let result = match transition(&self.state, &self.conversation, current_event) {
                Ok(r) => r,
                Err(TransitionError::StaleExchange(exchange_id)) => {
                    tracing::debug!(exchange_id = %exchange_id, "Dropping event for inactive exchange");
                    continue;
                }
                Err(e) if e.is_user_facing() => {
                    tracing::warn!(error = %e, state = %self.state.phase(), "Command rejected");
                    let _ = self.updates_tx.send(ChatUpdate::Rejected {
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Unexpected stream event");
                    continue;
                }
            };

            let old_phase = self.state.phase();
            self.state = result.new_state;
            if self.state.phase() != old_phase {
                tracing::debug!(from = %old_phase, to = %self.state.phase(), "Phase changed");
                let _ = self.updates_tx.send(ChatUpdate::PhaseChanged {
                    phase: self.state.phase(),
                });
            }

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect) {
                    events_to_process.push(generated_event);
                }
            }
        }

        self.publish_snapshot();
    }

    fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::AppendUserMessage { message_id, text } => {
                if self.conversation.append(Message::user(message_id, text)) {
                    self.message_changed(message_id);
                }
                None
            }

            Effect::SetInput { text } => {
                self.input = text;
                None
            }

            Effect::AppendSegment { message_id, text } => {
                tracing::debug!(message_id = %message_id, len = text.len(), "Appending segment");
                if self.conversation.append_segment(message_id, text) {
                    self.message_changed(message_id);
                }
                None
            }

            Effect::MarkErrored { message_id } => {
                if self.conversation.mark_errored(message_id) {
                    self.message_changed(message_id);
                }
                None
            }

            Effect::ClearErrored { message_id } => {
                if self.conversation.clear_errored(message_id) {
                    self.message_changed(message_id);
                }
                None
            }

            Effect::OpenStream { exchange } => self.open_stream(exchange),

            Effect::CancelStream => {
                if let Some(token) = self.stream_cancel_token.take() {
                    token.cancel();
                }
                // The pump task sees the token and stops without sending anything else
                None
            }

            Effect::Notify { level, message } => {
                self.notifier.notify(level, &message);
                None
            }

            Effect::FinishExchange {
                exchange_id,
                outcome,
            } => {
                match &outcome {
                    Ok(()) => tracing::info!(exchange_id = %exchange_id, "Exchange completed"),
                    Err(e) => tracing::info!(exchange_id = %exchange_id, outcome = %e, "Exchange ended"),
                }
                self.stream_cancel_token = None;
                self.exchanges_finished += 1;
                self.last_outcome = Some(outcome.clone());
                let _ = self.updates_tx.send(ChatUpdate::ExchangeFinished {
                    exchange_id,
                    outcome,
                });
                None
            }
        }
    }

    fn open_stream(&mut self, exchange: Exchange) -> Option<Event> {
        let Some(url) = self.config.chat_endpoint() else {
            tracing::error!(
                exchange_id = %exchange.id,
                "CHAT_API_URL is not configured; request not sent"
            );
            return Some(Event::StreamFailed {
                exchange_id: exchange.id,
                failure: StreamFailure::ConfigMissing,
            });
        };

        let Some(event_tx) = self.event_tx.upgrade() else {
            return Some(Event::StreamFailed {
                exchange_id: exchange.id,
                failure: StreamFailure::Transport {
                    message: "Chat runtime is shutting down".to_string(),
                },
            });
        };

        // Fresh token per exchange, never reused
        let cancel_token = CancellationToken::new();
        if let Some(previous) = self.stream_cancel_token.replace(cancel_token.clone()) {
            previous.cancel();
        }

        let client = Arc::clone(&self.client);
        tokio::spawn(pump_stream(client, url, exchange, cancel_token, event_tx));

        None
    }

    fn message_changed(&mut self, message_id: MessageId) {
        self.messages_dirty = true;
        if let Some(message) = self.conversation.find(message_id) {
            let _ = self.updates_tx.send(ChatUpdate::MessageChanged {
                message: message.clone(),
            });
        }
    }

    fn publish_snapshot(&mut self) {
        if std::mem::take(&mut self.messages_dirty) {
            self.published_messages = Arc::from(self.conversation.messages());
            if let Some(last) = self.conversation.last() {
                tracing::trace!(
                    count = self.published_messages.len(),
                    last_id = %last.id,
                    "Republishing messages"
                );
            }
        }
        self.snapshot_tx.send_replace(ChatSnapshot {
            phase: self.state.phase(),
            messages: Arc::clone(&self.published_messages),
            input: self.input.clone(),
            exchanges_finished: self.exchanges_finished,
            last_outcome: self.last_outcome.clone(),
        });
    }
}

/// Open the reply stream for one exchange and forward its frames in order.
///
/// Every suspension point is raced against `cancel`; once it fires nothing
/// further is forwarded, even frames already decoded from the last read.
#[allow(clippy::too_many_lines)]
async fn pump_stream<C: ChatClient + ?Sized>(
    client: Arc<C>,
    url: String,
    exchange: Exchange,
    cancel: CancellationToken,
    event_tx: mpsc::Sender<Event>,
) {
    let exchange_id = exchange.id;
    let request = ChatRequest::new(exchange.prompt);

    tracing::info!(
        exchange_id = %exchange_id,
        message_id = %exchange.origin,
        "Opening reply stream"
    );

    let opened = tokio::select! {
        biased;

        () = cancel.cancelled() => {
            tracing::info!(exchange_id = %exchange_id, "Reply stream cancelled before opening");
            return;
        }

        result = client.open(&url, &request) => result,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            forward(
                &event_tx,
                &cancel,
                Event::StreamFailed {
                    exchange_id,
                    failure: StreamFailure::Transport { message: e.message },
                },
            )
            .await;
            return;
        }
    };

    if !forward(&event_tx, &cancel, Event::StreamOpened { exchange_id }).await {
        return;
    }

    let mut decoder = FrameDecoder::new();
    let mut frames = 0usize;

    loop {
        let chunk = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                tracing::info!(exchange_id = %exchange_id, frames, "Reply stream cancelled");
                return;
            }

            chunk = stream.next() => chunk,
        };

        match chunk {
            None => {
                if !decoder.is_empty() {
                    tracing::debug!(exchange_id = %exchange_id, "Discarding partial frame at end of stream");
                }
                tracing::info!(exchange_id = %exchange_id, frames, "Reply stream ended");
                forward(&event_tx, &cancel, Event::StreamEnded { exchange_id }).await;
                return;
            }

            Some(Err(e)) => {
                tracing::warn!(exchange_id = %exchange_id, error = %e, "Reply stream read failed");
                forward(
                    &event_tx,
                    &cancel,
                    Event::StreamFailed {
                        exchange_id,
                        failure: StreamFailure::Transport { message: e.message },
                    },
                )
                .await;
                return;
            }

            Some(Ok(bytes)) => {
                for payload in decoder.feed_bytes(&bytes) {
                    let frame = classify(&payload);
                    let ends_exchange = frame.ends_exchange();
                    frames += 1;

                    if let Frame::Control(signal) = &frame {
                        tracing::warn!(
                            exchange_id = %exchange_id,
                            kind = signal.kind(),
                            detail = signal.detail(),
                            "Service signalled an error"
                        );
                    }

                    if !forward(&event_tx, &cancel, Event::FrameReceived { exchange_id, frame })
                        .await
                    {
                        return;
                    }
                    if ends_exchange {
                        // Anything after a terminal or error frame is never applied
                        tracing::debug!(exchange_id = %exchange_id, frames, "Reply stream finished by frame");
                        return;
                    }
                }
            }
        }
    }
}

/// Send `event` to the runtime unless the exchange was cancelled.
///
/// Returns false when the pump should stop.
async fn forward(
    event_tx: &mpsc::Sender<Event>,
    cancel: &CancellationToken,
    event: Event,
) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    event_tx.send(event).await.is_ok()
}
