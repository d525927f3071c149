//! Property-based tests for the state machine
//!
//! Event sequences are driven through `transition` and the resulting effects
//! are applied to a conversation the way the runtime would, so the invariants
//! are checked against observable message state.

use super::transition::*;
use super::*;
use crate::conversation::{Conversation, Message, MessageId};
use crate::stream::Frame;
use proptest::prelude::*;

// ============================================================================
// Test Harness
// ============================================================================

/// Minimal model of the runtime: state, store, and a fresh-id counter
struct Model {
    state: ChatState,
    conversation: Conversation,
    next_id: u64,
    finished: Vec<(ExchangeId, ExchangeOutcome)>,
}

impl Model {
    fn new() -> Self {
        Self {
            state: ChatState::Idle,
            conversation: Conversation::new(),
            next_id: 1,
            finished: vec![],
        }
    }

    fn fresh(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Turn an abstract step into a concrete event for the current state
    fn event_for(&mut self, step: &Step) -> Event {
        let current = self.state.exchange().map_or(ExchangeId::new(0), |e| e.id);
        match step {
            Step::Send(text) => Event::UserSend {
                text: text.clone(),
                message_id: MessageId::new(self.fresh()),
                exchange_id: ExchangeId::new(self.fresh()),
                reply_id: MessageId::new(self.fresh()),
            },
            Step::Resend(index) => {
                let target = self
                    .conversation
                    .messages()
                    .get(*index % self.conversation.len().max(1))
                    .map_or(MessageId::new(0), |m| m.id);
                Event::UserResend {
                    message_id: target,
                    exchange_id: ExchangeId::new(self.fresh()),
                    reply_id: MessageId::new(self.fresh()),
                }
            }
            Step::Stop => Event::UserStop,
            Step::Opened => Event::StreamOpened {
                exchange_id: current,
            },
            Step::Frame(frame) => Event::FrameReceived {
                exchange_id: current,
                frame: frame.clone(),
            },
            Step::StaleFrame(frame) => Event::FrameReceived {
                exchange_id: ExchangeId::new(u64::MAX),
                frame: frame.clone(),
            },
            Step::Ended => Event::StreamEnded {
                exchange_id: current,
            },
            Step::Failed => Event::StreamFailed {
                exchange_id: current,
                failure: StreamFailure::Transport {
                    message: "reset".to_string(),
                },
            },
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::AppendUserMessage { message_id, text } => {
                    self.conversation.append(Message::user(message_id, text));
                }
                Effect::AppendSegment { message_id, text } => {
                    self.conversation.append_segment(message_id, text);
                }
                Effect::MarkErrored { message_id } => {
                    self.conversation.mark_errored(message_id);
                }
                Effect::ClearErrored { message_id } => {
                    self.conversation.clear_errored(message_id);
                }
                Effect::FinishExchange {
                    exchange_id,
                    outcome,
                } => self.finished.push((exchange_id, outcome)),
                Effect::SetInput { .. }
                | Effect::OpenStream { .. }
                | Effect::CancelStream
                | Effect::Notify { .. } => {}
            }
        }
    }

    fn step(&mut self, step: &Step) -> Result<(), TransitionError> {
        let event = self.event_for(step);
        let result = transition(&self.state, &self.conversation, event)?;
        self.state = result.new_state;
        self.apply(result.effects);
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Step {
    Send(String),
    Resend(usize),
    Stop,
    Opened,
    Frame(Frame),
    StaleFrame(Frame),
    Ended,
    Failed,
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_frame() -> impl Strategy<Value = Frame> {
    prop_oneof![
        4 => "[a-zA-Z ]{1,12}".prop_map(Frame::text),
        1 => "[a-z ]{1,12}".prop_map(Frame::error),
        1 => Just(Frame::Terminal),
    ]
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        2 => "[a-zA-Z ]{0,10}".prop_map(Step::Send),
        1 => (0usize..8).prop_map(Step::Resend),
        1 => Just(Step::Stop),
        2 => Just(Step::Opened),
        4 => arb_frame().prop_map(Step::Frame),
        1 => arb_frame().prop_map(Step::StaleFrame),
        1 => Just(Step::Ended),
        1 => Just(Step::Failed),
    ]
}

fn arb_exchange() -> impl Strategy<Value = Exchange> {
    (1u64..100, "[a-z]{1,10}").prop_map(|(n, prompt)| Exchange {
        id: ExchangeId::new(n),
        origin: MessageId::new(n * 2),
        reply: MessageId::new(n * 2 + 1),
        prompt,
    })
}

fn arb_busy_state() -> impl Strategy<Value = ChatState> {
    prop_oneof![
        arb_exchange().prop_map(|exchange| ChatState::Sending { exchange }),
        arb_exchange().prop_map(|exchange| ChatState::Streaming { exchange }),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Only the exchange in flight ever produces effects
    #[test]
    fn prop_at_most_one_exchange(steps in proptest::collection::vec(arb_step(), 0..40)) {
        let mut model = Model::new();
        for step in &steps {
            let before = model.state.exchange().map(|e| e.id);
            if model.step(step).is_ok() {
                if let (Some(before), Some(after)) = (before, model.state.exchange().map(|e| e.id)) {
                    prop_assert_eq!(before, after, "Exchange replaced while busy");
                }
            }
        }
        // Every finished exchange finishes once
        let mut ids: Vec<_> = model.finished.iter().map(|(id, _)| *id).collect();
        let len = ids.len();
        ids.sort_by_key(ToString::to_string);
        ids.dedup();
        prop_assert_eq!(ids.len(), len);
    }

    // Send and resend are rejected while an exchange is active
    #[test]
    fn prop_busy_rejects_new_exchanges(state in arb_busy_state(), text in "[a-z]{1,10}") {
        let conv = Conversation::new();
        let send = Event::UserSend {
            text,
            message_id: MessageId::new(500),
            exchange_id: ExchangeId::new(500),
            reply_id: MessageId::new(501),
        };
        prop_assert_eq!(transition(&state, &conv, send).unwrap_err(), TransitionError::Busy);

        let resend = Event::UserResend {
            message_id: MessageId::new(500),
            exchange_id: ExchangeId::new(500),
            reply_id: MessageId::new(501),
        };
        prop_assert_eq!(transition(&state, &conv, resend).unwrap_err(), TransitionError::Busy);
    }

    // Stopping always lands in Idle and never sets an error flag
    #[test]
    fn prop_stop_never_marks_errored(state in arb_busy_state()) {
        let result = transition(&state, &Conversation::new(), Event::UserStop).unwrap();
        prop_assert!(result.new_state.is_idle());
        prop_assert!(result.effects.contains(&Effect::CancelStream));
        let touches_messages = result.effects.iter().any(|e| matches!(
            e,
            Effect::MarkErrored { .. } | Effect::Notify { .. } | Effect::AppendSegment { .. }
        ));
        prop_assert!(!touches_messages, "Stop produced {:?}", result.effects);
    }

    // Nothing from a cancelled or foreign exchange mutates the conversation
    #[test]
    fn prop_stale_frames_rejected(
        steps in proptest::collection::vec(arb_step(), 0..20),
        frame in arb_frame(),
    ) {
        let mut model = Model::new();
        for step in &steps {
            let _ = model.step(step);
        }
        let snapshot = model.conversation.clone();
        let result = model.step(&Step::StaleFrame(frame));
        prop_assert!(matches!(result, Err(TransitionError::StaleExchange(_))));
        prop_assert_eq!(snapshot, model.conversation);
    }

    // After an error frame the exchange is over: later frames are discarded
    #[test]
    fn prop_error_short_circuits(
        prompt in "[a-z]{1,10}",
        before in proptest::collection::vec("[a-z]{1,8}", 0..4),
        after in proptest::collection::vec(arb_frame(), 0..6),
    ) {
        let mut model = Model::new();
        model.step(&Step::Send(prompt)).unwrap();
        model.step(&Step::Opened).unwrap();
        for text in &before {
            model.step(&Step::Frame(Frame::text(text.clone()))).unwrap();
        }
        model.step(&Step::Frame(Frame::error("boom"))).unwrap();
        prop_assert!(model.state.is_idle());

        let snapshot = model.conversation.clone();
        for frame in after {
            prop_assert!(model.step(&Step::Frame(frame)).is_err());
        }
        prop_assert_eq!(&snapshot, &model.conversation);

        let origin = model.conversation.messages().first().unwrap();
        prop_assert!(origin.errored);
        let expected_len = if before.is_empty() { 1 } else { 2 };
        prop_assert_eq!(model.conversation.len(), expected_len);
    }

    // Text frames accumulate in order as segments of one bot message
    #[test]
    fn prop_segments_accumulate_in_order(
        prompt in "[a-z]{1,10}",
        texts in proptest::collection::vec("[a-zA-Z ]{1,8}", 1..8),
    ) {
        let mut model = Model::new();
        model.step(&Step::Send(prompt)).unwrap();
        model.step(&Step::Opened).unwrap();
        for text in &texts {
            model.step(&Step::Frame(Frame::text(text.clone()))).unwrap();
        }
        model.step(&Step::Frame(Frame::Terminal)).unwrap();

        prop_assert_eq!(model.conversation.len(), 2);
        let reply = model.conversation.last().unwrap();
        prop_assert!(!reply.is_user());
        prop_assert_eq!(&reply.segments, &texts);
        prop_assert_eq!(&model.finished.last().unwrap().1, &Ok(()));
    }

    // Successful completion never leaves an error flag behind
    #[test]
    fn prop_resend_clears_flag(prompt in "[a-z]{1,10}") {
        let mut model = Model::new();
        model.step(&Step::Send(prompt)).unwrap();
        model.step(&Step::Failed).unwrap();
        prop_assert!(model.conversation.messages()[0].errored);

        model.step(&Step::Resend(0)).unwrap();
        prop_assert!(!model.conversation.messages()[0].errored);
        model.step(&Step::Opened).unwrap();
        model.step(&Step::Frame(Frame::text("ok"))).unwrap();
        model.step(&Step::Ended).unwrap();
        prop_assert!(!model.conversation.messages()[0].errored);
    }
}
