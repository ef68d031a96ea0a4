pub mod sse;
pub mod translator;

pub use sse::{extract_data_payload, DataLineParser, Utf8ChunkDecoder};
pub use translator::{ContentBlockState, StreamTranslator, TranslatorStats};

use std::time::Instant;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use smallvec::SmallVec;

use crate::observability::log_stream_complete;
use crate::protocol::anthropic::stream::encode_message_event_frame;
use crate::protocol::anthropic::MessageEvent;
use crate::protocol::openai_chat::{parse_chat_record, ChatRecord};
use crate::util::next_message_id;

/// Placeholder signature attached to `thinking` block starts.
pub const DEFAULT_THINKING_SIGNATURE: &str = "openrouter-reasoning";

/// Per-call knobs for [`translate_with_options`].
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    /// Echoed verbatim into `message_start`.
    pub model: String,
    /// Fixed message id; a fresh `msg_…` id is generated when `None`.
    pub message_id: Option<String>,
    pub thinking_signature: String,
    /// Keep a per-call copy of streamed tool arguments while the call is open.
    pub track_tool_arguments: bool,
}

impl TranslateOptions {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            message_id: None,
            thinking_signature: DEFAULT_THINKING_SIGNATURE.to_string(),
            track_tool_arguments: true,
        }
    }

    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    #[must_use]
    pub fn with_thinking_signature(mut self, signature: impl Into<String>) -> Self {
        self.thinking_signature = signature.into();
        self
    }

    #[must_use]
    pub fn with_tool_argument_tracking(mut self, enabled: bool) -> Self {
        self.track_tool_arguments = enabled;
        self
    }
}

/// Translate an `OpenAI` chat-completion SSE byte stream into an Anthropic
/// message-event SSE byte stream.
///
/// See [`translate_with_options`].
pub fn translate<S, E>(input: S, model: impl Into<String>) -> impl Stream<Item = Result<Bytes, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    translate_with_options(input, TranslateOptions::new(model))
}

/// Translate with explicit [`TranslateOptions`].
///
/// The returned stream is lazy and pull-driven: `message_start` is produced on
/// the first poll without touching the input, and each later frame becomes
/// available as soon as the upstream record that caused it has been parsed.
/// Every item is exactly one `event: …\ndata: …\n\n` frame.
///
/// When the input ends (with or without a `[DONE]` record) any open content
/// block is closed and `message_delta` / `message_stop` are emitted. When the
/// input yields an error the same finalization frames are emitted first and
/// the error is then yielded as the last item.
pub fn translate_with_options<S, E>(
    input: S,
    options: TranslateOptions,
) -> impl Stream<Item = Result<Bytes, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    futures_util::stream::unfold(
        TranslateState::new(Box::pin(input), options),
        |mut state| async move {
            loop {
                if let Some(frame) = state.pending.pop_front() {
                    return Some((Ok(frame), state));
                }
                if let Some(err) = state.deferred_error.take() {
                    return Some((Err(err), state));
                }
                if state.translator.is_finished() {
                    return None;
                }

                match state.input.as_mut().next().await {
                    Some(Ok(chunk)) => state.ingest(&chunk),
                    Some(Err(err)) => {
                        tracing::warn!(
                            message_id = %state.translator.message_id(),
                            "upstream stream failed; finalizing translated stream"
                        );
                        state.finish();
                        state.deferred_error = Some(err);
                    }
                    None => state.finish(),
                }
            }
        },
    )
}

struct PendingFrames {
    frames: SmallVec<[Bytes; 8]>,
    head: usize,
}

impl PendingFrames {
    #[inline]
    fn new() -> Self {
        Self {
            frames: SmallVec::new(),
            head: 0,
        }
    }

    #[inline]
    fn pop_front(&mut self) -> Option<Bytes> {
        if self.head >= self.frames.len() {
            return None;
        }
        let frame = std::mem::take(&mut self.frames[self.head]);
        self.head += 1;
        if self.head == self.frames.len() {
            self.frames.clear();
            self.head = 0;
        }
        Some(frame)
    }

    #[inline]
    fn push(&mut self, frame: Bytes) {
        self.frames.push(frame);
    }
}

struct TranslateState<S, E> {
    input: std::pin::Pin<Box<S>>,
    decoder: Utf8ChunkDecoder,
    lines: DataLineParser,
    translator: StreamTranslator,
    thinking_signature: String,
    text: String,
    events: Vec<MessageEvent>,
    pending: PendingFrames,
    deferred_error: Option<E>,
    started_at: Instant,
}

impl<S, E> TranslateState<S, E> {
    fn new(input: std::pin::Pin<Box<S>>, options: TranslateOptions) -> Self {
        let message_id = options.message_id.unwrap_or_else(next_message_id);
        let translator = StreamTranslator::new(message_id, options.model)
            .with_argument_tracking(options.track_tool_arguments);
        let mut state = Self {
            input,
            decoder: Utf8ChunkDecoder::new(),
            lines: DataLineParser::new(),
            translator,
            thinking_signature: options.thinking_signature,
            text: String::new(),
            events: Vec::with_capacity(8),
            pending: PendingFrames::new(),
            deferred_error: None,
            started_at: Instant::now(),
        };
        state.translator.start(&mut state.events);
        state.flush_events();
        state
    }

    fn ingest(&mut self, chunk: &[u8]) {
        self.text.clear();
        self.decoder.decode_into(chunk, &mut self.text);
        let translator = &mut self.translator;
        let events = &mut self.events;
        self.lines
            .feed(&self.text, |payload| fold_payload(translator, payload, events));
        self.flush_events();
    }

    fn finish(&mut self) {
        self.text.clear();
        self.decoder.finish_into(&mut self.text);
        let translator = &mut self.translator;
        let events = &mut self.events;
        self.lines
            .feed(&self.text, |payload| fold_payload(translator, payload, events));
        self.lines
            .finish(|payload| fold_payload(translator, payload, events));
        let stop_reason = translator.stop_reason();
        translator.finish(events);
        self.flush_events();

        log_stream_complete(&self.translator, stop_reason, self.started_at);
    }

    fn flush_events(&mut self) {
        for event in self.events.drain(..) {
            let mut frame = String::new();
            encode_message_event_frame(&event, &self.thinking_signature, &mut frame);
            self.pending.push(Bytes::from(frame));
        }
    }
}

fn fold_payload(translator: &mut StreamTranslator, payload: &str, events: &mut Vec<MessageEvent>) {
    match parse_chat_record(payload) {
        Ok(ChatRecord::Done) => {}
        Ok(ChatRecord::Delta(delta)) => translator.fold(&delta, events),
        Err(err) => {
            translator.record_skipped();
            tracing::debug!(
                message_id = %translator.message_id(),
                error = %err,
                payload_len = payload.len(),
                "skipping unparseable upstream record"
            );
        }
    }
}
