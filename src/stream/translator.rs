use rustc_hash::FxHashMap;

use crate::protocol::anthropic::{BlockDelta, BlockStart, MessageEvent, MessageUsage, StopReason};
use crate::protocol::openai_chat::{ChatDelta, ChatUsage, ToolCallFragment};

/// The content block currently open on the output side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContentBlockState {
    #[default]
    None,
    Text,
    Thinking,
    ToolUse {
        call_id: String,
        function_name: Option<String>,
    },
}

impl ContentBlockState {
    fn is_tool_call(&self, id: &str) -> bool {
        matches!(self, ContentBlockState::ToolUse { call_id, .. } if call_id == id)
    }
}

/// Counters surfaced in the completion log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslatorStats {
    pub records: u64,
    pub skipped_records: u64,
    pub orphan_fragments: u64,
    pub blocks: usize,
}

/// Content-block state machine that folds upstream deltas into Anthropic
/// message events.
///
/// Every input delta goes through [`StreamTranslator::fold`], which mutates
/// the translator and appends zero or more events to a caller-provided
/// buffer. [`StreamTranslator::finish`] closes any open block and appends the
/// terminal `message_delta` / `message_stop` pair.
///
/// Invariants upheld:
/// - at most one block is open at a time;
/// - every `content_block_start` has a matching `content_block_stop`;
/// - block indices are contiguous from 0 and never reused;
/// - `message_start` precedes, and `message_delta`/`message_stop` follow,
///   every block event, each exactly once.
#[derive(Debug)]
pub struct StreamTranslator {
    message_id: String,
    model: String,
    block: ContentBlockState,
    index: usize,
    tool_arguments: Option<FxHashMap<String, String>>,
    usage: Option<ChatUsage>,
    stats: TranslatorStats,
    started: bool,
    finished: bool,
}

impl StreamTranslator {
    #[must_use]
    pub fn new(message_id: String, model: String) -> Self {
        Self {
            message_id,
            model,
            block: ContentBlockState::None,
            index: 0,
            tool_arguments: Some(FxHashMap::default()),
            usage: None,
            stats: TranslatorStats::default(),
            started: false,
            finished: false,
        }
    }

    /// Enable or disable per-call argument accumulation.
    ///
    /// Arguments are always streamed as they arrive; the accumulated copy is
    /// only kept for inspection through [`StreamTranslator::open_tool_arguments`].
    #[must_use]
    pub fn with_argument_tracking(mut self, enabled: bool) -> Self {
        self.tool_arguments = enabled.then(FxHashMap::default);
        self
    }

    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn block(&self) -> &ContentBlockState {
        &self.block
    }

    #[must_use]
    pub fn stats(&self) -> TranslatorStats {
        self.stats
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Best-known usage so far, zero when never reported.
    #[must_use]
    pub fn usage(&self) -> MessageUsage {
        self.usage.map_or_else(MessageUsage::default, |usage| MessageUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }

    /// Accumulated argument text of the currently open tool call.
    #[must_use]
    pub fn open_tool_arguments(&self) -> Option<&str> {
        let ContentBlockState::ToolUse { call_id, .. } = &self.block else {
            return None;
        };
        self.tool_arguments
            .as_ref()
            .and_then(|map| map.get(call_id))
            .map(String::as_str)
    }

    /// Stop reason that would be reported if the stream ended now.
    #[must_use]
    pub fn stop_reason(&self) -> StopReason {
        if matches!(self.block, ContentBlockState::ToolUse { .. }) {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        }
    }

    /// Emit `message_start` once.
    pub fn start(&mut self, out: &mut Vec<MessageEvent>) {
        if self.started {
            return;
        }
        self.started = true;
        out.push(MessageEvent::MessageStart {
            id: self.message_id.clone(),
            model: self.model.clone(),
        });
    }

    /// Count an upstream record that could not be parsed.
    pub fn record_skipped(&mut self) {
        self.stats.skipped_records += 1;
    }

    /// Fold one input delta into the translator state.
    ///
    /// Tool-call fragments take priority over reasoning, and reasoning over
    /// text, when a delta carries more than one kind of content.
    pub fn fold(&mut self, delta: &ChatDelta, out: &mut Vec<MessageEvent>) {
        if self.finished {
            return;
        }
        self.start(out);
        self.stats.records += 1;

        if let Some(usage) = delta.usage {
            self.usage = Some(usage);
        }

        let fragments = delta.tool_call_fragments();
        if !fragments.is_empty() {
            for fragment in fragments {
                self.fold_tool_fragment(fragment, out);
            }
        } else if let Some(reasoning) = delta.reasoning_fragment() {
            self.fold_reasoning(reasoning, out);
        } else if let Some(text) = delta.text_fragment() {
            self.fold_text(text, out);
        }
    }

    /// Close any open block and emit the terminal events.
    ///
    /// Idempotent: a second call emits nothing.
    pub fn finish(&mut self, out: &mut Vec<MessageEvent>) {
        if self.finished {
            return;
        }
        self.start(out);
        let stop_reason = self.stop_reason();
        self.close_block(out);
        out.push(MessageEvent::MessageDelta {
            stop_reason,
            usage: self.usage(),
        });
        out.push(MessageEvent::MessageStop);
        self.finished = true;
    }

    fn fold_tool_fragment(&mut self, fragment: &ToolCallFragment, out: &mut Vec<MessageEvent>) {
        if let Some(call_id) = fragment.call_id() {
            if !self.block.is_tool_call(call_id) {
                self.close_block(out);
                let function_name = fragment.function_name().map(str::to_owned);
                if let Some(map) = self.tool_arguments.as_mut() {
                    map.insert(call_id.to_owned(), String::new());
                }
                self.open_block(
                    BlockStart::ToolUse {
                        id: call_id.to_owned(),
                        name: function_name.clone(),
                    },
                    out,
                );
                self.block = ContentBlockState::ToolUse {
                    call_id: call_id.to_owned(),
                    function_name,
                };
            }
        }

        let Some(arguments) = fragment.arguments_chunk() else {
            return;
        };
        let ContentBlockState::ToolUse { call_id, .. } = &self.block else {
            self.stats.orphan_fragments += 1;
            tracing::debug!(
                message_id = %self.message_id,
                "dropping tool-call arguments with no open call"
            );
            return;
        };
        if let Some(accumulated) = self
            .tool_arguments
            .as_mut()
            .and_then(|map| map.get_mut(call_id))
        {
            accumulated.push_str(arguments);
        }
        out.push(MessageEvent::ContentBlockDelta {
            index: self.index,
            delta: BlockDelta::InputJson(arguments.to_owned()),
        });
    }

    fn fold_reasoning(&mut self, reasoning: &str, out: &mut Vec<MessageEvent>) {
        if matches!(
            self.block,
            ContentBlockState::Text | ContentBlockState::ToolUse { .. }
        ) {
            self.close_block(out);
        }
        if self.block != ContentBlockState::Thinking {
            self.open_block(BlockStart::Thinking, out);
            self.block = ContentBlockState::Thinking;
        }
        out.push(MessageEvent::ContentBlockDelta {
            index: self.index,
            delta: BlockDelta::Thinking(reasoning.to_owned()),
        });
    }

    fn fold_text(&mut self, text: &str, out: &mut Vec<MessageEvent>) {
        if matches!(
            self.block,
            ContentBlockState::Thinking | ContentBlockState::ToolUse { .. }
        ) {
            self.close_block(out);
        }
        if self.block != ContentBlockState::Text {
            self.open_block(BlockStart::Text, out);
            self.block = ContentBlockState::Text;
        }
        out.push(MessageEvent::ContentBlockDelta {
            index: self.index,
            delta: BlockDelta::Text(text.to_owned()),
        });
    }

    fn open_block(&mut self, block: BlockStart, out: &mut Vec<MessageEvent>) {
        self.stats.blocks += 1;
        out.push(MessageEvent::ContentBlockStart {
            index: self.index,
            block,
        });
    }

    /// Close the open block (if any) and advance the index past it.
    fn close_block(&mut self, out: &mut Vec<MessageEvent>) {
        match std::mem::take(&mut self.block) {
            ContentBlockState::None => return,
            ContentBlockState::ToolUse {
                call_id,
                function_name,
            } => {
                if let Some(arguments) = self
                    .tool_arguments
                    .as_mut()
                    .and_then(|map| map.remove(&call_id))
                {
                    tracing::trace!(
                        call_id = %call_id,
                        function = function_name.as_deref().unwrap_or_default(),
                        arguments_len = arguments.len(),
                        "tool call closed"
                    );
                }
            }
            ContentBlockState::Text | ContentBlockState::Thinking => {}
        }
        out.push(MessageEvent::ContentBlockStop { index: self.index });
        self.index += 1;
    }
}
