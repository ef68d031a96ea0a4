pub mod stream;

/// Reason reported in the final `message_delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    EndTurn,
    ToolUse,
}

impl StopReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StopReason::EndTurn => "end_turn",
            StopReason::ToolUse => "tool_use",
        }
    }
}

/// Anthropic usage as rendered in `message_start` / `message_delta`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Descriptor carried by `content_block_start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockStart {
    Text,
    Thinking,
    ToolUse { id: String, name: Option<String> },
}

/// Payload carried by `content_block_delta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockDelta {
    Text(String),
    Thinking(String),
    InputJson(String),
}

/// One Anthropic Messages stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageEvent {
    MessageStart {
        id: String,
        model: String,
    },
    ContentBlockStart {
        index: usize,
        block: BlockStart,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        stop_reason: StopReason,
        usage: MessageUsage,
    },
    MessageStop,
}

impl MessageEvent {
    /// SSE `event:` name of this event.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            MessageEvent::MessageStart { .. } => "message_start",
            MessageEvent::ContentBlockStart { .. } => "content_block_start",
            MessageEvent::ContentBlockDelta { .. } => "content_block_delta",
            MessageEvent::ContentBlockStop { .. } => "content_block_stop",
            MessageEvent::MessageDelta { .. } => "message_delta",
            MessageEvent::MessageStop => "message_stop",
        }
    }

    /// Index of the content block this event belongs to, if any.
    #[must_use]
    pub const fn block_index(&self) -> Option<usize> {
        match self {
            MessageEvent::ContentBlockStart { index, .. }
            | MessageEvent::ContentBlockDelta { index, .. }
            | MessageEvent::ContentBlockStop { index } => Some(*index),
            _ => None,
        }
    }
}
