use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Stream terminator sent by `OpenAI`-compatible upstreams.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One `data:` record of an `OpenAI` Chat Completion stream.
///
/// Only the fields the translator reads are modelled; everything else is
/// ignored so that provider-specific extras never fail the parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Option<Vec<ChatStreamChoice>>,
    #[serde(default, deserialize_with = "lenient_usage")]
    pub usage: Option<ChatUsage>,
}

/// A choice within a stream chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatStreamChoice {
    #[serde(default)]
    pub delta: Option<ChatDelta>,
}

/// Incremental content of a single record.
///
/// In practice exactly one of text, reasoning or tool calls is populated per
/// record; `usage` may ride along with any of them or arrive alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallFragment>>,
    #[serde(default, deserialize_with = "lenient_usage")]
    pub usage: Option<ChatUsage>,
}

/// A tool call delta in streaming.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallFragment {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<ToolCallFunctionFragment>,
}

/// Function delta within a streaming tool call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallFunctionFragment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Token accounting reported by the upstream.
///
/// Counts that are missing, `null`, negative or not numbers read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ChatUsage {
    #[serde(default, deserialize_with = "lenient_token_count")]
    pub prompt_tokens: u64,
    #[serde(default, deserialize_with = "lenient_token_count")]
    pub completion_tokens: u64,
}

fn lenient_token_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map_or(0, token_count_of))
}

fn token_count_of(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f > 0.0)
                .map_or(0, |f| f as u64)
        }),
        _ => 0,
    }
}

/// A non-object `usage` is treated as absent instead of failing the record.
fn lenient_usage<'de, D>(deserializer: D) -> Result<Option<ChatUsage>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(fields)) => Some(ChatUsage {
            prompt_tokens: fields.get("prompt_tokens").map_or(0, token_count_of),
            completion_tokens: fields.get("completion_tokens").map_or(0, token_count_of),
        }),
        _ => None,
    })
}

/// A parsed `data:` payload.
#[derive(Debug, Clone)]
pub enum ChatRecord {
    Done,
    Delta(ChatDelta),
}

/// Parse one `data:` payload into a [`ChatRecord`].
///
/// The first choice's delta is folded together with the record's top-level
/// `usage`; a `usage` carried inside the delta takes precedence.
///
/// # Errors
///
/// Returns the `serde_json` error when the payload is not a chunk document.
pub fn parse_chat_record(payload: &str) -> Result<ChatRecord, serde_json::Error> {
    if payload == DONE_SENTINEL {
        return Ok(ChatRecord::Done);
    }
    let chunk: ChatCompletionChunk = serde_json::from_str(payload)?;
    Ok(ChatRecord::Delta(chunk.into_delta()))
}

impl ChatCompletionChunk {
    #[must_use]
    pub fn into_delta(self) -> ChatDelta {
        let mut delta = self
            .choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.delta)
            .unwrap_or_default();
        if delta.usage.is_none() {
            delta.usage = self.usage;
        }
        delta
    }
}

impl ChatDelta {
    /// Plain assistant text, if non-empty.
    #[must_use]
    pub fn text_fragment(&self) -> Option<&str> {
        non_empty(self.content.as_deref())
    }

    /// Reasoning text, accepting both `reasoning` and `reasoning_content`.
    #[must_use]
    pub fn reasoning_fragment(&self) -> Option<&str> {
        non_empty(self.reasoning.as_deref()).or_else(|| non_empty(self.reasoning_content.as_deref()))
    }

    #[must_use]
    pub fn tool_call_fragments(&self) -> &[ToolCallFragment] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

impl ToolCallFragment {
    #[must_use]
    pub fn call_id(&self) -> Option<&str> {
        non_empty(self.id.as_deref())
    }

    #[must_use]
    pub fn function_name(&self) -> Option<&str> {
        self.function.as_ref().and_then(|f| f.name.as_deref())
    }

    #[must_use]
    pub fn arguments_chunk(&self) -> Option<&str> {
        non_empty(self.function.as_ref().and_then(|f| f.arguments.as_deref()))
    }
}

#[inline]
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_of(payload: &str) -> ChatDelta {
        match parse_chat_record(payload).expect("parse") {
            ChatRecord::Delta(delta) => delta,
            ChatRecord::Done => panic!("unexpected done"),
        }
    }

    #[test]
    fn test_parse_done_sentinel() {
        assert!(matches!(
            parse_chat_record("[DONE]").expect("parse"),
            ChatRecord::Done
        ));
    }

    #[test]
    fn test_parse_text_delta() {
        let delta = delta_of(r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hi"}}]}"#);
        assert_eq!(delta.text_fragment(), Some("Hi"));
        assert!(delta.reasoning_fragment().is_none());
        assert!(delta.tool_call_fragments().is_empty());
        assert!(delta.usage.is_none());
    }

    #[test]
    fn test_empty_content_is_absent() {
        let delta = delta_of(r#"{"choices":[{"delta":{"role":"assistant","content":""}}]}"#);
        assert!(delta.text_fragment().is_none());
    }

    #[test]
    fn test_reasoning_content_alias() {
        let delta = delta_of(r#"{"choices":[{"delta":{"reasoning_content":"hmm"}}]}"#);
        assert_eq!(delta.reasoning_fragment(), Some("hmm"));

        let both = delta_of(r#"{"choices":[{"delta":{"reasoning":"a","reasoning_content":"b"}}]}"#);
        assert_eq!(both.reasoning_fragment(), Some("a"));
    }

    #[test]
    fn test_parse_tool_call_fragments() {
        let delta = delta_of(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"get_weather","arguments":""}}]}}]}"#,
        );
        let fragments = delta.tool_call_fragments();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].call_id(), Some("call_1"));
        assert_eq!(fragments[0].function_name(), Some("get_weather"));
        assert!(fragments[0].arguments_chunk().is_none());

        let cont = delta_of(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"city\""}}]}}]}"#,
        );
        let fragments = cont.tool_call_fragments();
        assert!(fragments[0].call_id().is_none());
        assert_eq!(fragments[0].arguments_chunk(), Some("{\"city\""));
    }

    #[test]
    fn test_top_level_usage_without_choices() {
        let delta = delta_of(r#"{"usage":{"prompt_tokens":100,"completion_tokens":50},"choices":[]}"#);
        assert_eq!(
            delta.usage,
            Some(ChatUsage {
                prompt_tokens: 100,
                completion_tokens: 50
            })
        );
    }

    #[test]
    fn test_delta_usage_wins_over_top_level() {
        let delta = delta_of(
            r#"{"usage":{"prompt_tokens":1,"completion_tokens":1},"choices":[{"delta":{"usage":{"prompt_tokens":9,"completion_tokens":8}}}]}"#,
        );
        assert_eq!(delta.usage.map(|u| u.prompt_tokens), Some(9));
    }

    #[test]
    fn test_null_fields_tolerated() {
        let delta = delta_of(r#"{"choices":null,"usage":null}"#);
        assert!(delta.text_fragment().is_none());
        assert!(delta.usage.is_none());
    }

    #[test]
    fn test_odd_token_counts_keep_content() {
        let delta = delta_of(
            r#"{"choices":[{"delta":{"content":"Hello"}}],"usage":{"prompt_tokens":null,"completion_tokens":3}}"#,
        );
        assert_eq!(delta.text_fragment(), Some("Hello"));
        assert_eq!(
            delta.usage,
            Some(ChatUsage {
                prompt_tokens: 0,
                completion_tokens: 3
            })
        );

        let floats = delta_of(
            r#"{"choices":[{"delta":{"content":"x"}}],"usage":{"prompt_tokens":10.0,"completion_tokens":-2}}"#,
        );
        assert_eq!(floats.text_fragment(), Some("x"));
        assert_eq!(floats.usage.map(|u| (u.prompt_tokens, u.completion_tokens)), Some((10, 0)));

        let strings = delta_of(r#"{"choices":[{"delta":{"content":"y"}}],"usage":{"prompt_tokens":"7"}}"#);
        assert_eq!(strings.usage.map(|u| u.prompt_tokens), Some(0));
    }

    #[test]
    fn test_non_object_usage_is_absent() {
        let delta = delta_of(r#"{"choices":[{"delta":{"content":"z","usage":"n/a"}}],"usage":42}"#);
        assert_eq!(delta.text_fragment(), Some("z"));
        assert!(delta.usage.is_none());
    }

    #[test]
    fn test_malformed_payload_is_error() {
        assert!(parse_chat_record("{not json").is_err());
        assert!(parse_chat_record("").is_err());
    }
}
