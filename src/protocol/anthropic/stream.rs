use crate::protocol::anthropic::{BlockDelta, BlockStart, MessageEvent};
use crate::util::{push_json_string_escaped, push_u64_decimal, push_usize_decimal};

/// Encode a message event into its `data:` JSON payload.
#[must_use]
pub fn encode_message_event_json(event: &MessageEvent, thinking_signature: &str) -> String {
    let mut json = String::with_capacity(estimated_json_capacity(event));
    push_message_event_json(&mut json, event, thinking_signature);
    json
}

/// Encode a message event directly into a full Anthropic SSE frame.
///
/// `out` is cleared first. The frame is `event: {type}\ndata: {json}\n\n`.
pub fn encode_message_event_frame(event: &MessageEvent, thinking_signature: &str, out: &mut String) {
    out.clear();
    out.reserve(estimated_json_capacity(event) + 32);
    out.push_str("event: ");
    out.push_str(event.event_type());
    out.push_str("\ndata: ");
    push_message_event_json(out, event, thinking_signature);
    out.push_str("\n\n");
}

fn estimated_json_capacity(event: &MessageEvent) -> usize {
    match event {
        MessageEvent::MessageStart { id, model } => 192 + id.len() + model.len(),
        MessageEvent::ContentBlockStart { block, .. } => match block {
            BlockStart::ToolUse { id, name } => {
                112 + id.len() + name.as_ref().map_or(0, String::len)
            }
            BlockStart::Text | BlockStart::Thinking => 112,
        },
        MessageEvent::ContentBlockDelta { delta, .. } => {
            let payload = match delta {
                BlockDelta::Text(s) | BlockDelta::Thinking(s) | BlockDelta::InputJson(s) => s.len(),
            };
            96 + payload
        }
        MessageEvent::ContentBlockStop { .. } => 48,
        MessageEvent::MessageDelta { .. } => 128,
        MessageEvent::MessageStop => 24,
    }
}

fn push_message_event_json(out: &mut String, event: &MessageEvent, thinking_signature: &str) {
    match event {
        MessageEvent::MessageStart { id, model } => {
            out.push_str("{\"type\":\"message_start\",\"message\":{\"id\":");
            push_json_string_escaped(out, id);
            out.push_str(",\"type\":\"message\",\"role\":\"assistant\",\"content\":[],\"model\":");
            push_json_string_escaped(out, model);
            out.push_str(
                ",\"stop_reason\":null,\"stop_sequence\":null,\"usage\":{\"input_tokens\":0,\"output_tokens\":0}}}",
            );
        }
        MessageEvent::ContentBlockStart { index, block } => {
            out.push_str("{\"type\":\"content_block_start\",\"index\":");
            push_usize_decimal(out, *index);
            match block {
                BlockStart::Text => {
                    out.push_str(",\"content_block\":{\"type\":\"text\",\"text\":\"\"}}");
                }
                BlockStart::Thinking => {
                    out.push_str(
                        ",\"content_block\":{\"type\":\"thinking\",\"thinking\":\"\",\"signature\":",
                    );
                    push_json_string_escaped(out, thinking_signature);
                    out.push_str("}}");
                }
                BlockStart::ToolUse { id, name } => {
                    out.push_str(",\"content_block\":{\"type\":\"tool_use\",\"id\":");
                    push_json_string_escaped(out, id);
                    // An absent function name is omitted rather than rendered as null.
                    if let Some(name) = name {
                        out.push_str(",\"name\":");
                        push_json_string_escaped(out, name);
                    }
                    out.push_str(",\"input\":{}}}");
                }
            }
        }
        MessageEvent::ContentBlockDelta { index, delta } => {
            out.push_str("{\"type\":\"content_block_delta\",\"index\":");
            push_usize_decimal(out, *index);
            match delta {
                BlockDelta::Text(text) => {
                    out.push_str(",\"delta\":{\"type\":\"text_delta\",\"text\":");
                    push_json_string_escaped(out, text);
                }
                BlockDelta::Thinking(thinking) => {
                    out.push_str(",\"delta\":{\"type\":\"thinking_delta\",\"thinking\":");
                    push_json_string_escaped(out, thinking);
                }
                BlockDelta::InputJson(partial_json) => {
                    out.push_str(",\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":");
                    push_json_string_escaped(out, partial_json);
                }
            }
            out.push_str("}}");
        }
        MessageEvent::ContentBlockStop { index } => {
            out.push_str("{\"type\":\"content_block_stop\",\"index\":");
            push_usize_decimal(out, *index);
            out.push('}');
        }
        MessageEvent::MessageDelta { stop_reason, usage } => {
            out.push_str("{\"type\":\"message_delta\",\"delta\":{\"stop_reason\":");
            push_json_string_escaped(out, stop_reason.as_str());
            out.push_str(",\"stop_sequence\":null},\"usage\":{\"input_tokens\":");
            push_u64_decimal(out, usage.input_tokens);
            out.push_str(",\"output_tokens\":");
            push_u64_decimal(out, usage.output_tokens);
            out.push_str("}}");
        }
        MessageEvent::MessageStop => {
            out.push_str("{\"type\":\"message_stop\"}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::anthropic::{MessageUsage, StopReason};
    use serde_json::json;

    const SIG: &str = "openrouter-reasoning";

    fn json_of(event: &MessageEvent) -> serde_json::Value {
        serde_json::from_str(&encode_message_event_json(event, SIG)).expect("valid json")
    }

    #[test]
    fn test_message_start_shape() {
        let event = MessageEvent::MessageStart {
            id: "msg_1".into(),
            model: "test-model".into(),
        };
        assert_eq!(
            json_of(&event),
            json!({
                "type": "message_start",
                "message": {
                    "id": "msg_1",
                    "type": "message",
                    "role": "assistant",
                    "content": [],
                    "model": "test-model",
                    "stop_reason": null,
                    "stop_sequence": null,
                    "usage": {"input_tokens": 0, "output_tokens": 0}
                }
            })
        );
    }

    #[test]
    fn test_block_start_shapes() {
        let text = MessageEvent::ContentBlockStart {
            index: 0,
            block: BlockStart::Text,
        };
        assert_eq!(
            json_of(&text),
            json!({"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}})
        );

        let thinking = MessageEvent::ContentBlockStart {
            index: 1,
            block: BlockStart::Thinking,
        };
        assert_eq!(
            json_of(&thinking),
            json!({"type":"content_block_start","index":1,"content_block":{"type":"thinking","thinking":"","signature":SIG}})
        );

        let tool = MessageEvent::ContentBlockStart {
            index: 2,
            block: BlockStart::ToolUse {
                id: "call_1".into(),
                name: Some("get_weather".into()),
            },
        };
        assert_eq!(
            json_of(&tool),
            json!({"type":"content_block_start","index":2,"content_block":{"type":"tool_use","id":"call_1","name":"get_weather","input":{}}})
        );
    }

    #[test]
    fn test_tool_use_without_name_omits_field() {
        let tool = MessageEvent::ContentBlockStart {
            index: 0,
            block: BlockStart::ToolUse {
                id: "call_x".into(),
                name: None,
            },
        };
        let value = json_of(&tool);
        assert!(value["content_block"].get("name").is_none());
        assert_eq!(value["content_block"]["id"], "call_x");
    }

    #[test]
    fn test_delta_shapes_escape_payload() {
        let args = MessageEvent::ContentBlockDelta {
            index: 3,
            delta: BlockDelta::InputJson("{\"city\":\"S".into()),
        };
        assert_eq!(
            json_of(&args),
            json!({"type":"content_block_delta","index":3,"delta":{"type":"input_json_delta","partial_json":"{\"city\":\"S"}})
        );

        let text = MessageEvent::ContentBlockDelta {
            index: 0,
            delta: BlockDelta::Text("line\n\"quoted\"".into()),
        };
        assert_eq!(json_of(&text)["delta"]["text"], "line\n\"quoted\"");

        let thinking = MessageEvent::ContentBlockDelta {
            index: 0,
            delta: BlockDelta::Thinking("hmm".into()),
        };
        assert_eq!(json_of(&thinking)["delta"]["type"], "thinking_delta");
    }

    #[test]
    fn test_message_delta_and_stop_frames() {
        let mut frame = String::new();
        encode_message_event_frame(
            &MessageEvent::MessageDelta {
                stop_reason: StopReason::ToolUse,
                usage: MessageUsage {
                    input_tokens: 100,
                    output_tokens: 50,
                },
            },
            SIG,
            &mut frame,
        );
        assert_eq!(
            frame,
            "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"tool_use\",\"stop_sequence\":null},\"usage\":{\"input_tokens\":100,\"output_tokens\":50}}\n\n"
        );

        encode_message_event_frame(&MessageEvent::MessageStop, SIG, &mut frame);
        assert_eq!(
            frame,
            "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n"
        );
    }

    #[test]
    fn test_frame_matches_json_render() {
        let event = MessageEvent::ContentBlockStop { index: 7 };
        let json = encode_message_event_json(&event, SIG);
        let mut frame = String::new();
        encode_message_event_frame(&event, SIG, &mut frame);
        assert_eq!(frame, format!("event: content_block_stop\ndata: {json}\n\n"));
    }
}
