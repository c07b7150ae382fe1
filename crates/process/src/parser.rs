//! Claude CLI `stream-json` output parsing.
//!
//! With `--include-partial-messages` the CLI interleaves raw API stream
//! events (`content_block_start`, `content_block_delta`, `content_block_stop`,
//! usually wrapped in a `stream_event` envelope) with whole `assistant` and
//! `user` messages. The parser turns both into [`AgentStreamEvent`]s and drops
//! the whole-message copies of blocks that were already streamed.

use clive_core::AgentStreamEvent;
use serde_json::{Map, Value, json};
use std::collections::{HashMap, HashSet};
use tracing::{trace, warn};

#[derive(Debug)]
enum Block {
    Text,
    Thinking,
    Tool {
        id: String,
        name: String,
        args: String,
    },
}

/// Stateful NDJSON line parser, one per process.
#[derive(Debug, Default)]
pub struct StreamJsonParser {
    /// Content blocks in flight, by stream index
    blocks: HashMap<u64, Block>,
    /// tool_use id → tool name, for naming tool results
    tool_names: HashMap<String, String>,
    /// tool_use ids already emitted from partial messages
    streamed_tools: HashSet<String>,
    /// Text was streamed for the current message
    streamed_text: bool,
}

impl StreamJsonParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one output line. Non-JSON lines yield nothing.
    pub fn parse_line(&mut self, line: &str) -> Vec<AgentStreamEvent> {
        let line = line.trim();
        if line.is_empty() {
            return vec![];
        }
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                trace!(error = %e, line = %line, "Ignoring non-JSON CLI output");
                return vec![];
            }
        };

        match value["type"].as_str().unwrap_or("") {
            "stream_event" => self.on_stream_event(&value["event"]),
            "assistant" => self.on_assistant(&value["message"]),
            "user" => self.on_user(&value["message"]),
            "result" => {
                let mut events = Vec::new();
                if value["is_error"].as_bool() == Some(true) {
                    let message = value["result"]
                        .as_str()
                        .or_else(|| value["subtype"].as_str())
                        .unwrap_or("Agent run failed");
                    events.push(AgentStreamEvent::Error {
                        message: message.to_string(),
                    });
                }
                events.push(AgentStreamEvent::Done);
                events
            }
            "error" => {
                let message = value["error"]["message"]
                    .as_str()
                    .or_else(|| value["message"].as_str())
                    .unwrap_or("Unknown agent error");
                vec![AgentStreamEvent::Error {
                    message: message.to_string(),
                }]
            }
            // Bare API events, as printed by older CLI versions
            _ => self.on_stream_event(&value),
        }
    }

    fn on_stream_event(&mut self, event: &Value) -> Vec<AgentStreamEvent> {
        let index = event["index"].as_u64().unwrap_or(0);
        match event["type"].as_str().unwrap_or("") {
            "message_start" => {
                self.streamed_text = false;
                vec![]
            }
            "content_block_start" => {
                let block = &event["content_block"];
                match block["type"].as_str().unwrap_or("") {
                    "tool_use" => {
                        let id = block["id"].as_str().unwrap_or("").to_string();
                        let name = block["name"].as_str().unwrap_or("").to_string();
                        self.tool_names.insert(id.clone(), name.clone());
                        self.streamed_tools.insert(id.clone());
                        self.blocks.insert(
                            index,
                            Block::Tool {
                                id: id.clone(),
                                name: name.clone(),
                                args: String::new(),
                            },
                        );
                        vec![AgentStreamEvent::ToolCallStreamingStart {
                            tool_call_id: id,
                            tool_name: name,
                        }]
                    }
                    "thinking" => {
                        self.blocks.insert(index, Block::Thinking);
                        vec![]
                    }
                    _ => {
                        self.blocks.insert(index, Block::Text);
                        vec![]
                    }
                }
            }
            "content_block_delta" => {
                let delta = &event["delta"];
                match delta["type"].as_str().unwrap_or("") {
                    "text_delta" => {
                        let text = delta["text"].as_str().unwrap_or("");
                        if text.is_empty() {
                            return vec![];
                        }
                        self.streamed_text = true;
                        vec![AgentStreamEvent::TextDelta {
                            content: text.to_string(),
                        }]
                    }
                    "thinking_delta" => {
                        let thinking = delta["thinking"].as_str().unwrap_or("");
                        if thinking.is_empty() {
                            return vec![];
                        }
                        vec![AgentStreamEvent::ThinkingDelta {
                            content: thinking.to_string(),
                        }]
                    }
                    "input_json_delta" => {
                        let partial = delta["partial_json"].as_str().unwrap_or("");
                        match self.blocks.get_mut(&index) {
                            Some(Block::Tool { id, name, args }) if !partial.is_empty() => {
                                args.push_str(partial);
                                vec![AgentStreamEvent::ToolCallDelta {
                                    tool_call_id: id.clone(),
                                    tool_name: name.clone(),
                                    delta: partial.to_string(),
                                }]
                            }
                            _ => vec![],
                        }
                    }
                    _ => vec![],
                }
            }
            "content_block_stop" => match self.blocks.remove(&index) {
                Some(Block::Tool { id, name, args }) => {
                    let args = parse_args(&id, &args);
                    vec![AgentStreamEvent::ToolCall {
                        tool_call_id: id,
                        tool_name: name,
                        args,
                    }]
                }
                _ => vec![],
            },
            _ => vec![],
        }
    }

    fn on_assistant(&mut self, message: &Value) -> Vec<AgentStreamEvent> {
        let Some(content) = message["content"].as_array() else {
            return vec![];
        };
        let mut events = Vec::new();
        for block in content {
            match block["type"].as_str().unwrap_or("") {
                "text" if !self.streamed_text => {
                    if let Some(text) = block["text"].as_str().filter(|t| !t.is_empty()) {
                        events.push(AgentStreamEvent::TextDelta {
                            content: text.to_string(),
                        });
                    }
                }
                "tool_use" => {
                    let id = block["id"].as_str().unwrap_or("").to_string();
                    if self.streamed_tools.contains(&id) {
                        continue;
                    }
                    let name = block["name"].as_str().unwrap_or("").to_string();
                    self.tool_names.insert(id.clone(), name.clone());
                    self.streamed_tools.insert(id.clone());
                    let args = match &block["input"] {
                        Value::Object(map) => Value::Object(map.clone()),
                        _ => Value::Object(Map::new()),
                    };
                    events.push(AgentStreamEvent::ToolCall {
                        tool_call_id: id,
                        tool_name: name,
                        args,
                    });
                }
                _ => {}
            }
        }
        events
    }

    fn on_user(&mut self, message: &Value) -> Vec<AgentStreamEvent> {
        let Some(content) = message["content"].as_array() else {
            return vec![];
        };
        content
            .iter()
            .filter(|block| block["type"].as_str() == Some("tool_result"))
            .map(|block| {
                let id = block["tool_use_id"].as_str().unwrap_or("").to_string();
                let name = self.tool_names.get(&id).cloned().unwrap_or_default();
                AgentStreamEvent::ToolResult {
                    tool_call_id: id,
                    tool_name: name,
                    output: result_output(&block["content"]),
                    is_error: block["is_error"].as_bool().unwrap_or(false),
                }
            })
            .collect()
    }
}

fn parse_args(id: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(tool_call_id = %id, "Unparseable tool arguments, using empty object: {e}");
            json!({})
        }
    }
}

/// Tool result content as a JSON value.
///
/// JSON strings are parsed; other strings are wrapped as `{"content": s}`.
/// Arrays of text blocks are joined first.
fn result_output(content: &Value) -> Value {
    let text = match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|b| b["text"].as_str())
            .collect::<Vec<_>>()
            .join(""),
        Value::Null => String::new(),
        other => return other.clone(),
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        _ => json!({ "content": text }),
    }
}

/// A stream-json user message carrying one tool result.
pub fn tool_result_message(tool_use_id: &str, content: &str) -> String {
    json!({
        "type": "user",
        "message": {
            "role": "user",
            "content": [{
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content,
            }],
        },
    })
    .to_string()
}

/// A stream-json user message carrying a prompt.
pub fn user_message(prompt: &str) -> String {
    json!({
        "type": "user",
        "message": { "role": "user", "content": prompt },
    })
    .to_string()
}
