/// Parsing for the agent's `stream-json` output.
///
/// The agent emits one JSON object per line:
///   {type: "system", subtype: "init", mcp_servers: [{name, status}]}
///   {type: "assistant", message: {content: [{type: "text"} | {type: "tool_use"}]}}
///   {type: "user", message: {content: [{type: "tool_result"}]}}
///   {type: "result", subtype, is_error, result, num_turns, total_cost_usd}
///
/// Unknown event and block types are ignored.
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        mcp_servers: Vec<McpServerStatus>,
    },
    Assistant {
        message: Message,
    },
    User {
        message: Message,
    },
    Result(ResultEvent),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct McpServerStatus {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub content: MessageContent,
}

/// User messages may carry plain text instead of a block list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Blocks(Vec<ContentBlock>),
    Text(String),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Blocks(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Other,
}

/// The final event of a session.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultEvent {
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub num_turns: Option<u64>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// A tool invocation observed in the stream, with wall-clock timing.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
    pub output: Option<Value>,
    pub is_error: bool,
    pub started: Instant,
    pub finished: Option<Instant>,
}

impl ToolCall {
    /// Time between the tool_use and its tool_result, if the result arrived.
    pub fn duration(&self) -> Option<Duration> {
        self.finished.map(|f| f.saturating_duration_since(self.started))
    }
}

/// Accumulated state of one agent session.
#[derive(Debug, Default)]
pub struct Transcript {
    text_parts: Vec<String>,
    tool_calls: Vec<ToolCall>,
    tool_index: HashMap<String, usize>,
    result: Option<ResultEvent>,
    mcp_servers: Vec<McpServerStatus>,
    unparsed_lines: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one stdout line and fold it in.
    ///
    /// Returns the assistant text blocks the line contained, so the caller
    /// can echo them as they arrive. Non-JSON lines are counted and skipped.
    pub fn ingest_line(&mut self, line: &str, now: Instant) -> Vec<String> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }
        match serde_json::from_str::<StreamEvent>(line) {
            Ok(event) => self.ingest(event, now),
            Err(e) => {
                self.unparsed_lines += 1;
                tracing::debug!(error = %e, "skipping unparseable stream line");
                Vec::new()
            }
        }
    }

    pub fn ingest(&mut self, event: StreamEvent, now: Instant) -> Vec<String> {
        let mut new_text = Vec::new();
        match event {
            StreamEvent::System {
                subtype,
                mcp_servers,
            } => {
                if subtype.as_deref() == Some("init") {
                    for server in &mcp_servers {
                        tracing::info!(
                            server = %server.name,
                            status = %server.status,
                            "mcp server"
                        );
                    }
                    self.mcp_servers = mcp_servers;
                }
            }
            StreamEvent::Assistant { message } => {
                if let MessageContent::Blocks(blocks) = message.content {
                    for block in blocks {
                        match block {
                            ContentBlock::Text { text } => {
                                new_text.push(text.clone());
                                self.text_parts.push(text);
                            }
                            ContentBlock::ToolUse { id, name, input } => {
                                self.start_tool(id, name, input, now);
                            }
                            _ => {}
                        }
                    }
                }
            }
            StreamEvent::User { message } => {
                // Tool results arrive as user messages; user text is not report output.
                if let MessageContent::Blocks(blocks) = message.content {
                    for block in blocks {
                        if let ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            is_error,
                        } = block
                        {
                            self.finish_tool(&tool_use_id, content, is_error, now);
                        }
                    }
                }
            }
            StreamEvent::Result(result) => {
                self.result = Some(result);
            }
            StreamEvent::Other => {}
        }
        new_text
    }

    fn start_tool(&mut self, id: String, name: String, input: Value, now: Instant) {
        tracing::debug!(tool = %name, id = %id, "tool call started");
        self.tool_index.insert(id.clone(), self.tool_calls.len());
        self.tool_calls.push(ToolCall {
            id,
            name,
            input,
            output: None,
            is_error: false,
            started: now,
            finished: None,
        });
    }

    fn finish_tool(&mut self, id: &str, output: Value, is_error: bool, now: Instant) {
        let Some(&idx) = self.tool_index.get(id) else {
            tracing::debug!(id, "tool result without matching tool call");
            return;
        };
        let call = &mut self.tool_calls[idx];
        call.output = Some(output);
        call.is_error = is_error;
        call.finished = Some(now);
    }

    /// The report text: assistant text blocks joined by newlines, or the
    /// result event's text when no blocks were streamed.
    pub fn text(&self) -> String {
        if !self.text_parts.is_empty() {
            return self.text_parts.join("\n");
        }
        self.result
            .as_ref()
            .and_then(|r| r.result.clone())
            .unwrap_or_default()
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub fn result(&self) -> Option<&ResultEvent> {
        self.result.as_ref()
    }

    pub fn mcp_servers(&self) -> &[McpServerStatus] {
        &self.mcp_servers
    }

    pub fn unparsed_lines(&self) -> u64 {
        self.unparsed_lines
    }
}
