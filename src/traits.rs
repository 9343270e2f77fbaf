//! Tool trait and registry.
//!
//! A [`Tool`] is a named group of functions reachable over the wire as
//! `{"tool": <name>, "function": <fn>, "inputs": {...}}`. The two built-in
//! tools are `pdf_parser` ([`PdfParserTool`](crate::pdf_tool::PdfParserTool))
//! and `embedding` ([`EmbeddingTool`](crate::embedding_tool::EmbeddingTool)).
//!
//! ```text
//! ┌───────────────────────────────┐
//! │          ToolRegistry         │
//! │  ┌────────────┐ ┌───────────┐ │
//! │  │ pdf_parser │ │ embedding │ │
//! │  └────────────┘ └───────────┘ │
//! └──────────────┬────────────────┘
//!                ▼
//!       Dispatcher::handle_line()
//! ```
//!
//! # Error layering
//!
//! A tool function always produces a JSON payload, even on failure: the
//! operation's own errors become `{"error": "..."}` *inside* the payload.
//! Only problems with the request itself (unknown function, inputs that do
//! not decode) are returned as [`CallError`] for the dispatcher to report.

use rag_harness_core::{ErrorKind, RagError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("Function '{function}' not found in tool '{tool}'")]
    UnknownFunction { tool: String, function: String },

    #[error("Invalid inputs for '{tool}.{function}': {reason}")]
    InvalidInputs {
        tool: String,
        function: String,
        reason: String,
    },
}

/// A named set of callable functions.
pub trait Tool: Send {
    /// Wire name of the tool (e.g. `"embedding"`).
    fn name(&self) -> &str;

    /// One-line description for discovery.
    fn description(&self) -> &str;

    /// Names of the functions this tool exposes.
    fn functions(&self) -> &[&'static str];

    /// JSON Schema describing the accepted inputs.
    fn parameters_schema(&self) -> Value;

    /// Run `function` with `inputs` (always a JSON object).
    fn call(&mut self, function: &str, inputs: Value) -> Result<Value, CallError>;
}

/// Ordered collection of tools, looked up by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut (dyn Tool + 'static)> {
        self.tools
            .iter_mut()
            .find(|t| t.name() == name)
            .map(|t| t.as_mut())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Discovery listing: name, description, functions, and schema per tool.
    pub fn describe(&self) -> Value {
        Value::Array(
            self.tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name(),
                        "description": t.description(),
                        "functions": t.functions(),
                        "inputSchema": t.parameters_schema(),
                    })
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Decode a function's `inputs` object into its typed argument struct.
pub fn decode_inputs<T: DeserializeOwned>(
    tool: &str,
    function: &str,
    inputs: Value,
) -> Result<T, CallError> {
    serde_json::from_value(inputs).map_err(|e| CallError::InvalidInputs {
        tool: tool.to_string(),
        function: function.to_string(),
        reason: e.to_string(),
    })
}

/// Turn an operation result into its wire payload.
///
/// Errors become `{"error": "<prefix>: <message>"}`; state-precondition
/// errors already read as complete sentences and are reported verbatim.
pub fn into_payload<T: Serialize>(result: Result<T, RagError>, prefix: &str) -> Value {
    match result {
        Ok(out) => serde_json::to_value(out)
            .unwrap_or_else(|e| json!({ "error": format!("{}: {}", prefix, e) })),
        Err(e) if e.kind() == ErrorKind::StatePrecondition => json!({ "error": e.to_string() }),
        Err(e) => json!({ "error": format!("{}: {}", prefix, e) }),
    }
}

/// Build an error payload from a plain message.
pub fn error_payload(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    struct EchoTool;

    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo inputs back"
        }
        fn functions(&self) -> &[&'static str] {
            &["echo"]
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        fn call(&mut self, _function: &str, inputs: Value) -> Result<Value, CallError> {
            Ok(inputs)
        }
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        count: u32,
    }

    #[test]
    fn registry_finds_by_name() {
        let mut reg = ToolRegistry::new();
        reg.register(Box::new(EchoTool));
        assert_eq!(reg.len(), 1);
        assert!(reg.find_mut("echo").is_some());
        assert!(reg.find_mut("nope").is_none());
        assert_eq!(reg.names(), vec!["echo"]);
    }

    #[test]
    fn describe_lists_functions_and_schema() {
        let mut reg = ToolRegistry::new();
        reg.register(Box::new(EchoTool));
        let listing = reg.describe();
        assert_eq!(listing[0]["name"], "echo");
        assert_eq!(listing[0]["functions"], json!(["echo"]));
        assert_eq!(listing[0]["inputSchema"]["type"], "object");
    }

    #[test]
    fn decode_inputs_reports_tool_and_function() {
        let err = decode_inputs::<Args>("t", "f", json!({ "count": "three" })).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Invalid inputs for 't.f':"), "{}", msg);

        assert!(decode_inputs::<Args>("t", "f", json!({ "count": 1, "extra": 2 })).is_err());
        assert_eq!(
            decode_inputs::<Args>("t", "f", json!({ "count": 3 })).unwrap().count,
            3
        );
    }

    #[test]
    fn payload_prefixes_errors() {
        let v = into_payload::<()>(Err(RagError::invalid("bad")), "Failed to search");
        assert_eq!(v["error"], "Failed to search: bad");

        let v = into_payload::<()>(Err(RagError::NoIndex), "Failed to search");
        assert_eq!(v["error"], RagError::NoIndex.to_string());

        let v = into_payload(Ok(json!({ "success": true })), "unused");
        assert_eq!(v["success"], true);
    }
}
