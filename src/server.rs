//! Line-delimited JSON dispatcher over stdin/stdout.
//!
//! Each request is one JSON object per line:
//!
//! ```json
//! {"tool": "embedding", "function": "search_similar", "inputs": {"query": "hello", "top_k": 2}}
//! ```
//!
//! Each response is one JSON object per line, either `{"output": ...}` or
//! `{"error": "..."}`, never both. Blank lines produce no response.
//!
//! # Error Contract
//!
//! | Condition | Response |
//! |-----------|----------|
//! | Line is not JSON (or not UTF-8) | `{"error": "Invalid JSON: ..."}` |
//! | Envelope fields missing or mistyped | `{"error": "Invalid request: ..."}` |
//! | Unknown tool | `{"error": "Tool '<t>' not found"}` |
//! | Unknown function | `{"error": "Function '<f>' not found in tool '<t>'"}` |
//! | Inputs do not decode | `{"error": "Invalid inputs for '<t>.<f>': ..."}` |
//! | Tool panicked | `{"error": "Unexpected error: ..."}` |
//!
//! Failures *inside* an operation (missing file, search before index, ...)
//! succeed at this layer: they arrive as `{"output": {"error": "..."}}`.
//!
//! # Concurrency
//!
//! Requests run one at a time. The [`Dispatcher`] is moved into a
//! `spawn_blocking` task for each request and handed back with the
//! response, so model loads and encoding never block the async reader and
//! no lock guards the service. Lines are read as raw bytes and a panic in a
//! tool is answered with `{"error": "Unexpected error: ..."}`, so no single
//! request can stop the loop.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::config::Config;
use crate::embedding::create_loader;
use crate::embedding_tool::EmbeddingTool;
use crate::pdf_tool::PdfParserTool;
use crate::traits::ToolRegistry;
use rag_harness_core::service::RetrievalService;

#[derive(Debug, Deserialize)]
struct Request {
    tool: String,
    function: String,
    #[serde(default)]
    inputs: Option<Value>,
}

/// One response frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Output { output: Value },
    Error { error: String },
}

impl Response {
    fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
        }
    }
}

/// Routes request lines to the registered tools.
pub struct Dispatcher {
    registry: ToolRegistry,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Build the `pdf_parser` and `embedding` tools from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(build_registry(config)?))
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one request line. Returns `None` for blank lines.
    pub fn handle_line(&mut self, line: &str) -> Option<Response> {
        self.handle_bytes(line.as_bytes())
    }

    /// Handle one raw request line, which need not be valid UTF-8.
    pub fn handle_bytes(&mut self, line: &[u8]) -> Option<Response> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return None;
        }

        let value: Value = match serde_json::from_slice(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "malformed request line");
                return Some(Response::error(format!("Invalid JSON: {}", e)));
            }
        };
        let request: Request = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "invalid request envelope");
                return Some(Response::error(format!("Invalid request: {}", e)));
            }
        };

        // A panicking model backend answers this request only.
        let response = match catch_unwind(AssertUnwindSafe(|| self.dispatch(request))) {
            Ok(response) => response,
            Err(payload) => {
                let message = panic_message(&*payload);
                tracing::error!(error = %message, "request handler panicked");
                Response::error(format!("Unexpected error: {}", message))
            }
        };
        Some(response)
    }

    fn dispatch(&mut self, request: Request) -> Response {
        let Request {
            tool,
            function,
            inputs,
        } = request;

        let Some(handler) = self.registry.find_mut(&tool) else {
            tracing::warn!(tool = %tool, "unknown tool");
            return Response::error(format!("Tool '{}' not found", tool));
        };
        if !handler.functions().contains(&function.as_str()) {
            tracing::warn!(tool = %tool, function = %function, "unknown function");
            return Response::error(format!(
                "Function '{}' not found in tool '{}'",
                function, tool
            ));
        }

        let inputs = match inputs {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(v @ Value::Object(_)) => v,
            Some(_) => {
                return Response::error(format!(
                    "Invalid inputs for '{}.{}': inputs must be an object",
                    tool, function
                ))
            }
        };

        tracing::debug!(tool = %tool, function = %function, "dispatching request");
        match handler.call(&function, inputs) {
            Ok(output) => Response::Output { output },
            Err(e) => {
                tracing::warn!(tool = %tool, function = %function, error = %e, "request rejected");
                Response::error(e.to_string())
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Registry holding the two built-in tools.
pub fn build_registry(config: &Config) -> Result<ToolRegistry> {
    let loader = create_loader(&config.embedding)?;
    let service = RetrievalService::new(loader);

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(PdfParserTool::new(&config.chunking)));
    registry.register(Box::new(EmbeddingTool::new(service, config)));
    Ok(registry)
}

/// Frame a response as one line terminated by `\n`.
fn encode_frame(response: &Response) -> Vec<u8> {
    let mut line = serde_json::to_vec(response).unwrap_or_else(|e| {
        format!(r#"{{"error":"Failed to encode response: {}"}}"#, e).into_bytes()
    });
    line.push(b'\n');
    line
}

/// Run the request loop until `reader` reaches EOF.
pub async fn serve<R, W>(mut dispatcher: Dispatcher, mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut handled = 0usize;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .context("Failed to read request")?;
        if read == 0 {
            break;
        }

        let line = std::mem::take(&mut buf);
        let (returned, response, line) = tokio::task::spawn_blocking(move || {
            let response = dispatcher.handle_bytes(&line);
            (dispatcher, response, line)
        })
        .await
        .context("Request handler panicked")?;
        dispatcher = returned;
        buf = line;

        if let Some(response) = response {
            writer
                .write_all(&encode_frame(&response))
                .await
                .context("Failed to write response")?;
            writer.flush().await.context("Failed to flush response")?;
            handled += 1;
        }
    }

    // Blocking HTTP clients held by a loaded model must not drop on the runtime.
    tokio::task::spawn_blocking(move || drop(dispatcher))
        .await
        .context("Failed to release tools")?;

    tracing::info!(requests = handled, "stdin closed, shutting down");
    Ok(())
}

/// Serve the tools over this process's stdin/stdout.
pub async fn run_stdio(config: &Config) -> Result<()> {
    let dispatcher = Dispatcher::from_config(config)?;
    tracing::info!(
        tools = ?dispatcher.registry().names(),
        provider = %config.embedding.provider,
        "RAG server ready, reading requests from stdin"
    );
    serve(
        dispatcher,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;
    use serde_json::json;

    use crate::traits::{CallError, Tool};

    /// Panics on `explode`, answers `ok` normally.
    struct FragileTool;

    impl Tool for FragileTool {
        fn name(&self) -> &str {
            "fragile"
        }
        fn description(&self) -> &str {
            "Panics on demand"
        }
        fn functions(&self) -> &[&'static str] {
            &["explode", "ok"]
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        fn call(&mut self, function: &str, _inputs: Value) -> Result<Value, CallError> {
            if function == "explode" {
                panic!("model backend panicked");
            }
            Ok(json!({ "success": true }))
        }
    }

    fn fragile_dispatcher() -> Dispatcher {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(FragileTool));
        Dispatcher::new(registry)
    }

    fn hash_config() -> Config {
        Config {
            embedding: EmbeddingConfig {
                provider: "hash".to_string(),
                hash_dims: 32,
                ..EmbeddingConfig::default()
            },
            ..Config::default()
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::from_config(&hash_config()).unwrap()
    }

    fn error_of(r: Option<Response>) -> String {
        match r {
            Some(Response::Error { error }) => error,
            other => panic!("expected error response, got {:?}", other),
        }
    }

    fn output_of(r: Option<Response>) -> Value {
        match r {
            Some(Response::Output { output }) => output,
            other => panic!("expected output response, got {:?}", other),
        }
    }

    #[test]
    fn blank_lines_are_ignored() {
        let mut d = dispatcher();
        assert!(d.handle_line("").is_none());
        assert!(d.handle_line("   \t").is_none());
    }

    #[test]
    fn malformed_json() {
        let mut d = dispatcher();
        let err = error_of(d.handle_line("{not json"));
        assert!(err.starts_with("Invalid JSON: "), "{}", err);
    }

    #[test]
    fn missing_envelope_fields() {
        let mut d = dispatcher();
        let err = error_of(d.handle_line(r#"{"tool": "embedding"}"#));
        assert!(err.starts_with("Invalid request: "), "{}", err);
    }

    #[test]
    fn unknown_tool_and_function() {
        let mut d = dispatcher();
        assert_eq!(
            error_of(d.handle_line(r#"{"tool": "ocr", "function": "run", "inputs": {}}"#)),
            "Tool 'ocr' not found"
        );
        assert_eq!(
            error_of(d.handle_line(r#"{"tool": "embedding", "function": "train", "inputs": {}}"#)),
            "Function 'train' not found in tool 'embedding'"
        );
    }

    #[test]
    fn inputs_must_be_an_object() {
        let mut d = dispatcher();
        let err = error_of(d.handle_line(
            r#"{"tool": "embedding", "function": "embed_texts", "inputs": ["a"]}"#,
        ));
        assert_eq!(
            err,
            "Invalid inputs for 'embedding.embed_texts': inputs must be an object"
        );
    }

    #[test]
    fn operation_errors_stay_inside_output() {
        let mut d = dispatcher();
        let out = output_of(d.handle_line(
            r#"{"tool": "embedding", "function": "search_similar", "inputs": {"query": "x"}}"#,
        ));
        assert_eq!(
            out["error"],
            "No index or model available. Please create index first."
        );
    }

    #[test]
    fn index_then_search_through_dispatcher() {
        let mut d = dispatcher();
        let created = output_of(d.handle_line(
            &json!({
                "tool": "embedding",
                "function": "create_vector_index",
                "inputs": { "texts": ["Hello world", "This is a test", "Python programming"] }
            })
            .to_string(),
        ));
        assert_eq!(created["num_vectors"], 3);

        let found = output_of(d.handle_line(
            &json!({
                "tool": "embedding",
                "function": "search_similar",
                "inputs": { "query": "Hello world", "top_k": 2 }
            })
            .to_string(),
        ));
        let results = found["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["index"], 0);
        assert_eq!(results[0]["rank"], 1);
        assert_eq!(results[1]["rank"], 2);
    }

    #[test]
    fn response_frames_are_exclusive() {
        let ok = serde_json::to_value(Response::Output { output: json!(1) }).unwrap();
        assert_eq!(ok, json!({ "output": 1 }));
        let err = serde_json::to_value(Response::error("boom")).unwrap();
        assert_eq!(err, json!({ "error": "boom" }));
    }

    #[tokio::test]
    async fn serve_writes_one_line_per_request() {
        let input = concat!(
            "{\"tool\": \"embedding\", \"function\": \"embed_texts\", \"inputs\": {\"texts\": [\"a b\"]}}\n",
            "\n",
            "garbage\n",
        );
        let mut out = Vec::new();
        serve(dispatcher(), input.as_bytes(), &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["output"]["num_texts"], 1);
        assert_eq!(first["output"]["embedding_dim"], 32);

        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert!(second["error"].as_str().unwrap().starts_with("Invalid JSON"));
    }

    #[test]
    fn unknown_tool_reported_before_inputs_shape() {
        let mut d = dispatcher();
        assert_eq!(
            error_of(d.handle_line(r#"{"tool": "ocr", "function": "x", "inputs": [1]}"#)),
            "Tool 'ocr' not found"
        );
        assert_eq!(
            error_of(d.handle_line(r#"{"tool": "embedding", "function": "x", "inputs": [1]}"#)),
            "Function 'x' not found in tool 'embedding'"
        );
    }

    #[test]
    fn invalid_utf8_is_invalid_json() {
        let mut d = dispatcher();
        let err = error_of(d.handle_bytes(b"\xff\xfe garbage"));
        assert!(err.starts_with("Invalid JSON: "), "{}", err);
    }

    #[test]
    fn panicking_tool_answers_unexpected_error() {
        let mut d = fragile_dispatcher();
        let err = error_of(d.handle_line(r#"{"tool": "fragile", "function": "explode"}"#));
        assert_eq!(err, "Unexpected error: model backend panicked");
        let out = output_of(d.handle_line(r#"{"tool": "fragile", "function": "ok"}"#));
        assert_eq!(out["success"], true);
    }

    fn frames(out: Vec<u8>) -> Vec<Value> {
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn serve_survives_non_utf8_line() {
        let mut input = Vec::new();
        input.extend_from_slice(b"{\"tool\": \"x\", \"function\": \"y\"}\n");
        input.extend_from_slice(b"\xff\xfe garbage\n");
        input.extend_from_slice(
            b"{\"tool\": \"embedding\", \"function\": \"embed_texts\", \"inputs\": {\"texts\": [\"a\"]}}\n",
        );
        let mut out = Vec::new();
        serve(dispatcher(), input.as_slice(), &mut out).await.unwrap();

        let frames = frames(out);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0]["error"], "Tool 'x' not found");
        assert!(frames[1]["error"].as_str().unwrap().starts_with("Invalid JSON"));
        assert_eq!(frames[2]["output"]["num_texts"], 1);
    }

    #[tokio::test]
    async fn serve_survives_panicking_tool() {
        let input = concat!(
            "{\"tool\": \"fragile\", \"function\": \"explode\"}\n",
            "{\"tool\": \"fragile\", \"function\": \"ok\"}\n",
        );
        let mut out = Vec::new();
        serve(fragile_dispatcher(), input.as_bytes(), &mut out)
            .await
            .unwrap();

        let frames = frames(out);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["error"], "Unexpected error: model backend panicked");
        assert_eq!(frames[1]["output"]["success"], true);
    }

    #[test]
    fn crlf_line_endings_accepted() {
        let mut d = dispatcher();
        let r = d.handle_bytes(b"{\"tool\": \"ocr\", \"function\": \"x\"}\r\n");
        assert_eq!(error_of(r), "Tool 'ocr' not found");
    }
}
