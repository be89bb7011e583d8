//! medibridge-tool-runner - executes one tool call in its own process
//!
//! Usage: `medibridge-tool-runner <tool-name> <arguments-json>`
//!
//! Connects to the configured tool host, runs the call, and prints a single
//! JSON record on stdout: `{"content": ...}` on success, `{"error": "..."}`
//! on failure (exit status 1). Logs go to stderr.

use std::process::ExitCode;
use std::sync::Arc;

use serde_json::{json, Value};

use medibridge_core::config::load_default_config;
use medibridge_core::logging::{ConsoleLogger, Logger};
use medibridge_core::mcp::{McpConnector, ToolHostConnector};
use medibridge_core::tools::normalize_result;

fn parse_args(args: &[String]) -> Result<(String, Value), String> {
    let (name, raw) = match args {
        [name] => (name.as_str(), "{}"),
        [name, raw] => (name.as_str(), raw.as_str()),
        _ => return Err("usage: medibridge-tool-runner <tool-name> [arguments-json]".to_string()),
    };

    let arguments: Value =
        serde_json::from_str(raw).map_err(|e| format!("invalid arguments JSON: {}", e))?;
    if !arguments.is_object() {
        return Err("arguments must be a JSON object".to_string());
    }
    Ok((name.to_string(), arguments))
}

async fn run(name: &str, arguments: Value, logger: Arc<dyn Logger>) -> Result<Value, String> {
    let config = load_default_config().await.map_err(|e| e.to_string())?;
    let connector = McpConnector::new(config.tool_host, Arc::clone(&logger));

    let host = connector.connect().await.map_err(|e| e.to_string())?;
    let outcome = host.call_tool(name, arguments).await;
    if let Err(e) = host.close().await {
        logger.warn(&format!("[ToolRunner] Close failed: {}", e));
    }

    let result = normalize_result(outcome.map_err(|e| e.to_string())?);
    if result.ok {
        Ok(result.content)
    } else {
        Err(result
            .error_message
            .unwrap_or_else(|| "tool reported an error".to_string()))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let logger: Arc<dyn Logger> = Arc::new(ConsoleLogger::with_prefix("[medibridge-tool-runner]"));
    let args: Vec<String> = std::env::args().skip(1).collect();

    let outcome = match parse_args(&args) {
        Ok((name, arguments)) => run(&name, arguments, Arc::clone(&logger)).await,
        Err(message) => Err(message),
    };

    match outcome {
        Ok(content) => {
            println!("{}", json!({ "content": content }));
            ExitCode::SUCCESS
        }
        Err(message) => {
            logger.error(&message);
            println!("{}", json!({ "error": message }));
            ExitCode::FAILURE
        }
    }
}
