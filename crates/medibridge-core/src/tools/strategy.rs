//! Tool execution strategies
//!
//! A strategy runs one already-validated tool call and reports the outcome.
//! Time limits are applied by the caller; a strategy future may be dropped at
//! any await point.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::config::ExecutionConfig;
use crate::connection::ConnectionSupervisor;
use crate::error::{BridgeError, BridgeResult};
use crate::logging::Logger;
use crate::types::ToolResult;

use super::normalize::normalize_result;

#[async_trait]
pub trait ToolExecutionStrategy: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Run the tool once
    async fn execute(&self, tool: &str, arguments: Value) -> BridgeResult<ToolResult>;
}

/// Calls the tool over the supervised in-process session
pub struct InProcessStrategy {
    supervisor: Arc<ConnectionSupervisor>,
    logger: Arc<dyn Logger>,
}

impl InProcessStrategy {
    pub fn new(supervisor: Arc<ConnectionSupervisor>, logger: Arc<dyn Logger>) -> Self {
        Self { supervisor, logger }
    }
}

#[async_trait]
impl ToolExecutionStrategy for InProcessStrategy {
    fn name(&self) -> &str {
        "in-process"
    }

    async fn execute(&self, tool: &str, arguments: Value) -> BridgeResult<ToolResult> {
        let session = self.supervisor.session().await?;

        match session.host.call_tool(tool, arguments).await {
            Ok(raw) => Ok(normalize_result(raw)),
            Err(e) if e.is_connection_error() => {
                self.logger.warn(&format!(
                    "[InProcessStrategy] Connection lost during {}: {}",
                    tool, e
                ));
                self.supervisor.invalidate(session.generation).await;
                Err(BridgeError::host_unavailable(e))
            }
            Err(e) => Err(BridgeError::ToolExecutionError {
                tool: tool.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Runs each call in a separate runner process
///
/// The runner is invoked as `program [args...] <tool> <arguments-json>` and
/// must print a JSON record on its last non-empty stdout line:
/// `{"content": ...}` on success, `{"error": "..."}` on failure.
pub struct IsolatedProcessStrategy {
    program: String,
    args: Vec<String>,
    logger: Arc<dyn Logger>,
}

impl IsolatedProcessStrategy {
    pub fn new(program: impl Into<String>, args: Vec<String>, logger: Arc<dyn Logger>) -> Self {
        Self {
            program: program.into(),
            args,
            logger,
        }
    }

    fn command(&self, tool: &str, arguments: &Value) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(tool)
            .arg(arguments.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Last non-empty stdout line that parses as JSON
fn last_json_line(stdout: &str) -> Option<Value> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find_map(|line| serde_json::from_str(line).ok())
}

fn error_field(record: Option<&Value>) -> Option<String> {
    record?.get("error").map(|e| match e {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

#[async_trait]
impl ToolExecutionStrategy for IsolatedProcessStrategy {
    fn name(&self) -> &str {
        "isolated-process"
    }

    async fn execute(&self, tool: &str, arguments: Value) -> BridgeResult<ToolResult> {
        let failure = |message: String| BridgeError::ToolExecutionError {
            tool: tool.to_string(),
            message,
        };

        self.logger.debug(&format!(
            "[IsolatedProcessStrategy] Spawning {} for {}",
            self.program, tool
        ));

        let child = self
            .command(tool, &arguments)
            .spawn()
            .map_err(|e| failure(format!("failed to spawn {}: {}", self.program, e)))?;
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| failure(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let record = last_json_line(&stdout);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = error_field(record.as_ref())
                .or_else(|| Some(stderr.trim().to_string()).filter(|s| !s.is_empty()))
                .unwrap_or_else(|| format!("tool runner exited with {}", output.status));
            return Err(failure(message));
        }

        match record {
            Some(record) => {
                if let Some(message) = error_field(Some(&record)) {
                    return Err(failure(message));
                }
                match record {
                    Value::Object(mut object) if object.contains_key("content") => Ok(
                        ToolResult::success(object.remove("content").unwrap_or(Value::Null)),
                    ),
                    _ => Err(failure("tool runner printed an unrecognized record".to_string())),
                }
            }
            None => Err(failure("tool runner produced no result".to_string())),
        }
    }
}

/// Build the strategy selected by configuration
pub fn create_strategy(
    execution: &ExecutionConfig,
    supervisor: Arc<ConnectionSupervisor>,
    logger: Arc<dyn Logger>,
) -> Arc<dyn ToolExecutionStrategy> {
    match execution {
        ExecutionConfig::InProcess => Arc::new(InProcessStrategy::new(supervisor, logger)),
        ExecutionConfig::IsolatedProcess { program, args } => {
            Arc::new(IsolatedProcessStrategy::new(program.clone(), args.clone(), logger))
        }
    }
}
