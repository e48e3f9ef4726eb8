//! Script execution tool — runs model-written Python with a timeout.
//!
//! The script is written to a temp file, executed in a subprocess, and its
//! stdout/stderr folded into the result text. Output is truncated past a
//! configured limit. The print output is what the model reads back before
//! composing its final reply.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use confab_core::error::ToolError;
use confab_core::reply::ToolCall;
use confab_core::tool::{ToolHandler, ToolKind, ToolOutput};
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct ScriptTool {
    interpreter: String,
    timeout_secs: u64,
    max_output: usize,
}

impl ScriptTool {
    pub fn new(interpreter: String, timeout_secs: u64, max_output: usize) -> Self {
        Self { interpreter, timeout_secs, max_output }
    }

    fn temp_script_path() -> PathBuf {
        std::env::temp_dir().join(format!("confab-script-{}.py", Uuid::new_v4()))
    }

    fn truncate(&self, output: String) -> String {
        if output.len() <= self.max_output {
            return output;
        }
        let omitted = output.len() - self.max_output;
        let mut cut = self.max_output;
        while !output.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}\n... (output truncated, {omitted} chars omitted)", &output[..cut])
    }
}

#[async_trait]
impl ToolHandler for ScriptTool {
    fn kind(&self) -> ToolKind {
        ToolKind::PythonExecution
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolOutput, ToolError> {
        let ToolCall::PythonExecution { script } = call else {
            return Err(ToolError::InvalidArguments(format!(
                "expected pythonExecution, got {}",
                call.kind()
            )));
        };

        let path = Self::temp_script_path();
        std::fs::write(&path, script).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "pythonExecution".into(),
            reason: format!("failed to stage script: {e}"),
        })?;

        debug!(interpreter = %self.interpreter, path = %path.display(), "Executing script");

        let run = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            Command::new(&self.interpreter).arg(&path).output(),
        )
        .await;

        // The temp file is no longer needed whatever happened.
        let _ = std::fs::remove_file(&path);

        let output = match run {
            Err(_) => {
                return Err(ToolError::Timeout {
                    tool_name: "pythonExecution".into(),
                    timeout_secs: self.timeout_secs,
                });
            }
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: "pythonExecution".into(),
                    reason: e.to_string(),
                });
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        let text = if output.status.success() {
            if stderr.is_empty() {
                stdout
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            }
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(exit_code = code, "Script exited with non-zero status");
            format!("[exit code: {code}]\n{stdout}\n{stderr}")
        };

        Ok(ToolOutput::text(self.truncate(text.trim().to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests run the script through `sh` / `cat` so they stay deterministic
    // and do not require a Python installation.

    #[tokio::test]
    async fn runs_script_and_captures_stdout() {
        let tool = ScriptTool::new("sh".into(), 5, 5000);
        let call = ToolCall::PythonExecution { script: "echo computed-42".into() };
        let out = tool.execute(&call).await.unwrap();
        assert_eq!(out.text, "computed-42");
    }

    #[tokio::test]
    async fn nonzero_exit_reports_code_and_stderr() {
        let tool = ScriptTool::new("sh".into(), 5, 5000);
        let call = ToolCall::PythonExecution { script: "echo bad >&2; exit 3".into() };
        let out = tool.execute(&call).await.unwrap();
        assert!(out.text.contains("[exit code: 3]"));
        assert!(out.text.contains("bad"));
    }

    #[tokio::test]
    async fn timeout_is_enforced() {
        let tool = ScriptTool::new("sh".into(), 1, 5000);
        let call = ToolCall::PythonExecution { script: "sleep 5".into() };
        let err = tool.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout { timeout_secs: 1, .. }));
    }

    #[tokio::test]
    async fn long_output_is_truncated() {
        let tool = ScriptTool::new("cat".into(), 5, 50);
        let script = "x".repeat(200);
        let call = ToolCall::PythonExecution { script: script.clone() };
        let out = tool.execute(&call).await.unwrap();
        assert!(out.text.contains("output truncated"));
        assert!(out.text.contains("150 chars omitted"));
    }

    #[tokio::test]
    async fn wrong_variant_rejected() {
        let tool = ScriptTool::new("sh".into(), 5, 5000);
        let call = ToolCall::DailySummary { date: "today".into() };
        assert!(matches!(
            tool.execute(&call).await,
            Err(ToolError::InvalidArguments(_))
        ));
    }
}
