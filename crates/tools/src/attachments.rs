//! Attachments tool — stages local files to ride along with the reply.

use std::path::Path;

use async_trait::async_trait;
use confab_core::error::ToolError;
use confab_core::reply::ToolCall;
use confab_core::tool::{ToolHandler, ToolKind, ToolOutput};
use tracing::warn;

pub struct AttachmentsTool;

impl AttachmentsTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AttachmentsTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for AttachmentsTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Attachments
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolOutput, ToolError> {
        let ToolCall::Attachments { paths } = call else {
            return Err(ToolError::InvalidArguments(format!(
                "expected attachments, got {}",
                call.kind()
            )));
        };

        if paths.is_empty() {
            return Err(ToolError::InvalidArguments("no attachment paths given".into()));
        }

        let mut staged = Vec::new();
        let mut missing = Vec::new();
        for path in paths {
            if Path::new(path).is_file() {
                staged.push(path.clone());
            } else {
                warn!(path = %path, "Requested attachment does not exist");
                missing.push(path.clone());
            }
        }

        if staged.is_empty() {
            return Err(ToolError::ExecutionFailed {
                tool_name: "attachments".into(),
                reason: format!("none of the requested files exist: {}", missing.join(", ")),
            });
        }

        let mut text = format!("Attached {} file(s).", staged.len());
        if !missing.is_empty() {
            text.push_str(&format!(" Skipped missing: {}.", missing.join(", ")));
        }

        Ok(ToolOutput { text, attachments: staged })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn stages_existing_files() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "data").unwrap();
        let path = tmp.path().to_string_lossy().into_owned();

        let tool = AttachmentsTool::new();
        let call = ToolCall::Attachments { paths: vec![path.clone()] };
        let out = tool.execute(&call).await.unwrap();
        assert_eq!(out.attachments, vec![path]);
    }

    #[tokio::test]
    async fn reports_missing_alongside_staged() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "data").unwrap();
        let good = tmp.path().to_string_lossy().into_owned();

        let tool = AttachmentsTool::new();
        let call = ToolCall::Attachments {
            paths: vec![good.clone(), "/nonexistent/file.png".into()],
        };
        let out = tool.execute(&call).await.unwrap();
        assert_eq!(out.attachments, vec![good]);
        assert!(out.text.contains("Skipped missing"));
    }

    #[tokio::test]
    async fn all_missing_is_an_error() {
        let tool = AttachmentsTool::new();
        let call = ToolCall::Attachments { paths: vec!["/nonexistent/a.png".into()] };
        assert!(matches!(
            tool.execute(&call).await,
            Err(ToolError::ExecutionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn empty_list_rejected() {
        let tool = AttachmentsTool::new();
        let call = ToolCall::Attachments { paths: vec![] };
        assert!(matches!(
            tool.execute(&call).await,
            Err(ToolError::InvalidArguments(_))
        ));
    }
}
