//! What a command hands back to the executor.

use serde::{Deserialize, Serialize};

use crate::error::{ShellError, ShellResult};

/// Presentation style for a piece of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Info,
    Success,
    Warning,
    Error,
}

/// Outcome of a command, a pipeline or a whole line.
///
/// `output: Some("")` means the command produced empty output, which still
/// reaches the next pipeline stage; `None` means it produced none at all.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    pub message_type: Option<MessageType>,
}

impl CommandResult {
    /// Success without output.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn output(text: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(text.into()),
            ..Self::default()
        }
    }

    /// Success carrying a styled message rather than data.
    #[must_use]
    pub fn message(text: impl Into<String>, kind: MessageType) -> Self {
        Self {
            success: true,
            output: Some(text.into()),
            error: None,
            message_type: Some(kind),
        }
    }

    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            message_type: Some(MessageType::Error),
        }
    }

    #[must_use]
    pub fn with_type(mut self, kind: MessageType) -> Self {
        self.message_type = Some(kind);
        self
    }

    /// Fold the outcome of saving the tree into this result. A failed save
    /// does not undo the change: a success stays a success and carries the
    /// error as a warning.
    #[must_use]
    pub fn with_persistence(mut self, saved: ShellResult<()>) -> Self {
        let Err(err) = saved else {
            return self;
        };
        let warning = err.to_string();
        self.error = Some(match self.error.take() {
            Some(error) => format!("{error}\n{warning}"),
            None => warning,
        });
        if self.success {
            self.message_type = Some(MessageType::Warning);
        }
        self
    }

    /// Same outcome with nothing left to show.
    #[must_use]
    pub fn silenced(&self) -> Self {
        Self {
            success: self.success,
            output: None,
            error: None,
            message_type: None,
        }
    }

    /// Output text, empty when there is none.
    #[must_use]
    pub fn text(&self) -> &str {
        self.output.as_deref().unwrap_or_default()
    }
}

impl From<ShellError> for CommandResult {
    fn from(err: ShellError) -> Self {
        Self::failure(err.to_string())
    }
}
