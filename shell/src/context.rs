//! Per-invocation state handed to a command.

use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use vsh_core::{Resolution, ResolveOptions, VirtualFs};
use vsh_sdk::Identity;

use crate::command::Flags;
use crate::script::ScriptingContext;
use crate::shell::Shell;

/// How a line is being executed.
#[derive(Clone)]
pub struct ExecOptions {
    /// A person is at the terminal to answer prompts.
    pub interactive: bool,
    /// Running inside a background job; nothing is presented.
    pub background: bool,
    pub cancel: CancellationToken,
    /// Set while a script runs; prompts are answered from its lines.
    pub script: Option<Arc<Mutex<ScriptingContext>>>,
    /// Nesting depth of `run`.
    pub depth: usize,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self::interactive(CancellationToken::new())
    }
}

impl ExecOptions {
    #[must_use]
    pub fn interactive(cancel: CancellationToken) -> Self {
        Self {
            interactive: true,
            background: false,
            cancel,
            script: None,
            depth: 0,
        }
    }

    /// No prompts reach the presenter.
    #[must_use]
    pub fn batch(cancel: CancellationToken) -> Self {
        Self {
            interactive: false,
            ..Self::interactive(cancel)
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

pub struct ExecContext<'a> {
    pub shell: &'a Shell,
    pub options: &'a ExecOptions,
    pub name: String,
    /// Positional arguments, flags removed.
    pub args: Vec<String>,
    pub flags: Flags,
    pub user: Identity,
    pub cwd: String,
    /// Resolution per positional argument, for those a path rule covers.
    pub resolved: Vec<Option<Resolution>>,
    /// Previous pipeline stage's output or redirected input.
    pub stdin: Option<String>,
}

impl<'a> ExecContext<'a> {
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.flags.has(name)
    }

    #[must_use]
    pub fn flag_value(&self, name: &str) -> Option<&str> {
        self.flags.value(name)
    }

    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn resolution(&self, index: usize) -> Option<&Resolution> {
        self.resolved.get(index).and_then(Option::as_ref)
    }

    /// Normalized path of a resolved argument.
    #[must_use]
    pub fn path(&self, index: usize) -> Option<&str> {
        self.resolution(index).map(|r| r.path.as_str())
    }

    #[must_use]
    pub fn vfs(&self) -> &VirtualFs {
        self.shell.vfs()
    }

    /// Resolve a path the dispatcher did not cover.
    #[must_use]
    pub fn resolve(&self, raw: &str, options: ResolveOptions) -> Resolution {
        self.vfs()
            .resolve_path(&self.name, raw, &self.cwd, &self.user, options)
    }

    /// `"<command>: <message>"`
    #[must_use]
    pub fn error(&self, message: impl std::fmt::Display) -> String {
        format!("{}: {message}", self.name)
    }

    /// Yes/no question. Outside an interactive session nobody can answer,
    /// so the answer is no.
    pub async fn confirm(&self, prompt: &str) -> bool {
        if !self.options.interactive || self.options.background {
            return false;
        }
        self.shell.presenter().request_confirmation(prompt).await
    }

    /// Ask for a line of input. While a script runs its next line is the
    /// answer; otherwise the presenter is asked.
    pub async fn request_input(&self, prompt: &str, obscured: bool) -> Option<String> {
        if let Some(script) = &self.options.script {
            let answer = script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take_input();
            tracing::debug!(prompt, answered = answer.is_some(), "script answered prompt");
            return answer;
        }
        if self.options.background {
            return None;
        }
        self.shell.presenter().request_input(prompt, obscured).await
    }

    pub fn is_cancelled(&self) -> bool {
        self.options.is_cancelled()
    }
}
