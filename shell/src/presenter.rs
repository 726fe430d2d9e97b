//! Where command output goes and where prompts come from.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::result::MessageType;

/// Output sink and prompt source for a [`crate::Shell`].
#[async_trait]
pub trait Presenter: Send + Sync {
    fn append_output(&self, text: &str, kind: MessageType);

    /// Ask a yes/no question.
    async fn request_confirmation(&self, prompt: &str) -> bool;

    /// Ask for a line of input. `None` when the user gave up (EOF).
    async fn request_input(&self, prompt: &str, obscured: bool) -> Option<String>;

    async fn clear(&self) {}
}

/// Plain stdout/stderr terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPresenter;

impl TerminalPresenter {
    async fn read_line(prompt: String) -> Option<String> {
        tokio::task::spawn_blocking(move || {
            let mut stdout = io::stdout();
            let _ = write!(stdout, "{prompt}");
            let _ = stdout.flush();
            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) | Err(_) => None,
                Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            }
        })
        .await
        .ok()
        .flatten()
    }
}

#[async_trait]
impl Presenter for TerminalPresenter {
    fn append_output(&self, text: &str, kind: MessageType) {
        let text = text.strip_suffix('\n').unwrap_or(text);
        match kind {
            MessageType::Error | MessageType::Warning => eprintln!("{text}"),
            MessageType::Info | MessageType::Success => println!("{text}"),
        }
    }

    async fn request_confirmation(&self, prompt: &str) -> bool {
        Self::read_line(format!("{prompt} [y/N] "))
            .await
            .is_some_and(|answer| matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
    }

    // Input is echoed; the terminal is not switched to no-echo mode.
    async fn request_input(&self, prompt: &str, _obscured: bool) -> Option<String> {
        Self::read_line(prompt.to_string()).await
    }

    async fn clear(&self) {
        print!("\x1b[2J\x1b[H");
        let _ = io::stdout().flush();
    }
}

/// Captures output and answers prompts from queues. Used when embedding
/// the shell and in tests.
#[derive(Debug, Default)]
pub struct BufferPresenter {
    state: Mutex<BufferState>,
}

#[derive(Debug, Default)]
struct BufferState {
    lines: Vec<(String, MessageType)>,
    answers: VecDeque<String>,
    confirmations: VecDeque<bool>,
    prompts: Vec<String>,
}

impl BufferPresenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an answer for the next `request_input`.
    pub fn push_answer(&self, answer: impl Into<String>) {
        self.state().answers.push_back(answer.into());
    }

    /// Queue an answer for the next `request_confirmation`. Unanswered
    /// confirmations are declined.
    pub fn push_confirmation(&self, yes: bool) {
        self.state().confirmations.push_back(yes);
    }

    #[must_use]
    pub fn lines(&self) -> Vec<(String, MessageType)> {
        self.state().lines.clone()
    }

    /// All captured text joined by newlines.
    #[must_use]
    pub fn contents(&self) -> String {
        self.state()
            .lines
            .iter()
            .map(|(text, _)| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.state().prompts.clone()
    }

    pub fn take_lines(&self) -> Vec<(String, MessageType)> {
        std::mem::take(&mut self.state().lines)
    }
}

#[async_trait]
impl Presenter for BufferPresenter {
    fn append_output(&self, text: &str, kind: MessageType) {
        let text = text.strip_suffix('\n').unwrap_or(text);
        self.state().lines.push((text.to_string(), kind));
    }

    async fn request_confirmation(&self, prompt: &str) -> bool {
        let mut state = self.state();
        state.prompts.push(prompt.to_string());
        state.confirmations.pop_front().unwrap_or(false)
    }

    async fn request_input(&self, prompt: &str, _obscured: bool) -> Option<String> {
        let mut state = self.state();
        state.prompts.push(prompt.to_string());
        state.answers.pop_front()
    }

    async fn clear(&self) {
        self.state().lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buffer_answers_in_order() {
        let presenter = BufferPresenter::new();
        presenter.push_answer("first");
        presenter.push_confirmation(true);

        assert_eq!(presenter.request_input("Password: ", true).await.as_deref(), Some("first"));
        assert_eq!(presenter.request_input("Again: ", true).await, None);
        assert!(presenter.request_confirmation("sure?").await);
        assert!(!presenter.request_confirmation("really?").await);
        assert_eq!(presenter.prompts().len(), 4);
    }

    #[tokio::test]
    async fn buffer_captures_output() {
        let presenter = BufferPresenter::new();
        presenter.append_output("hello\n", MessageType::Info);
        presenter.append_output("oops", MessageType::Error);
        assert_eq!(presenter.contents(), "hello\noops");
        presenter.clear().await;
        assert!(presenter.lines().is_empty());
    }
}
