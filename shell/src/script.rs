//! Script execution for `run`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::context::ExecOptions;
use crate::error::ShellError;
use crate::result::CommandResult;
use crate::shell::Shell;

/// Lines of a running script and how far it has got.
///
/// Commands that prompt while a script runs take their answer from the
/// next line here instead of from the presenter.
#[derive(Debug, Clone, Default)]
pub struct ScriptingContext {
    lines: Vec<String>,
    cursor: usize,
    awaiting_input: bool,
}

impl ScriptingContext {
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            cursor: 0,
            awaiting_input: false,
        }
    }

    /// Next line with its 1-based number.
    pub fn next_line(&mut self) -> Option<(usize, String)> {
        let line = self.lines.get(self.cursor)?.clone();
        self.cursor += 1;
        Some((self.cursor, line))
    }

    /// Consume the next line as the answer to a prompt. When the script has
    /// no lines left it stays suspended, awaiting input.
    pub fn take_input(&mut self) -> Option<String> {
        self.awaiting_input = true;
        let (_, line) = self.next_line()?;
        self.awaiting_input = false;
        Some(line)
    }

    #[must_use]
    pub fn awaiting_input(&self) -> bool {
        self.awaiting_input
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.lines.len()
    }
}

/// Replace `$1..$N`, `$@` and `$#` with the script's arguments. Unset
/// positions expand to nothing.
#[must_use]
pub fn substitute_positional(line: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('@') => {
                chars.next();
                let quoted: Vec<String> = args
                    .iter()
                    .map(|a| {
                        if a.chars().any(char::is_whitespace) {
                            format!("\"{a}\"")
                        } else {
                            a.clone()
                        }
                    })
                    .collect();
                out.push_str(&quoted.join(" "));
            }
            Some('#') => {
                chars.next();
                out.push_str(&args.len().to_string());
            }
            Some(d) if d.is_ascii_digit() && *d != '0' => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    digits.push(*d);
                    chars.next();
                }
                if let Some(arg) = digits
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| args.get(n - 1))
                {
                    out.push_str(arg);
                }
            }
            _ => out.push('$'),
        }
    }
    out
}

/// Clears the shell's running-script flag when the script ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Shell {
    /// Run `text` line by line as a script named `name`.
    ///
    /// Blank and `#` lines are skipped. The first failing line stops the
    /// script; the error names the line number and text. A foreground
    /// script refuses to start while another one runs.
    pub async fn run_script(
        &self,
        name: &str,
        text: &str,
        args: &[String],
        options: &ExecOptions,
    ) -> CommandResult {
        let limit = self.config().limits.script_depth;
        if options.depth >= limit {
            return ShellError::Script(format!(
                "run: {name}: maximum script depth ({limit}) exceeded"
            ))
            .into();
        }

        let _guard = if options.depth == 0 && !options.background {
            let running = self.script_running.as_ref();
            if running
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return ShellError::Script("run: another script is already running".into()).into();
            }
            Some(RunningGuard(running))
        } else {
            None
        };

        let script = Arc::new(Mutex::new(ScriptingContext::new(text)));
        let options = ExecOptions {
            interactive: false,
            background: options.background,
            cancel: options.cancel.clone(),
            script: Some(Arc::clone(&script)),
            depth: options.depth + 1,
        };
        tracing::info!(script = name, args = args.len(), "script started");

        loop {
            let next = script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .next_line();
            let Some((number, raw)) = next else {
                break;
            };
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if options.is_cancelled() {
                return ShellError::Script(format!("run: {name}: line {number}: {trimmed}: Cancelled"))
                    .into();
            }

            let line = substitute_positional(trimmed, args);
            let result = self.execute_line(&line, &options).await;
            if !result.success {
                let error = result.error.unwrap_or_default();
                tracing::debug!(script = name, line = number, %error, "script line failed");
                return ShellError::Script(format!("run: {name}: line {number}: {trimmed}: {error}"))
                    .into();
            }
            if !options.background {
                self.present(&result);
            }
        }

        tracing::info!(script = name, "script finished");
        CommandResult::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_walks_lines() {
        let mut ctx = ScriptingContext::new("echo a\n\necho b");
        assert_eq!(ctx.next_line(), Some((1, "echo a".into())));
        assert_eq!(ctx.next_line(), Some((2, String::new())));
        assert_eq!(ctx.take_input().as_deref(), Some("echo b"));
        assert!(!ctx.awaiting_input());
        assert!(ctx.is_finished());
        assert_eq!(ctx.take_input(), None);
        assert!(ctx.awaiting_input());
    }

    #[test]
    fn positional_substitution() {
        let args = vec!["one".to_string(), "two words".to_string()];
        assert_eq!(substitute_positional("echo $1 $2", &args), "echo one two words");
        assert_eq!(substitute_positional("echo $@", &args), "echo one \"two words\"");
        assert_eq!(substitute_positional("echo $#", &args), "echo 2");
        assert_eq!(substitute_positional("echo $3.", &args), "echo .");
        assert_eq!(substitute_positional("echo $HOME $0", &args), "echo $HOME $0");
    }
}
