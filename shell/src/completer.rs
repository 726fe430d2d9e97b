use std::borrow::Cow;

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use vsh::Shell;
use vsh_core::paths;

/// Tab completion for the REPL: command names and aliases in command
/// position, paths in the virtual tree everywhere.
pub struct VshHelper {
    shell: Shell,
}

impl VshHelper {
    pub const fn new(shell: Shell) -> Self {
        Self { shell }
    }

    fn command_candidates(&self, word: &str) -> Vec<Pair> {
        let mut names: Vec<String> = self
            .shell
            .registry()
            .names()
            .filter(|name| name.starts_with(word))
            .map(str::to_string)
            .collect();
        names.extend(
            self.shell
                .aliases_snapshot()
                .into_keys()
                .filter(|name| name.starts_with(word)),
        );
        names.sort();
        names.dedup();
        names
            .into_iter()
            .map(|name| Pair {
                display: name.clone(),
                replacement: name,
            })
            .collect()
    }

    fn path_candidates(&self, word: &str) -> Vec<Pair> {
        let (user, cwd) = self.shell.session();
        let (dir, prefix, partial) = match word.rfind('/') {
            Some(slash) => {
                let dir = if slash == 0 { "/" } else { &word[..slash] };
                (dir, &word[..=slash], &word[slash + 1..])
            }
            None => (".", "", word),
        };
        let Ok(dir) = paths::normalize(&cwd, dir) else {
            return Vec::new();
        };
        let Ok(entries) = self.shell.vfs().list_dir(&dir, &user) else {
            return Vec::new();
        };
        entries
            .into_iter()
            .filter(|e| e.name.starts_with(partial))
            .filter(|e| !e.name.starts_with('.') || partial.starts_with('.'))
            .map(|e| {
                let name = if e.is_dir() {
                    format!("{}/", e.name)
                } else {
                    e.name
                };
                Pair {
                    replacement: format!("{prefix}{name}"),
                    display: name,
                }
            })
            .collect()
    }
}

impl Completer for VshHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, word) = find_word_start(&line[..pos]);
        let first_word = line[..start]
            .trim_end()
            .chars()
            .last()
            .map_or(true, |c| matches!(c, ';' | '|' | '&'));

        let mut completions = Vec::new();
        if first_word && !word.contains('/') {
            if word.is_empty() {
                return Ok((pos, completions));
            }
            completions = self.command_candidates(word);
        }
        if !first_word || word.contains('/') || word.starts_with('.') {
            completions.extend(self.path_candidates(word));
        }
        Ok((start, completions))
    }
}

fn find_word_start(line: &str) -> (usize, &str) {
    let start = line
        .char_indices()
        .rev()
        .find(|&(_, c)| c.is_whitespace() || matches!(c, ';' | '|' | '&' | '>' | '<'))
        .map_or(0, |(i, c)| i + c.len_utf8());
    (start, &line[start..])
}

impl Hinter for VshHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for VshHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Borrowed(hint)
    }
}

impl Validator for VshHelper {}

impl Helper for VshHelper {}
