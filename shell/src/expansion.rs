//! Line rewriting that happens before lexing: environment variables and
//! aliases. Glob expansion lives in [`crate::glob`].

use std::collections::{HashMap, HashSet};

use crate::error::{ShellError, ShellResult};
use crate::lexer::{splice, tokenize, TokenKind};

/// Replace `$VAR` and `${VAR}` outside single quotes. Unknown variables
/// expand to nothing; a backslash keeps the `$` literal.
#[must_use]
pub fn substitute_env(line: &str, env: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    let mut in_single = false;
    let mut in_double = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '\'' if !in_double => {
                in_single = !in_single;
                out.push(c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                out.push(c);
            }
            '$' if !in_single => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if closed {
                        out.push_str(env.get(&name).map_or("", String::as_str));
                    } else {
                        out.push_str("${");
                        out.push_str(&name);
                    }
                } else if chars.peek().is_some_and(|c| c.is_alphabetic() || *c == '_') {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if c.is_alphanumeric() || c == '_' {
                            name.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    out.push_str(env.get(&name).map_or("", String::as_str));
                } else {
                    out.push('$');
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Expand aliases in command position: the first word of the line and the
/// first word after `|`, `;`, `&`, `&&` or `||`. An alias is never expanded
/// inside its own expansion. Lines that fail to lex are returned unchanged
/// so the parser can report the error.
pub fn expand_aliases(
    line: &str,
    aliases: &HashMap<String, String>,
    max_depth: usize,
) -> ShellResult<String> {
    if aliases.is_empty() {
        return Ok(line.to_string());
    }

    let mut text = line.to_string();
    let mut expanded: HashSet<String> = HashSet::new();
    for _ in 0..max_depth {
        let Ok(tokens) = tokenize(&text) else {
            return Ok(text);
        };

        let mut replacements = Vec::new();
        let mut names = Vec::new();
        let mut command_position = true;
        for token in &tokens {
            if command_position && token.kind == TokenKind::Word && !expanded.contains(&token.value) {
                if let Some(value) = aliases.get(&token.value) {
                    replacements.push((token.span.clone(), value.clone()));
                    names.push(token.value.clone());
                }
            }
            command_position = token.kind.is_separator();
        }

        if replacements.is_empty() {
            return Ok(text);
        }
        tracing::debug!(aliases = ?names, "expanding aliases");
        expanded.extend(names);
        text = splice(&text, replacements);
    }
    Err(ShellError::Validation(format!(
        "alias: expansion exceeded depth {max_depth}"
    )))
}
