//! Pathname expansion against the virtual file system.

use vsh_core::paths;
use vsh_core::VirtualFs;
use vsh_sdk::Identity;

use crate::ast::quote_word;
use crate::lexer::{splice, tokenize, TokenKind};

/// Commands whose arguments are glob-expanded. `find` is left out so its
/// `-name` patterns reach it untouched.
pub const GLOB_COMMANDS: &[&str] = &[
    "ls", "cat", "rm", "cp", "mv", "grep", "chmod", "chown", "chgrp", "touch", "head", "tail",
    "wc", "sort", "uniq", "echo",
];

#[must_use]
pub fn has_glob_chars(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Match `name` against a shell pattern supporting `*`, `?` and bracket
/// classes (`[abc]`, `[a-z]`, `[!x]` / `[^x]`).
#[must_use]
pub fn matches(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    match_from(&pattern, &name)
}

fn match_from(pattern: &[char], name: &[char]) -> bool {
    let Some((&first, rest)) = pattern.split_first() else {
        return name.is_empty();
    };
    match first {
        '*' => (0..=name.len()).any(|skip| match_from(rest, &name[skip..])),
        '?' => !name.is_empty() && match_from(rest, &name[1..]),
        '[' => match (parse_class(rest), name.first()) {
            (Some((class, after)), Some(&c)) => class.contains(c) && match_from(after, &name[1..]),
            (Some(_), None) => false,
            // Unclosed bracket matches itself
            (None, _) => name.first() == Some(&'[') && match_from(rest, &name[1..]),
        },
        c => name.first() == Some(&c) && match_from(rest, &name[1..]),
    }
}

struct CharClass {
    negated: bool,
    items: Vec<(char, char)>,
}

impl CharClass {
    fn contains(&self, c: char) -> bool {
        let hit = self.items.iter().any(|&(lo, hi)| lo <= c && c <= hi);
        hit != self.negated
    }
}

/// Parse the class body after `[`, returning it with the rest of the
/// pattern after the closing `]`.
fn parse_class(pattern: &[char]) -> Option<(CharClass, &[char])> {
    let mut i = 0;
    let negated = matches!(pattern.first(), Some('!' | '^'));
    if negated {
        i += 1;
    }
    let mut items = Vec::new();
    let mut first = true;
    while i < pattern.len() {
        let c = pattern[i];
        if c == ']' && !first {
            return Some((CharClass { negated, items }, &pattern[i + 1..]));
        }
        first = false;
        if pattern.get(i + 1) == Some(&'-') && pattern.get(i + 2).is_some_and(|&e| e != ']') {
            items.push((c, pattern[i + 2]));
            i += 3;
        } else {
            items.push((c, c));
            i += 1;
        }
    }
    None
}

/// Expand one pattern component by component. Results keep the form the
/// user typed (relative stays relative) and come back sorted; no match
/// yields an empty list.
#[must_use]
pub fn expand_pattern(vfs: &VirtualFs, pattern: &str, cwd: &str, user: &Identity) -> Vec<String> {
    let absolute = pattern.starts_with('/');
    let base = if absolute { "/".to_string() } else { cwd.to_string() };
    // (shown to the user, absolute path)
    let mut candidates: Vec<(String, String)> = vec![(String::new(), base)];

    for component in pattern.split('/').filter(|c| !c.is_empty()) {
        let mut next = Vec::new();
        for (shown, path) in candidates {
            let join_shown = |name: &str| {
                if shown.is_empty() {
                    if absolute {
                        format!("/{name}")
                    } else {
                        name.to_string()
                    }
                } else if shown.ends_with('/') {
                    format!("{shown}{name}")
                } else {
                    format!("{shown}/{name}")
                }
            };
            if has_glob_chars(component) {
                let Ok(entries) = vfs.list_dir(&path, user) else {
                    continue;
                };
                for entry in entries {
                    let hidden_ok = component.starts_with('.') || !entry.name.starts_with('.');
                    if hidden_ok && matches(component, &entry.name) {
                        next.push((join_shown(&entry.name), paths::join(&path, &entry.name)));
                    }
                }
            } else {
                let joined = match component {
                    "." => path.clone(),
                    ".." => paths::parent(&path).unwrap_or("/").to_string(),
                    name => paths::join(&path, name),
                };
                next.push((join_shown(component), joined));
            }
        }
        candidates = next;
    }

    let mut found: Vec<String> = candidates
        .into_iter()
        .filter(|(_, path)| vfs.stat(path, user).is_ok())
        .map(|(shown, _)| shown)
        .filter(|shown| !shown.is_empty())
        .collect();
    found.sort();
    found
}

/// Expand unquoted glob words in the arguments of [`GLOB_COMMANDS`].
/// Patterns without matches are left as typed.
#[must_use]
pub fn expand_line(line: &str, vfs: &VirtualFs, cwd: &str, user: &Identity) -> String {
    let Ok(tokens) = tokenize(line) else {
        return line.to_string();
    };
    let chars: Vec<char> = line.chars().collect();

    let mut replacements = Vec::new();
    let mut command: Option<&str> = None;
    let mut command_position = true;
    for token in &tokens {
        if command_position {
            command = token.kind.is_word().then_some(token.value.as_str());
        } else if token.kind == TokenKind::Word
            && command.is_some_and(|c| GLOB_COMMANDS.contains(&c))
            && has_glob_chars(&token.value)
            && !chars[token.span.clone()].contains(&'\\')
        {
            let found = expand_pattern(vfs, &token.value, cwd, user);
            if !found.is_empty() {
                let words: Vec<String> = found.iter().map(|w| quote_word(w)).collect();
                replacements.push((token.span.clone(), words.join(" ")));
            }
        }
        command_position = token.kind.is_separator();
    }

    if replacements.is_empty() {
        line.to_string()
    } else {
        splice(line, replacements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vsh_core::{MemoryStore, WriteMode};

    fn fs_with_files() -> VirtualFs {
        let vfs = VirtualFs::new(Arc::new(MemoryStore::new()));
        let root = Identity::root();
        for path in ["/tmp/a.txt", "/tmp/b.txt", "/tmp/c.log", "/tmp/.hidden.txt"] {
            vfs.write_file(path, "x", &root, WriteMode::Overwrite).unwrap();
        }
        vfs.create_directory("/tmp/sub", &root, false).unwrap();
        vfs.write_file("/tmp/sub/d.txt", "x", &root, WriteMode::Overwrite).unwrap();
        vfs
    }

    #[test]
    fn pattern_matching() {
        assert!(matches("*.txt", "notes.txt"));
        assert!(!matches("*.txt", "notes.log"));
        assert!(matches("?.txt", "a.txt"));
        assert!(!matches("?.txt", "ab.txt"));
        assert!(matches("[abc].txt", "b.txt"));
        assert!(matches("[a-c]*", "cat"));
        assert!(!matches("[!a-c]*", "cat"));
        assert!(matches("[^x]", "y"));
        assert!(matches("a*b*c", "aXXbYYc"));
        assert!(matches("[", "["));
        assert!(matches("*", ""));
    }

    #[test]
    fn expands_relative_and_absolute() {
        let vfs = fs_with_files();
        let root = Identity::root();
        assert_eq!(expand_pattern(&vfs, "*.txt", "/tmp", &root), vec!["a.txt", "b.txt"]);
        assert_eq!(
            expand_pattern(&vfs, "/tmp/*/*.txt", "/", &root),
            vec!["/tmp/sub/d.txt"]
        );
        assert_eq!(expand_pattern(&vfs, ".*.txt", "/tmp", &root), vec![".hidden.txt"]);
        assert!(expand_pattern(&vfs, "*.md", "/tmp", &root).is_empty());
    }

    #[test]
    fn line_expansion_respects_commands_and_quotes() {
        let vfs = fs_with_files();
        let root = Identity::root();
        assert_eq!(expand_line("cat *.txt", &vfs, "/tmp", &root), "cat a.txt b.txt");
        assert_eq!(expand_line("cat '*.txt'", &vfs, "/tmp", &root), "cat '*.txt'");
        assert_eq!(expand_line("find . -name *.txt", &vfs, "/tmp", &root), "find . -name *.txt");
        assert_eq!(expand_line("ls *.md", &vfs, "/tmp", &root), "ls *.md");
        assert_eq!(
            expand_line("echo x | wc *.log", &vfs, "/tmp", &root),
            "echo x | wc c.log"
        );
    }
}
