//! Parsed form of one command line.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One command with its arguments, e.g. `grep -i foo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSegment {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandSegment {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirectMode {
    /// `>`
    Overwrite,
    /// `>>`
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirection {
    pub mode: RedirectMode,
    pub target: String,
}

/// Segments joined by `|`, with optional redirections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub segments: Vec<CommandSegment>,
    pub redirection: Option<Redirection>,
    pub input: Option<String>,
    pub background: bool,
    /// Set once the pipeline is registered as a background job.
    pub job_id: Option<u64>,
}

impl Pipeline {
    pub fn new(segments: Vec<CommandSegment>) -> Self {
        Self {
            segments,
            redirection: None,
            input: None,
            background: false,
            job_id: None,
        }
    }
}

/// What follows a pipeline on the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// `;`
    Sequence,
    /// `&`
    Background,
    /// `&&`
    And,
    /// `||`
    Or,
    /// Last pipeline on the line, nothing follows.
    End,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, ";"),
            Self::Background => write!(f, "&"),
            Self::And => write!(f, "&&"),
            Self::Or => write!(f, "||"),
            Self::End => Ok(()),
        }
    }
}

fn write_word(f: &mut fmt::Formatter<'_>, word: &str) -> fmt::Result {
    let needs_quotes = word.is_empty()
        || word
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '|' | '&' | ';' | '<' | '>' | '\'' | '"' | '\\'));
    if needs_quotes {
        write!(f, "\"")?;
        for c in word.chars() {
            if matches!(c, '"' | '\\') {
                write!(f, "\\")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, "\"")
    } else {
        write!(f, "{word}")
    }
}

impl fmt::Display for CommandSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_word(f, &self.name)?;
        for arg in &self.args {
            write!(f, " ")?;
            write_word(f, arg)?;
        }
        Ok(())
    }
}

/// Renders back to command-line text that parses to the same pipeline.
impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{segment}")?;
        }
        if let Some(input) = &self.input {
            write!(f, " < ")?;
            write_word(f, input)?;
        }
        if let Some(redirection) = &self.redirection {
            match redirection.mode {
                RedirectMode::Overwrite => write!(f, " > ")?,
                RedirectMode::Append => write!(f, " >> ")?,
            }
            write_word(f, &redirection.target)?;
        }
        Ok(())
    }
}

/// Quote `word` so the lexer reads it back as a single word.
pub fn quote_word(word: &str) -> String {
    struct Quoted<'a>(&'a str);
    impl fmt::Display for Quoted<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write_word(f, self.0)
        }
    }
    Quoted(word).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_display() {
        let mut pipeline = Pipeline::new(vec![
            CommandSegment::new("cat", vec!["notes.txt".into()]),
            CommandSegment::new("grep", vec!["two words".into()]),
        ]);
        pipeline.redirection = Some(Redirection {
            mode: RedirectMode::Append,
            target: "out.txt".into(),
        });
        assert_eq!(
            pipeline.to_string(),
            "cat notes.txt | grep \"two words\" >> out.txt"
        );
    }

    #[test]
    fn quoting() {
        assert_eq!(quote_word("plain"), "plain");
        assert_eq!(quote_word(""), "\"\"");
        assert_eq!(quote_word("say \"hi\""), "\"say \\\"hi\\\"\"");
    }
}
