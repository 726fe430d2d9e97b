//! Lexer for vsh command lines
//!
//! Splits a line into words and operators. A word is a run of unquoted
//! text, escapes and quoted segments with no whitespace between them, so
//! `name='a b'` is one word. A backslash escapes the next character
//! everywhere, quotes included; a backslash at the very end of the line is
//! kept as a literal backslash.

use chumsky::prelude::*;
use std::fmt;
use std::ops::Range;

use crate::error::LexError;

pub type Span = Range<usize>;

/// Words are tagged by their first quoted segment: `Word` when there is
/// none, so glob and alias expansion only ever see fully unquoted text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Word,
    DoubleQuoted,
    SingleQuoted,

    Pipe,           // |
    RedirectOut,    // >
    RedirectAppend, // >>
    RedirectIn,     // <
    Semicolon,      // ;
    Ampersand,      // &
    AndAnd,         // &&
    OrOr,           // ||

    Eof,
}

impl TokenKind {
    pub fn is_word(self) -> bool {
        matches!(self, Self::Word | Self::DoubleQuoted | Self::SingleQuoted)
    }

    /// Operators that end a command segment.
    pub fn is_separator(self) -> bool {
        matches!(
            self,
            Self::Pipe | Self::Semicolon | Self::Ampersand | Self::AndAnd | Self::OrOr
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word => write!(f, "word"),
            Self::DoubleQuoted => write!(f, "double-quoted string"),
            Self::SingleQuoted => write!(f, "single-quoted string"),
            Self::Pipe => write!(f, "|"),
            Self::RedirectOut => write!(f, ">"),
            Self::RedirectAppend => write!(f, ">>"),
            Self::RedirectIn => write!(f, "<"),
            Self::Semicolon => write!(f, ";"),
            Self::Ampersand => write!(f, "&"),
            Self::AndAnd => write!(f, "&&"),
            Self::OrOr => write!(f, "||"),
            Self::Eof => write!(f, "end of input"),
        }
    }
}

/// A token with its unescaped value and its character span in the line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Lexeme {
    Token(TokenKind, String),
    Unterminated(char, usize),
}

/// One piece of a word.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Part {
    Plain(String),
    Quoted(TokenKind, String),
    Unterminated(char, usize),
}

fn join_parts(parts: Vec<Part>) -> Lexeme {
    let mut kind = TokenKind::Word;
    let mut value = String::new();
    for part in parts {
        match part {
            Part::Plain(text) => value.push_str(&text),
            Part::Quoted(quoted, text) => {
                if kind == TokenKind::Word {
                    kind = quoted;
                }
                value.push_str(&text);
            }
            Part::Unterminated(quote, position) => return Lexeme::Unterminated(quote, position),
        }
    }
    Lexeme::Token(kind, value)
}

fn lexer() -> impl Parser<char, Vec<(Lexeme, Span)>, Error = Simple<char>> {
    let escape = just('\\').ignore_then(any());
    let trailing_backslash = just('\\').then_ignore(end());

    let quoted = |quote: char| {
        just(quote)
            .ignore_then(
                just('\\')
                    .ignore_then(any())
                    .or(filter(move |c: &char| *c != quote && *c != '\\'))
                    .repeated()
                    .collect::<String>(),
            )
            .then(just(quote).or_not())
            .map_with_span(move |(text, close), span: Span| match (close, quote) {
                (None, _) => Part::Unterminated(quote, span.start),
                (Some(_), '"') => Part::Quoted(TokenKind::DoubleQuoted, text),
                (Some(_), _) => Part::Quoted(TokenKind::SingleQuoted, text),
            })
    };

    // Longest first
    let operator = choice((
        just(">>").to(TokenKind::RedirectAppend),
        just("&&").to(TokenKind::AndAnd),
        just("||").to(TokenKind::OrOr),
        just('|').to(TokenKind::Pipe),
        just('>').to(TokenKind::RedirectOut),
        just('<').to(TokenKind::RedirectIn),
        just(';').to(TokenKind::Semicolon),
        just('&').to(TokenKind::Ampersand),
    ))
    .map(|kind| Lexeme::Token(kind, kind.to_string()));

    let word_char = filter(|c: &char| {
        !c.is_whitespace() && !matches!(c, '|' | '&' | ';' | '<' | '>' | '"' | '\'' | '\\')
    });

    let plain = trailing_backslash
        .or(escape)
        .or(word_char)
        .repeated()
        .at_least(1)
        .collect::<String>()
        .map(Part::Plain);

    let word = choice((quoted('"'), quoted('\''), plain))
        .repeated()
        .at_least(1)
        .map(join_parts);

    let ws = filter(|c: &char| c.is_whitespace()).repeated();

    let token = choice((operator, word)).map_with_span(|lexeme, span: Span| (lexeme, span));

    ws.clone()
        .ignore_then(token.then_ignore(ws).repeated())
        .then_ignore(end())
}

/// Tokenize a line. The result always ends with an [`TokenKind::Eof`]
/// token whose span is the end of the line.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    let lexemes = lexer().parse(input).map_err(|errs| {
        let first = errs.into_iter().next();
        LexError {
            position: first.as_ref().map_or(0, |e| e.span().start),
            message: first.map_or_else(|| "invalid input".to_string(), |e| e.to_string()),
        }
    })?;

    let mut tokens = Vec::with_capacity(lexemes.len() + 1);
    for (lexeme, span) in lexemes {
        match lexeme {
            Lexeme::Token(kind, value) => tokens.push(Token { kind, value, span }),
            Lexeme::Unterminated(quote, position) => {
                return Err(LexError {
                    position,
                    message: format!("unterminated {quote} quote"),
                })
            }
        }
    }
    let end = input.chars().count();
    tokens.push(Token {
        kind: TokenKind::Eof,
        value: String::new(),
        span: end..end,
    });
    Ok(tokens)
}

/// Replace character ranges of `text`. Ranges must not overlap.
pub fn splice(text: &str, mut replacements: Vec<(Span, String)>) -> String {
    replacements.sort_by_key(|(span, _)| span.start);
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (span, replacement) in replacements {
        out.extend(&chars[cursor..span.start]);
        out.push_str(&replacement);
        cursor = span.end;
    }
    out.extend(&chars[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn values(input: &str) -> Vec<String> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| t.value)
            .collect()
    }

    #[test]
    fn test_simple_command() {
        assert_eq!(values("echo hello"), vec!["echo", "hello"]);
        assert_eq!(
            kinds("echo hello"),
            vec![TokenKind::Word, TokenKind::Word, TokenKind::Eof]
        );
    }

    #[test]
    fn test_quoted_strings() {
        let tokens = tokenize("echo \"hello world\" 'it''s' ''").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::DoubleQuoted);
        assert_eq!(tokens[1].value, "hello world");
        assert_eq!(tokens[2].kind, TokenKind::SingleQuoted);
        assert_eq!(tokens[2].value, "its");
        assert_eq!(tokens[3].kind, TokenKind::SingleQuoted);
        assert_eq!(tokens[3].value, "");
    }

    #[test]
    fn test_adjacent_parts_form_one_word() {
        assert_eq!(values("echo a'b c'd"), vec!["echo", "ab cd"]);
        assert_eq!(values("alias name='v w'"), vec!["alias", "name=v w"]);
        assert_eq!(values(r#"export X="a b"c\ d"#), vec!["export", "Xa bc d"]);

        let tokens = tokenize("alias name='v w' x").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::SingleQuoted);
        assert_eq!(tokens[1].span, 6..16);
        assert_eq!(tokens[2].kind, TokenKind::Word);
    }

    #[test]
    fn test_escapes_inside_quotes_are_lossless() {
        let tokens = tokenize(r#"echo "say \"hi\" \\ now" 'a\'b'"#).unwrap();
        assert_eq!(tokens[1].value, r#"say "hi" \ now"#);
        assert_eq!(tokens[2].value, "a'b");
    }

    #[test]
    fn test_escaped_space_joins_word() {
        assert_eq!(values(r"cat my\ file.txt"), vec!["cat", "my file.txt"]);
        assert_eq!(values(r"echo \|"), vec!["echo", "|"]);
    }

    #[test]
    fn test_trailing_backslash_is_literal() {
        assert_eq!(values(r"echo abc\"), vec!["echo", r"abc\"]);
        assert_eq!(values("echo \\"), vec!["echo", "\\"]);
    }

    #[test]
    fn test_operators_longest_first() {
        assert_eq!(
            kinds("a >> b > c && d & e || f | g ; h < i"),
            vec![
                TokenKind::Word,
                TokenKind::RedirectAppend,
                TokenKind::Word,
                TokenKind::RedirectOut,
                TokenKind::Word,
                TokenKind::AndAnd,
                TokenKind::Word,
                TokenKind::Ampersand,
                TokenKind::Word,
                TokenKind::OrOr,
                TokenKind::Word,
                TokenKind::Pipe,
                TokenKind::Word,
                TokenKind::Semicolon,
                TokenKind::Word,
                TokenKind::RedirectIn,
                TokenKind::Word,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators_without_spaces() {
        assert_eq!(values("ls|wc>out"), vec!["ls", "|", "wc", ">", "out"]);
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("  ls  -l").unwrap();
        assert_eq!(tokens[0].span, 2..4);
        assert_eq!(tokens[1].span, 6..8);
        assert_eq!(tokens[2].span, 8..8);
    }

    #[test]
    fn test_unterminated_quote() {
        let err = tokenize("echo \"oops").unwrap_err();
        assert_eq!(err.position, 5);
        assert!(err.message.contains("unterminated"));

        let err = tokenize("echo ab'cd").unwrap_err();
        assert_eq!(err.position, 7);

        assert!(tokenize("echo 'a\\'").is_err());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(kinds("   "), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_splice() {
        let text = "ls *.txt é";
        assert_eq!(splice(text, vec![(3..8, "a.txt b.txt".into())]), "ls a.txt b.txt é");
    }
}
