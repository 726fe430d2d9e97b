//! Parser for vsh command lines
//!
//! Turns the token stream into pipeline groups, each paired with the
//! operator that follows it.

use chumsky::error::SimpleReason;
use chumsky::prelude::*;
use chumsky::Stream;

use crate::ast::{CommandSegment, Operator, Pipeline, RedirectMode, Redirection};
use crate::error::{ParseError, ShellError, ShellResult};
use crate::lexer::{tokenize, Span, Token, TokenKind};

type Tok = (TokenKind, String);

fn kind(expected: TokenKind) -> impl Parser<Tok, Tok, Error = Simple<Tok>> + Clone {
    filter(move |(k, _): &Tok| *k == expected)
}

fn word() -> impl Parser<Tok, String, Error = Simple<Tok>> + Clone {
    filter_map(|span, tok: Tok| {
        if tok.0.is_word() {
            Ok(tok.1)
        } else {
            Err(Simple::expected_input_found(span, Vec::new(), Some(tok)))
        }
    })
}

fn pipeline() -> impl Parser<Tok, Pipeline, Error = Simple<Tok>> + Clone {
    let segment = word()
        .then(word().repeated())
        .map(|(name, args)| CommandSegment { name, args });

    let input = kind(TokenKind::RedirectIn).ignore_then(word());

    let output = choice((
        kind(TokenKind::RedirectOut).to(RedirectMode::Overwrite),
        kind(TokenKind::RedirectAppend).to(RedirectMode::Append),
    ))
    .then(word())
    .map(|(mode, target)| Redirection { mode, target });

    // `<` may come before the first segment, right after it, or after the
    // last one; a pipeline takes at most one
    input
        .clone()
        .or_not()
        .then(segment.clone())
        .then(input.clone().or_not())
        .then(kind(TokenKind::Pipe).ignore_then(segment).repeated())
        .then(input.or_not())
        .then(output.or_not())
        .try_map(|(((((leading, first), inner), rest), trailing), redirection), span| {
            let mut inputs = [leading, inner, trailing].into_iter().flatten();
            let input = inputs.next();
            if inputs.next().is_some() {
                return Err(Simple::custom(span, "more than one input redirection"));
            }
            let mut segments = Vec::with_capacity(rest.len() + 1);
            segments.push(first);
            segments.extend(rest);
            Ok(Pipeline {
                segments,
                redirection,
                input,
                background: false,
                job_id: None,
            })
        })
}

type Groups = (Vec<(Pipeline, (Operator, Span))>, Option<Pipeline>);

/// Parse a token stream into pipelines, each followed by its operator and
/// the operator's span, plus an optional unterminated last pipeline.
pub fn parser() -> impl Parser<Tok, Groups, Error = Simple<Tok>> {
    let operator = choice((
        kind(TokenKind::Semicolon).to(Operator::Sequence),
        kind(TokenKind::Ampersand).to(Operator::Background),
        kind(TokenKind::AndAnd).to(Operator::And),
        kind(TokenKind::OrOr).to(Operator::Or),
    ))
    .map_with_span(|op, span: Span| (op, span));

    let leading = choice((kind(TokenKind::Semicolon), kind(TokenKind::Ampersand))).repeated();

    leading
        .ignore_then(pipeline().then(operator).repeated())
        .then(pipeline().or_not())
        .then_ignore(end())
}

fn into_groups((pairs, last): Groups) -> Result<Vec<(Pipeline, Operator)>, ParseError> {
    if last.is_none() {
        if let Some((_, (op, span))) = pairs.last() {
            if matches!(op, Operator::And | Operator::Or) {
                return Err(ParseError {
                    position: span.start,
                    token: Some(op.to_string()),
                    message: format!("unexpected end of input after '{op}'"),
                });
            }
        }
    }

    let mut groups: Vec<(Pipeline, Operator)> = pairs
        .into_iter()
        .map(|(mut pipeline, (op, _))| {
            pipeline.background = op == Operator::Background;
            (pipeline, op)
        })
        .collect();
    if let Some(pipeline) = last {
        groups.push((pipeline, Operator::End));
    }
    Ok(groups)
}

/// Parse already-lexed tokens. The trailing EOF token, if present, only
/// supplies the end-of-input position.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Vec<(Pipeline, Operator)>, ParseError> {
    let eoi = tokens.last().map_or(0, |t| t.span.end);
    let stream = Stream::from_iter(
        eoi..eoi,
        tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| ((t.kind, t.value), t.span)),
    );
    let groups = parser().parse(stream).map_err(|errs| {
        errs.into_iter().next().map_or_else(
            || ParseError {
                position: eoi,
                token: None,
                message: "invalid syntax".to_string(),
            },
            to_parse_error,
        )
    })?;
    into_groups(groups)
}

fn to_parse_error(err: Simple<Tok>) -> ParseError {
    let token = err.found().map(|(_, value)| value.clone());
    let message = match err.reason() {
        SimpleReason::Custom(msg) => msg.clone(),
        _ => match &token {
            Some(t) => format!("unexpected '{t}'"),
            None => "unexpected end of input".to_string(),
        },
    };
    ParseError {
        position: err.span().start,
        token,
        message,
    }
}

/// Lex and parse a line
pub fn parse(input: &str) -> ShellResult<Vec<(Pipeline, Operator)>> {
    let tokens = tokenize(input)?;
    parse_tokens(tokens).map_err(ShellError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(p: &Pipeline) -> Vec<&str> {
        p.segments.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_simple_command() {
        let groups = parse("echo hello world").unwrap();
        assert_eq!(groups.len(), 1);
        let (pipeline, op) = &groups[0];
        assert_eq!(*op, Operator::End);
        assert_eq!(pipeline.segments[0].name, "echo");
        assert_eq!(pipeline.segments[0].args, vec!["hello", "world"]);
        assert!(!pipeline.background);
    }

    #[test]
    fn test_pipeline_with_redirections() {
        let groups = parse("cat < in.txt | sort | uniq >> out.txt").unwrap();
        let (pipeline, _) = &groups[0];
        assert_eq!(names(pipeline), vec!["cat", "sort", "uniq"]);
        assert_eq!(pipeline.input.as_deref(), Some("in.txt"));
        let redirection = pipeline.redirection.as_ref().unwrap();
        assert_eq!(redirection.mode, RedirectMode::Append);
        assert_eq!(redirection.target, "out.txt");
    }

    #[test]
    fn test_input_redirection_positions() {
        let groups = parse("cat < in.txt | wc -l").unwrap();
        let (pipeline, _) = &groups[0];
        assert_eq!(names(pipeline), vec!["cat", "wc"]);
        assert_eq!(pipeline.segments[0].args, Vec::<String>::new());
        assert_eq!(pipeline.input.as_deref(), Some("in.txt"));

        let groups = parse("sort | uniq < in.txt").unwrap();
        assert_eq!(groups[0].0.input.as_deref(), Some("in.txt"));

        assert!(parse("< a cat < b | wc").is_err());
        assert!(parse("cat < a | wc < b").is_err());
    }

    #[test]
    fn test_leading_input_redirection() {
        let groups = parse("< in.txt wc -l > count").unwrap();
        let (pipeline, _) = &groups[0];
        assert_eq!(pipeline.input.as_deref(), Some("in.txt"));
        assert_eq!(pipeline.segments[0].args, vec!["-l"]);
        assert_eq!(pipeline.redirection.as_ref().unwrap().mode, RedirectMode::Overwrite);
    }

    #[test]
    fn test_sequencing_operators() {
        let groups = parse("mkdir a && cd a || echo failed; sleep 5 &").unwrap();
        let ops: Vec<Operator> = groups.iter().map(|(_, op)| *op).collect();
        assert_eq!(
            ops,
            vec![
                Operator::And,
                Operator::Or,
                Operator::Sequence,
                Operator::Background,
            ]
        );
        assert!(groups[3].0.background);
        assert!(!groups[0].0.background);
    }

    #[test]
    fn test_trailing_separators_are_legal() {
        assert_eq!(parse("ls;").unwrap().len(), 1);
        assert_eq!(parse("sleep 1 &").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_and_separator_only() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("   ").unwrap().is_empty());
        assert!(parse(";").unwrap().is_empty());
        assert!(parse("; & ;").unwrap().is_empty());
    }

    #[test]
    fn test_trailing_and_is_an_error() {
        let err = parse_tokens(tokenize("ls &&").unwrap()).unwrap_err();
        assert_eq!(err.position, 3);
        assert!(err.message.contains("&&"));

        assert!(parse("ls ||").is_err());
    }

    #[test]
    fn test_redirect_needs_one_target() {
        assert!(parse("echo hi >").is_err());
        assert!(parse("echo hi > a b").is_err());
    }

    #[test]
    fn test_error_names_token() {
        let err = parse_tokens(tokenize("ls | | wc").unwrap()).unwrap_err();
        assert_eq!(err.token.as_deref(), Some("|"));
        assert!(err.position == 3 || err.position == 5);
    }

    #[test]
    fn test_quoted_words() {
        let groups = parse("grep \"a b\" 'c|d'").unwrap();
        assert_eq!(groups[0].0.segments[0].args, vec!["a b", "c|d"]);
    }

    #[test]
    fn test_display_round_trips() {
        let line = "cat \"my file\" | grep x > out.txt";
        let groups = parse(line).unwrap();
        let again = parse(&groups[0].0.to_string()).unwrap();
        assert_eq!(groups, again);
    }
}
