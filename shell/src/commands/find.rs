//! `find` with a small expression language.
//!
//! ```text
//! expr    := or
//! or      := and (-o and)*
//! and     := unary ([-a] unary)*
//! unary   := (-not | !) unary | ( expr ) | primary
//! primary := -name PAT | -type f|d | -user NAME | -perm [-/]MODE
//!          | -mtime [+-]N | -newermt DATE | -oldermt DATE
//!          | -print | -delete | -exec CMD... ;
//! ```

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vsh_core::ResolveOptions;
use vsh_sdk::{NodeInfo, NodeKind};

use super::display_path;
use crate::ast::quote_word;
use crate::command::{Command, CommandSpec};
use crate::context::ExecContext;
use crate::glob;
use crate::result::{CommandResult, MessageType};
use crate::utils::parse_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compare {
    Less,
    Equal,
    Greater,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PermMatch {
    Exact,
    /// `-MODE`: all these bits set
    All,
    /// `/MODE`: any of these bits set
    Any,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    True,
    Name(String),
    Type(NodeKind),
    User(String),
    Perm(PermMatch, u32),
    Mtime(Compare, i64),
    Newer(DateTime<Utc>),
    Older(DateTime<Utc>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Print,
    Delete,
    Exec(Vec<String>),
}

impl Expr {
    fn has_action(&self) -> bool {
        match self {
            Self::Print | Self::Delete | Self::Exec(_) => true,
            Self::Not(inner) => inner.has_action(),
            Self::And(a, b) | Self::Or(a, b) => a.has_action() || b.has_action(),
            _ => false,
        }
    }
}

struct ExprParser<'a> {
    args: &'a [String],
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.args.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> Option<&'a str> {
        let arg = self.peek()?;
        self.pos += 1;
        Some(arg)
    }

    fn operand(&mut self, primary: &str) -> Result<&'a str, String> {
        self.next()
            .ok_or_else(|| format!("missing argument to '{primary}'"))
    }

    fn parse(mut self) -> Result<Expr, String> {
        if self.peek().is_none() {
            return Ok(Expr::True);
        }
        let expr = self.or()?;
        match self.peek() {
            Some(extra) => Err(format!("unexpected '{extra}'")),
            None => Ok(expr),
        }
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut left = self.and()?;
        while matches!(self.peek(), Some("-o" | "-or")) {
            self.pos += 1;
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut left = self.unary()?;
        loop {
            match self.peek() {
                Some("-a" | "-and") => self.pos += 1,
                Some("-o" | "-or" | ")") | None => break,
                Some(_) => {}
            }
            let right = self.unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some("-not" | "!") => {
                self.pos += 1;
                Ok(Expr::Not(Box::new(self.unary()?)))
            }
            Some("(") => {
                self.pos += 1;
                let inner = self.or()?;
                match self.next() {
                    Some(")") => Ok(inner),
                    _ => Err("missing ')'".to_string()),
                }
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, String> {
        let Some(primary) = self.next() else {
            return Err("expected an expression".to_string());
        };
        match primary {
            "-name" => Ok(Expr::Name(self.operand(primary)?.to_string())),
            "-type" => match self.operand(primary)? {
                "f" => Ok(Expr::Type(NodeKind::File)),
                "d" => Ok(Expr::Type(NodeKind::Directory)),
                other => Err(format!("unknown argument to -type: {other}")),
            },
            "-user" => Ok(Expr::User(self.operand(primary)?.to_string())),
            "-perm" => {
                let raw = self.operand(primary)?;
                let (kind, digits) = if let Some(d) = raw.strip_prefix('-') {
                    (PermMatch::All, d)
                } else if let Some(d) = raw.strip_prefix('/') {
                    (PermMatch::Any, d)
                } else {
                    (PermMatch::Exact, raw)
                };
                let mode = u32::from_str_radix(digits, 8)
                    .map_err(|_| format!("invalid mode '{raw}'"))?;
                Ok(Expr::Perm(kind, mode))
            }
            "-mtime" => {
                let raw = self.operand(primary)?;
                let (cmp, digits) = if let Some(d) = raw.strip_prefix('+') {
                    (Compare::Greater, d)
                } else if let Some(d) = raw.strip_prefix('-') {
                    (Compare::Less, d)
                } else {
                    (Compare::Equal, raw)
                };
                let days = digits
                    .parse()
                    .map_err(|_| format!("invalid argument '{raw}' to -mtime"))?;
                Ok(Expr::Mtime(cmp, days))
            }
            "-newermt" | "-oldermt" => {
                let raw = self.operand(primary)?;
                let when = parse_date(raw).ok_or_else(|| format!("invalid date '{raw}'"))?;
                Ok(if primary == "-newermt" {
                    Expr::Newer(when)
                } else {
                    Expr::Older(when)
                })
            }
            "-print" => Ok(Expr::Print),
            "-delete" => Ok(Expr::Delete),
            "-exec" => {
                let mut command = Vec::new();
                loop {
                    match self.next() {
                        Some(";" | "\\;") => break,
                        Some(word) => command.push(word.to_string()),
                        None => return Err("missing argument to '-exec'".to_string()),
                    }
                }
                if command.is_empty() {
                    return Err("missing argument to '-exec'".to_string());
                }
                Ok(Expr::Exec(command))
            }
            other => Err(format!("unknown predicate '{other}'")),
        }
    }
}

/// State collected while evaluating one `find` run.
#[derive(Default)]
struct Run {
    output: Vec<String>,
    errors: Vec<String>,
    delete: Vec<String>,
}

fn eval<'a>(
    ctx: &'a ExecContext<'_>,
    expr: &'a Expr,
    entry: &'a NodeInfo,
    shown: &'a str,
    run: &'a mut Run,
) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
    Box::pin(async move {
        match expr {
            Expr::True => true,
            Expr::Name(pattern) => glob::matches(pattern, &entry.name),
            Expr::Type(kind) => entry.kind == *kind,
            Expr::User(name) => entry.owner == *name,
            Expr::Perm(kind, mode) => {
                let bits = entry.mode & 0o777;
                match kind {
                    PermMatch::Exact => bits == *mode,
                    PermMatch::All => bits & mode == *mode,
                    PermMatch::Any => *mode == 0 || bits & mode != 0,
                }
            }
            Expr::Mtime(cmp, days) => {
                let age = (Utc::now() - entry.mtime).num_days();
                match cmp {
                    Compare::Less => age < *days,
                    Compare::Equal => age == *days,
                    Compare::Greater => age > *days,
                }
            }
            Expr::Newer(when) => entry.mtime > *when,
            Expr::Older(when) => entry.mtime < *when,
            Expr::Not(inner) => !eval(ctx, inner, entry, shown, run).await,
            Expr::And(a, b) => {
                eval(ctx, a, entry, shown, run).await && eval(ctx, b, entry, shown, run).await
            }
            Expr::Or(a, b) => {
                eval(ctx, a, entry, shown, run).await || eval(ctx, b, entry, shown, run).await
            }
            Expr::Print => {
                run.output.push(shown.to_string());
                true
            }
            Expr::Delete => {
                run.delete.push(entry.path.clone());
                true
            }
            Expr::Exec(command) => {
                let line = command
                    .iter()
                    .map(|word| quote_word(&word.replace("{}", shown)))
                    .collect::<Vec<_>>()
                    .join(" ");
                let result = ctx.shell.execute_line(&line, ctx.options).await;
                if let Some(out) = result.output.filter(|o| !o.is_empty()) {
                    run.output.push(out);
                }
                if let Some(err) = result.error {
                    run.errors.push(err);
                }
                result.success
            }
        }
    })
}

pub struct Find;

#[async_trait]
impl Command for Find {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "find",
            "Search for files in a directory hierarchy",
            "find [PATH]... [EXPRESSION]",
        )
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let split = ctx
            .args
            .iter()
            .position(|a| a.starts_with('-') || a == "!" || a == "(")
            .unwrap_or(ctx.args.len());
        let mut starts: Vec<String> = ctx.args[..split].to_vec();
        if starts.is_empty() {
            starts.push(".".to_string());
        }

        let expr = match (ExprParser {
            args: &ctx.args[split..],
            pos: 0,
        })
        .parse()
        {
            Ok(expr) => expr,
            Err(e) => return CommandResult::failure(ctx.error(e)),
        };
        let expr = if expr.has_action() {
            expr
        } else {
            Expr::And(Box::new(expr), Box::new(Expr::Print))
        };

        let mut run = Run::default();
        for raw in &starts {
            let resolution = ctx.resolve(raw, ResolveOptions::default());
            if let Some(message) = resolution.message() {
                run.errors.push(message);
                continue;
            }
            let walk = match ctx.vfs().walk(&resolution.path, &ctx.user) {
                Ok(walk) => walk,
                Err(e) => {
                    run.errors.push(ctx.error(e));
                    continue;
                }
            };
            for entry in &walk.entries {
                if ctx.is_cancelled() {
                    return CommandResult::failure(ctx.error("Cancelled"));
                }
                let shown = display_path(raw, &resolution.path, &entry.path);
                eval(ctx, &expr, entry, &shown, &mut run).await;
            }
            for denied in walk.denied {
                run.errors.push(ctx.error(format!(
                    "'{}': Permission denied",
                    display_path(raw, &resolution.path, &denied)
                )));
            }
        }

        let mut saved = Ok(());
        if !run.delete.is_empty() {
            // Deepest first so directories are empty by the time they go
            run.delete.sort_by_key(|p| std::cmp::Reverse(p.matches('/').count()));
            let mut deleted = false;
            for path in &run.delete {
                let outcome = ctx.vfs().delete(path, &ctx.user, false);
                deleted |= outcome.changed();
                run.errors
                    .extend(outcome.error_messages().into_iter().map(|m| ctx.error(m)));
            }
            if deleted {
                saved = ctx.shell.persist().await;
            }
        }

        let output = run.output.join("\n");
        if run.errors.is_empty() {
            return CommandResult::output(output).with_persistence(saved);
        }
        CommandResult {
            success: false,
            output: Some(output).filter(|o| !o.is_empty()),
            error: Some(run.errors.join("\n")),
            message_type: Some(MessageType::Error),
        }
        .with_persistence(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Expr, String> {
        let args: Vec<String> = args.iter().map(|s| (*s).to_string()).collect();
        ExprParser { args: &args, pos: 0 }.parse()
    }

    #[test]
    fn parses_implicit_and_and_or() {
        let expr = parse(&["-name", "*.txt", "-type", "f", "-o", "-type", "d"]).unwrap();
        assert!(matches!(expr, Expr::Or(_, _)));
        assert!(!expr.has_action());
    }

    #[test]
    fn parses_not_and_groups() {
        let expr = parse(&["!", "(", "-user", "root", "-o", "-perm", "-644", ")"]).unwrap();
        let Expr::Not(inner) = expr else {
            panic!("expected negation");
        };
        assert!(matches!(*inner, Expr::Or(_, _)));
    }

    #[test]
    fn exec_collects_until_semicolon() {
        let expr = parse(&["-exec", "cat", "{}", ";"]).unwrap();
        assert_eq!(expr, Expr::Exec(vec!["cat".into(), "{}".into()]));
        assert!(parse(&["-exec", "cat", "{}"]).is_err());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["-type", "x"]).is_err());
        assert!(parse(&["-name"]).is_err());
        assert!(parse(&["-bogus"]).is_err());
        assert!(parse(&["-mtime", "soon"]).is_err());
    }
}
