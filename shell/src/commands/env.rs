//! Aliases and environment variables.

use async_trait::async_trait;

use super::Report;
use crate::ast::quote_word;
use crate::command::{ArgRule, Command, CommandSpec};
use crate::context::ExecContext;
use crate::result::CommandResult;

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn sorted_pairs(map: std::collections::HashMap<String, String>) -> Vec<(String, String)> {
    let mut pairs: Vec<_> = map.into_iter().collect();
    pairs.sort();
    pairs
}

pub struct Alias;

#[async_trait]
impl Command for Alias {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("alias", "Define or list aliases", "alias [NAME[=VALUE]]...")
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        if ctx.args.is_empty() {
            let lines: Vec<String> = sorted_pairs(ctx.shell.aliases_snapshot())
                .into_iter()
                .map(|(name, value)| format!("alias {name}={}", quote_word(&value)))
                .collect();
            return CommandResult::output(lines.join("\n"));
        }

        let mut report = Report::default();
        for arg in &ctx.args {
            match arg.split_once('=') {
                Some((name, value)) => {
                    if !valid_name(name) {
                        report.error(ctx.error(format!("'{name}': invalid alias name")));
                        continue;
                    }
                    if value.is_empty() {
                        report.error(ctx.error(format!("'{name}': empty alias value")));
                        continue;
                    }
                    ctx.shell.set_alias(name, value);
                    tracing::debug!(name, value, "alias defined");
                }
                None => match ctx.shell.get_alias(arg) {
                    Some(value) => report.line(format!("alias {arg}={}", quote_word(&value))),
                    None => report.error(ctx.error(format!("{arg}: not found"))),
                },
            }
        }
        report.finish(ctx).await
    }
}

pub struct Unalias;

#[async_trait]
impl Command for Unalias {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("unalias", "Remove aliases", "unalias NAME...").args(ArgRule::at_least(1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let mut report = Report::default();
        for name in &ctx.args {
            if !ctx.shell.remove_alias(name) {
                report.error(ctx.error(format!("{name}: not found")));
            }
        }
        report.finish(ctx).await
    }
}

pub struct Export;

#[async_trait]
impl Command for Export {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("export", "Set environment variables", "export NAME=VALUE...")
            .args(ArgRule::at_least(1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let mut report = Report::default();
        for arg in &ctx.args {
            let (name, value) = arg.split_once('=').unwrap_or((arg.as_str(), ""));
            if valid_name(name) {
                ctx.shell.set_var(name, value);
            } else {
                report.error(ctx.error(format!("'{arg}': not a valid identifier")));
            }
        }
        report.finish(ctx).await
    }
}

pub struct Unset;

#[async_trait]
impl Command for Unset {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("unset", "Remove environment variables", "unset NAME...")
            .args(ArgRule::at_least(1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        for name in &ctx.args {
            ctx.shell.unset_var(name);
        }
        CommandResult::ok()
    }
}

/// `env` and `set`: print the environment.
pub struct Env;

#[async_trait]
impl Command for Env {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("env", "Print the environment", "env").args(ArgRule::exact(0))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let lines: Vec<String> = sorted_pairs(ctx.shell.env_snapshot())
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        CommandResult::output(lines.join("\n"))
    }
}
