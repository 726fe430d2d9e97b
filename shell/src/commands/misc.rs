//! help, history, date and clear.

use std::fmt::Write;

use async_trait::async_trait;
use chrono::Local;

use crate::command::{ArgRule, Command, CommandSpec};
use crate::context::ExecContext;
use crate::error::ShellError;
use crate::help::{format_help, format_help_list};
use crate::result::CommandResult;

pub struct Help;

#[async_trait]
impl Command for Help {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("help", "Show available commands", "help [COMMAND]")
            .args(ArgRule::between(0, 1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let registry = ctx.shell.registry();
        match ctx.arg(0) {
            None => CommandResult::output(format_help_list(registry)),
            Some(name) => match registry.get(name) {
                Some(command) => CommandResult::output(format_help(&command.spec())),
                None => ShellError::CommandNotFound(name.to_string()).into(),
            },
        }
    }
}

pub struct History;

#[async_trait]
impl Command for History {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("history", "Show command history", "history").args(ArgRule::exact(0))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let lines: Vec<String> = ctx
            .shell
            .history()
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{:>5}  {line}", i + 1))
            .collect();
        CommandResult::output(lines.join("\n"))
    }
}

pub struct Date;

#[async_trait]
impl Command for Date {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("date", "Print the current date and time", "date [+FORMAT]")
            .args(ArgRule::between(0, 1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let format = match ctx.arg(0) {
            None => "%a %b %e %H:%M:%S %Z %Y",
            Some(arg) => match arg.strip_prefix('+') {
                Some(format) => format,
                None => return CommandResult::failure(ctx.error(format!("invalid date '{arg}'"))),
            },
        };
        let mut out = String::new();
        if write!(out, "{}", Local::now().format(format)).is_err() {
            return CommandResult::failure(ctx.error(format!("invalid format '{format}'")));
        }
        CommandResult::output(out)
    }
}

pub struct Clear;

#[async_trait]
impl Command for Clear {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("clear", "Clear the screen", "clear").args(ArgRule::exact(0))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        if !ctx.options.background {
            ctx.shell.presenter().clear().await;
        }
        CommandResult::ok()
    }
}
