//! Job control.

use std::time::Duration;

use async_trait::async_trait;

use crate::command::{ArgRule, Command, CommandSpec};
use crate::context::ExecContext;
use crate::error::ShellError;
use crate::result::{CommandResult, MessageType};
use crate::utils::format_mtime;

pub struct Ps;

#[async_trait]
impl Command for Ps {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("ps", "List background jobs", "ps").args(ArgRule::exact(0))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let mut lines = vec![format!("{:<5} {:<12} COMMAND", "ID", "STARTED")];
        for job in ctx.shell.jobs().list() {
            lines.push(format!("{:<5} {:<12} {}", job.id, format_mtime(job.started), job.command));
        }
        CommandResult::output(lines.join("\n"))
    }
}

pub struct Kill;

#[async_trait]
impl Command for Kill {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("kill", "Cancel a background job", "kill ID").args(ArgRule::exact(1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let raw = &ctx.args[0];
        let Ok(id) = raw.trim_start_matches('%').parse::<u64>() else {
            return CommandResult::failure(ctx.error(format!("{raw}: invalid job id")));
        };
        if ctx.shell.jobs().kill(id) {
            CommandResult::message(format!("[{id}] Killed"), MessageType::Warning)
        } else {
            CommandResult::failure(ctx.error(format!("({id}) - No such job")))
        }
    }
}

pub struct Sleep;

#[async_trait]
impl Command for Sleep {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("sleep", "Wait for a number of seconds", "sleep SECONDS")
            .args(ArgRule::exact(1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let raw = &ctx.args[0];
        let duration = match raw.parse::<f64>().map(Duration::try_from_secs_f64) {
            Ok(Ok(duration)) => duration,
            _ => return CommandResult::failure(ctx.error(format!("invalid time interval '{raw}'"))),
        };
        tokio::select! {
            () = tokio::time::sleep(duration) => CommandResult::ok(),
            () = ctx.options.cancel.cancelled() => ShellError::Cancelled.into(),
        }
    }
}
