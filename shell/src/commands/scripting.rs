//! `run` and the `check_fail` wrapper scripts use to expect errors.

use async_trait::async_trait;
use vsh_core::ResolveOptions;
use vsh_sdk::{Access, NodeKind};

use crate::ast::quote_word;
use crate::command::{ArgRule, ArgSelector, Command, CommandSpec, FlagSpec, PermissionTarget};
use crate::context::ExecContext;
use crate::result::CommandResult;

pub struct Run;

#[async_trait]
impl Command for Run {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("run", "Execute a script file", "run SCRIPT [ARG]...")
            .args(ArgRule::at_least(1).with_message("missing script operand"))
            .path(ArgSelector::Index(0), ResolveOptions::default().expect(NodeKind::File))
            .permission(ArgSelector::Index(0), Access::READ_EXECUTE, PermissionTarget::Node)
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let Some(path) = ctx.path(0).map(str::to_string) else {
            return CommandResult::failure(ctx.error("missing script operand"));
        };
        let text = match ctx.vfs().read_file(&path, &ctx.user) {
            Ok(text) => text,
            Err(e) => return CommandResult::failure(ctx.error(e)),
        };
        ctx.shell
            .run_script(&ctx.args[0], &text, &ctx.args[1..], ctx.options)
            .await
    }
}

/// Succeeds when the wrapped command fails.
pub struct CheckFail;

#[async_trait]
impl Command for CheckFail {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "check_fail",
            "Run a command that is expected to fail",
            "check_fail [-z] COMMAND [ARG]...",
        )
        .flag(FlagSpec::new("empty", 'z', "Also accept success with empty output"))
        .args(ArgRule::at_least(1).with_message("missing command"))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        // A single argument is a whole command line
        let line = if ctx.args.len() == 1 {
            ctx.args[0].clone()
        } else {
            ctx.args
                .iter()
                .map(|arg| quote_word(arg))
                .collect::<Vec<_>>()
                .join(" ")
        };
        let result = ctx.shell.execute_line(&line, ctx.options).await;
        if !result.success {
            tracing::debug!(%line, error = ?result.error, "expected failure");
            return CommandResult::ok();
        }
        if ctx.flag("empty") && result.text().trim().is_empty() {
            return CommandResult::ok();
        }
        CommandResult::failure(ctx.error(format!("command succeeded unexpectedly: {line}")))
    }
}
