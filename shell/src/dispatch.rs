//! Checks every command goes through before its own logic runs.

use vsh_core::{has_permission, paths};
use vsh_sdk::FsError;

use crate::ast::CommandSegment;
use crate::command::{CommandSpec, PermissionTarget};
use crate::context::{ExecContext, ExecOptions};
use crate::error::ShellError;
use crate::help;
use crate::result::CommandResult;
use crate::shell::Shell;

impl Shell {
    /// Run one command segment: parse flags, validate the argument count,
    /// resolve declared paths, check declared permissions, then run.
    pub(crate) async fn dispatch(
        &self,
        segment: &CommandSegment,
        stdin: Option<String>,
        options: &ExecOptions,
    ) -> CommandResult {
        let name = segment.name.as_str();
        let Some(command) = self.registry().get(name) else {
            return ShellError::CommandNotFound(name.to_string()).into();
        };
        let spec = command.spec();

        if help::wants_help(&segment.args) {
            return CommandResult::output(help::format_help(&spec));
        }

        let (flags, args) = match spec.parse_flags(&segment.args) {
            Ok(parsed) => parsed,
            Err(msg) => return validation(name, msg),
        };
        if let Some(msg) = spec.args.check(args.len()) {
            return validation(name, msg);
        }

        let (user, cwd) = self.session();
        let resolved = match self.resolve_args(&spec, &args, &cwd, &user) {
            Ok(resolved) => resolved,
            Err(result) => return result,
        };

        let mut ctx = ExecContext {
            shell: self,
            options,
            name: name.to_string(),
            args,
            flags,
            user,
            cwd,
            resolved,
            stdin,
        };
        if let Err(result) = check_permissions(&spec, &ctx) {
            return result;
        }

        tracing::debug!(command = name, args = ?ctx.args, "dispatching");
        command.run(&mut ctx).await
    }

    fn resolve_args(
        &self,
        spec: &CommandSpec,
        args: &[String],
        cwd: &str,
        user: &vsh_sdk::Identity,
    ) -> Result<Vec<Option<vsh_core::Resolution>>, CommandResult> {
        let mut resolved = vec![None; args.len()];
        for rule in &spec.paths {
            for index in rule.args.indices(args.len()) {
                let resolution = self
                    .vfs()
                    .resolve_path(spec.name, &args[index], cwd, user, rule.options);
                if let Some(message) = resolution.message() {
                    let err = resolution
                        .error
                        .clone()
                        .unwrap_or_else(|| FsError::internal("unresolved path"));
                    return Err(CommandResult::failure(categorize(err, message)));
                }
                resolved[index] = Some(resolution);
            }
        }
        Ok(resolved)
    }
}

fn validation(name: &str, msg: String) -> CommandResult {
    ShellError::Validation(format!("{name}: {msg}")).into()
}

/// Keep the error's category while using the command-prefixed text.
fn categorize(err: FsError, message: String) -> String {
    match ShellError::from(err) {
        ShellError::Permission(_) => ShellError::Permission(message),
        ShellError::Validation(_) => ShellError::Validation(message),
        _ => ShellError::PathResolution(message),
    }
    .to_string()
}

fn check_permissions(spec: &CommandSpec, ctx: &ExecContext<'_>) -> Result<(), CommandResult> {
    for rule in &spec.permissions {
        for index in rule.args.indices(ctx.args.len()) {
            // Unresolved paths were not required to exist
            let Some(resolution) = ctx.resolution(index) else {
                continue;
            };
            let target = match (rule.target, &resolution.node) {
                (PermissionTarget::Node, Some(node)) => Some(node.clone()),
                (PermissionTarget::Node, None) => None,
                (PermissionTarget::NodeOrParent, Some(node)) => Some(node.clone()),
                (PermissionTarget::Parent | PermissionTarget::NodeOrParent, _) => {
                    let parent = paths::parent(&resolution.path).unwrap_or("/");
                    ctx.vfs().stat(parent, &ctx.user).ok()
                }
            };
            let Some(target) = target else {
                continue;
            };
            if !has_permission(&target, &ctx.user, rule.access) {
                tracing::debug!(
                    command = spec.name,
                    path = %target.path,
                    access = %rule.access.label(),
                    "permission denied"
                );
                let err = FsError::permission_denied(&ctx.args[index]);
                return Err(ShellError::Permission(ctx.error(err)).into());
            }
        }
    }
    Ok(())
}
