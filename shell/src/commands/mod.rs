//! Builtin commands.

use std::sync::Arc;

use vsh_core::Accounts;

use crate::command::Command;
use crate::context::ExecContext;
use crate::registry::CommandRegistry;
use crate::result::CommandResult;

mod env;
mod find;
mod fs;
mod jobs;
mod misc;
mod scripting;
mod text;
mod users;

macro_rules! builtins {
    ($registry:expr, { $($name:literal => $ty:path),* $(,)? }) => {
        $( $registry.register($name, || Arc::new($ty) as Arc<dyn Command>); )*
    };
}

pub fn register_builtins(registry: &mut CommandRegistry) {
    builtins!(registry, {
        "alias" => env::Alias,
        "cat" => fs::Cat,
        "cd" => fs::Cd,
        "check_fail" => scripting::CheckFail,
        "chgrp" => fs::Chgrp,
        "chmod" => fs::Chmod,
        "chown" => fs::Chown,
        "clear" => misc::Clear,
        "cp" => fs::Cp,
        "date" => misc::Date,
        "echo" => text::Echo,
        "env" => env::Env,
        "export" => env::Export,
        "find" => find::Find,
        "grep" => text::Grep,
        "groupadd" => users::GroupAdd,
        "groups" => users::Groups,
        "head" => text::Head,
        "help" => misc::Help,
        "history" => misc::History,
        "kill" => jobs::Kill,
        "ls" => fs::Ls,
        "mkdir" => fs::Mkdir,
        "mv" => fs::Mv,
        "passwd" => users::Passwd,
        "ps" => jobs::Ps,
        "pwd" => fs::Pwd,
        "rm" => fs::Rm,
        "run" => scripting::Run,
        "set" => env::Env,
        "sleep" => jobs::Sleep,
        "sort" => text::Sort,
        "su" => users::Su,
        "tail" => text::Tail,
        "touch" => fs::Touch,
        "unalias" => env::Unalias,
        "uniq" => text::Uniq,
        "unset" => env::Unset,
        "useradd" => users::UserAdd,
        "usermod" => users::UserMod,
        "wc" => text::Wc,
        "whoami" => users::Whoami,
    });
}

/// Per-argument outcome of a command that works through several operands.
#[derive(Default)]
pub(crate) struct Report {
    lines: Vec<String>,
    errors: Vec<String>,
    changed: bool,
}

impl Report {
    pub(crate) fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub(crate) fn error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub(crate) fn changed(&mut self) {
        self.changed = true;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.errors.is_empty()
    }

    /// Save when anything changed, then fold into a result. Any error
    /// fails the command.
    pub(crate) async fn finish(self, ctx: &ExecContext<'_>) -> CommandResult {
        let saved = if self.changed {
            ctx.shell.persist().await
        } else {
            Ok(())
        };
        let result = if !self.errors.is_empty() {
            CommandResult::failure(self.errors.join("\n"))
        } else if self.lines.is_empty() {
            CommandResult::ok()
        } else {
            CommandResult::output(self.lines.join("\n"))
        };
        result.with_persistence(saved)
    }
}

pub(crate) fn load_accounts(ctx: &ExecContext<'_>) -> Result<Accounts, CommandResult> {
    Accounts::load(ctx.vfs()).map_err(|e| CommandResult::failure(ctx.error(e)))
}

/// A path found under `start` as the user typed it: `raw` followed by the
/// rest of the path.
pub(crate) fn display_path(raw: &str, start: &str, path: &str) -> String {
    if path == start {
        return raw.to_string();
    }
    let suffix = if start == "/" { path } else { &path[start.len()..] };
    format!("{}{suffix}", raw.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_paths() {
        assert_eq!(display_path(".", "/home/guest", "/home/guest"), ".");
        assert_eq!(display_path(".", "/home/guest", "/home/guest/a/b"), "./a/b");
        assert_eq!(display_path("/", "/", "/etc"), "/etc");
        assert_eq!(display_path("docs/", "/home/guest/docs", "/home/guest/docs/x"), "docs/x");
    }
}
