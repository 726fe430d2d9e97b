//! Account management. Records live in `/etc/passwd`, `/etc/group` and
//! `/etc/shadow` inside the tree, so changes persist with it.

use async_trait::async_trait;
use vsh_core::{create_home, Accounts};
use vsh_sdk::SUPERUSER;

use super::load_accounts;
use crate::command::{ArgRule, Command, CommandSpec, FlagSpec};
use crate::context::ExecContext;
use crate::error::ShellError;
use crate::result::{CommandResult, MessageType};

fn require_superuser(ctx: &ExecContext<'_>) -> Result<(), CommandResult> {
    if ctx.user.is_superuser() {
        Ok(())
    } else {
        Err(ShellError::Permission(ctx.error("Permission denied")).into())
    }
}

/// Write the account files, save the tree and pick up group changes for
/// the current session. `done` is returned with any save warning attached.
async fn commit(
    ctx: &ExecContext<'_>,
    accounts: &Accounts,
    done: CommandResult,
) -> CommandResult {
    if let Err(e) = accounts.persist(ctx.vfs()) {
        return CommandResult::failure(ctx.error(e));
    }
    let saved = ctx.shell.persist().await;
    ctx.shell.refresh_identity();
    done.with_persistence(saved)
}

pub struct UserAdd;

#[async_trait]
impl Command for UserAdd {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("useradd", "Create a user account", "useradd NAME").args(ArgRule::exact(1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        if let Err(result) = require_superuser(ctx) {
            return result;
        }
        let name = ctx.args[0].clone();
        let mut accounts = match load_accounts(ctx) {
            Ok(accounts) => accounts,
            Err(result) => return result,
        };
        if accounts.user(&name).is_some() {
            return CommandResult::failure(ctx.error(format!("user '{name}' already exists")));
        }

        let password = ctx
            .request_input(&format!("Password for {name}: "), true)
            .await
            .filter(|p| !p.is_empty());
        let record = match accounts.add_user(&name, password.as_deref()) {
            Ok(record) => record,
            Err(e) => return CommandResult::failure(ctx.error(e)),
        };
        if let Err(e) = create_home(ctx.vfs(), &record) {
            return CommandResult::failure(ctx.error(e));
        }
        let created =
            CommandResult::message(format!("user '{name}' created"), MessageType::Success);
        let result = commit(ctx, &accounts, created).await;
        if result.success {
            tracing::info!(user = %name, home = %record.home, "user created");
        }
        result
    }
}

pub struct GroupAdd;

#[async_trait]
impl Command for GroupAdd {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("groupadd", "Create a group", "groupadd NAME").args(ArgRule::exact(1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        if let Err(result) = require_superuser(ctx) {
            return result;
        }
        let mut accounts = match load_accounts(ctx) {
            Ok(accounts) => accounts,
            Err(result) => return result,
        };
        if let Err(e) = accounts.add_group(&ctx.args[0]) {
            return CommandResult::failure(ctx.error(e));
        }
        commit(ctx, &accounts, CommandResult::ok()).await
    }
}

pub struct UserMod;

#[async_trait]
impl Command for UserMod {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("usermod", "Add a user to groups", "usermod -aG GROUP[,GROUP]... USER")
            .flag(FlagSpec::new("append", 'a', "Append to the supplementary groups"))
            .flag(FlagSpec::new("groups", 'G', "Groups to add").value())
            .args(ArgRule::exact(1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        if let Err(result) = require_superuser(ctx) {
            return result;
        }
        let Some(groups) = ctx.flag_value("groups").map(str::to_string) else {
            return ShellError::Validation(ctx.error("no changes requested (use -aG GROUP)")).into();
        };
        if !ctx.flag("append") {
            return ShellError::Validation(ctx.error("only -aG is supported")).into();
        }
        let user = ctx.args[0].clone();
        let mut accounts = match load_accounts(ctx) {
            Ok(accounts) => accounts,
            Err(result) => return result,
        };
        for group in groups.split(',').filter(|g| !g.is_empty()) {
            if let Err(e) = accounts.add_to_group(&user, group) {
                return CommandResult::failure(ctx.error(e));
            }
        }
        commit(ctx, &accounts, CommandResult::ok()).await
    }
}

pub struct Passwd;

#[async_trait]
impl Command for Passwd {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("passwd", "Change a password", "passwd [USER]").args(ArgRule::between(0, 1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let user = ctx.arg(0).map_or_else(|| ctx.user.name.clone(), str::to_string);
        if user != ctx.user.name && !ctx.user.is_superuser() {
            return ShellError::Permission(ctx.error(format!(
                "You may not view or modify password information for {user}"
            )))
            .into();
        }
        let mut accounts = match load_accounts(ctx) {
            Ok(accounts) => accounts,
            Err(result) => return result,
        };
        if accounts.user(&user).is_none() {
            return CommandResult::failure(ctx.error(format!("user '{user}' does not exist")));
        }

        let Some(first) = ctx.request_input("New password: ", true).await else {
            return CommandResult::failure(ctx.error("Authentication token manipulation error"));
        };
        let second = ctx.request_input("Retype new password: ", true).await;
        if second.as_deref() != Some(first.as_str()) {
            return CommandResult::failure(ctx.error("passwords do not match"));
        }
        if first.is_empty() {
            return CommandResult::failure(ctx.error("password unchanged"));
        }

        if let Err(e) = accounts.set_password(&user, Some(&first)) {
            return CommandResult::failure(ctx.error(e));
        }
        let updated =
            CommandResult::message("password updated successfully", MessageType::Success);
        commit(ctx, &accounts, updated).await
    }
}

pub struct Su;

#[async_trait]
impl Command for Su {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("su", "Switch user", "su [USER]").args(ArgRule::between(0, 1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let target = ctx.arg(0).unwrap_or(SUPERUSER).to_string();
        let accounts = match load_accounts(ctx) {
            Ok(accounts) => accounts,
            Err(result) => return result,
        };
        let (Some(record), Some(identity)) = (accounts.user(&target), accounts.identity(&target))
        else {
            return CommandResult::failure(ctx.error(format!("user {target} does not exist")));
        };

        if !ctx.user.is_superuser() && accounts.has_password(&target) {
            let password = ctx.request_input("Password: ", true).await.unwrap_or_default();
            if !accounts.verify_password(&target, &password) {
                tracing::warn!(user = %target, "failed su attempt");
                return ShellError::Permission(ctx.error("Authentication failure")).into();
            }
        }

        let home = if ctx.vfs().stat(&record.home, &identity).is_ok() {
            record.home.clone()
        } else {
            "/".to_string()
        };
        ctx.shell.switch_user(identity, &home);
        CommandResult::ok()
    }
}

pub struct Whoami;

#[async_trait]
impl Command for Whoami {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("whoami", "Print the current user", "whoami").args(ArgRule::exact(0))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        CommandResult::output(ctx.user.name.clone())
    }
}

pub struct Groups;

#[async_trait]
impl Command for Groups {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("groups", "Print group memberships", "groups [USER]")
            .args(ArgRule::between(0, 1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let Some(user) = ctx.arg(0) else {
            return CommandResult::output(ctx.user.groups.join(" "));
        };
        let accounts = match load_accounts(ctx) {
            Ok(accounts) => accounts,
            Err(result) => return result,
        };
        if accounts.user(user).is_none() {
            return CommandResult::failure(ctx.error(format!("'{user}': no such user")));
        }
        CommandResult::output(format!("{user} : {}", accounts.groups_of(user).join(" ")))
    }
}
