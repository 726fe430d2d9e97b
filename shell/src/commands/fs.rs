//! File system commands.

use async_trait::async_trait;
use chrono::Utc;
use vsh_core::{paths, CopyOptions, ResolveOptions};
use vsh_sdk::{format_mode, Access, FsError, NodeInfo, NodeKind};

use super::{load_accounts, Report};
use crate::command::{ArgRule, ArgSelector, Command, CommandSpec, FlagSpec, PermissionTarget};
use crate::context::ExecContext;
use crate::result::{CommandResult, MessageType};
use crate::utils::{format_mtime, parse_date, parse_touch_stamp};

pub struct Pwd;

#[async_trait]
impl Command for Pwd {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("pwd", "Print the working directory", "pwd").args(ArgRule::exact(0))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        CommandResult::output(ctx.cwd.clone())
    }
}

pub struct Cd;

#[async_trait]
impl Command for Cd {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("cd", "Change the working directory", "cd [DIR]")
            .args(ArgRule::between(0, 1))
            .path(
                ArgSelector::Index(0),
                ResolveOptions::default().expect(NodeKind::Directory),
            )
            .permission(ArgSelector::Index(0), Access::EXECUTE, PermissionTarget::Node)
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let target = match ctx.path(0) {
            Some(path) => path.to_string(),
            None => {
                let home = ctx.shell.get_var("HOME").unwrap_or_else(|| "/".to_string());
                let resolution = ctx.resolve(
                    &home,
                    ResolveOptions::default().expect(NodeKind::Directory),
                );
                if let Some(message) = resolution.message() {
                    return CommandResult::failure(message);
                }
                resolution.path
            }
        };
        ctx.shell.set_cwd(target);
        CommandResult::ok()
    }
}

pub struct Ls;

impl Ls {
    fn entry_line(info: &NodeInfo, long: bool) -> String {
        if !long {
            return info.name.clone();
        }
        format!(
            "{} {:<8} {:<8} {:>6} {} {}",
            format_mode(info.kind, info.mode),
            info.owner,
            info.group,
            info.size,
            format_mtime(info.mtime),
            info.name
        )
    }

    fn list(ctx: &ExecContext<'_>, path: &str, all: bool, long: bool) -> Result<Vec<String>, String> {
        let entries = ctx
            .vfs()
            .list_dir(path, &ctx.user)
            .map_err(|e| ctx.error(e))?;
        Ok(entries
            .iter()
            .filter(|e| all || !e.name.starts_with('.'))
            .map(|e| Self::entry_line(e, long))
            .collect())
    }
}

#[async_trait]
impl Command for Ls {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("ls", "List directory contents", "ls [-laR] [PATH]...")
            .flag(FlagSpec::new("long", 'l', "Use a long listing format"))
            .flag(FlagSpec::new("all", 'a', "Include entries starting with ."))
            .flag(FlagSpec::new("recursive", 'R', "List subdirectories recursively"))
            .path(ArgSelector::ALL, ResolveOptions::default())
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let long = ctx.flag("long");
        let all = ctx.flag("all");
        let recursive = ctx.flag("recursive");

        let targets: Vec<(String, NodeInfo)> = if ctx.args.is_empty() {
            match ctx.vfs().stat(&ctx.cwd, &ctx.user) {
                Ok(info) => vec![(".".to_string(), info)],
                Err(e) => return CommandResult::failure(ctx.error(e)),
            }
        } else {
            ctx.resolved
                .iter()
                .zip(&ctx.args)
                .filter_map(|(r, raw)| Some((raw.clone(), r.as_ref()?.node.clone()?)))
                .collect()
        };

        let (files, dirs): (Vec<_>, Vec<_>) = targets.into_iter().partition(|(_, i)| i.is_file());
        let mut report = Report::default();
        for (_, info) in &files {
            report.line(Self::entry_line(info, long));
        }

        let headers = recursive || files.len() + dirs.len() > 1;
        let mut first = files.is_empty();
        for (raw, info) in dirs {
            let mut queue = vec![(raw, info.path)];
            while let Some((shown, path)) = queue.pop() {
                if headers {
                    if !first {
                        report.line("");
                    }
                    report.line(format!("{shown}:"));
                }
                first = false;
                match Self::list(ctx, &path, all, long) {
                    Ok(lines) => lines.into_iter().for_each(|l| report.line(l)),
                    Err(e) => report.error(e),
                }
                if recursive {
                    let Ok(children) = ctx.vfs().list_dir(&path, &ctx.user) else {
                        continue;
                    };
                    let mut subdirs: Vec<(String, String)> = children
                        .into_iter()
                        .filter(|c| c.is_dir() && (all || !c.name.starts_with('.')))
                        .map(|c| (paths::join(&shown, &c.name), c.path))
                        .collect();
                    subdirs.reverse();
                    queue.extend(subdirs);
                }
            }
        }

        // An empty directory still produces (empty) output
        if report.is_empty() {
            return CommandResult::output("");
        }
        report.finish(ctx).await
    }
}

pub struct Mkdir;

#[async_trait]
impl Command for Mkdir {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("mkdir", "Create directories", "mkdir [-p] DIR...")
            .flag(FlagSpec::new("parents", 'p', "Create parents as needed; no error if existing"))
            .args(ArgRule::at_least(1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let parents = ctx.flag("parents");
        let mut report = Report::default();
        let mut existing = Vec::new();

        for raw in &ctx.args {
            let path = match paths::normalize(&ctx.cwd, raw) {
                Ok(path) => path,
                Err(e) => {
                    report.error(ctx.error(e));
                    continue;
                }
            };
            match ctx.vfs().create_directory(&path, &ctx.user, parents) {
                Ok(true) => report.changed(),
                Ok(false) => existing.push(format!("mkdir: '{raw}' already exists")),
                Err(FsError::NotFound(_)) => {
                    report.error(ctx.error(format!(
                        "cannot create directory '{raw}': No such file or directory"
                    )));
                }
                Err(FsError::AlreadyExists(_)) => {
                    report.error(ctx.error(format!(
                        "cannot create directory '{raw}': File exists"
                    )));
                }
                Err(e) => report.error(ctx.error(e)),
            }
        }

        let result = report.finish(ctx).await;
        if result.success && !existing.is_empty() {
            let notice = CommandResult::message(existing.join("\n"), MessageType::Info);
            // Keep a save warning if there is one
            return match result.error {
                Some(_) => CommandResult {
                    output: notice.output,
                    ..result
                },
                None => notice,
            };
        }
        result
    }
}

pub struct Touch;

#[async_trait]
impl Command for Touch {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new(
            "touch",
            "Create files or update their timestamps",
            "touch [-c] [-d DATE | -t STAMP] FILE...",
        )
        .flag(FlagSpec::new("no-create", 'c', "Do not create missing files"))
        .flag(FlagSpec::new("date", 'd', "Use DATE instead of now").value())
        .flag(FlagSpec::new("stamp", 't', "Use [[CC]YY]MMDDhhmm[.ss] instead of now").value())
        .args(ArgRule::at_least(1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let when = match (ctx.flag_value("date"), ctx.flag_value("stamp")) {
            (Some(_), Some(_)) => {
                return CommandResult::failure(ctx.error("cannot specify times from more than one source"))
            }
            (Some(date), None) => match parse_date(date) {
                Some(when) => when,
                None => return CommandResult::failure(ctx.error(format!("invalid date format '{date}'"))),
            },
            (None, Some(stamp)) => match parse_touch_stamp(stamp) {
                Some(when) => when,
                None => return CommandResult::failure(ctx.error(format!("invalid date format '{stamp}'"))),
            },
            (None, None) => Utc::now(),
        };
        let no_create = ctx.flag("no-create");

        let mut report = Report::default();
        for raw in &ctx.args {
            let resolution = ctx.resolve(raw, ResolveOptions::default().allow_missing());
            if let Some(message) = resolution.message() {
                report.error(message);
                continue;
            }
            if resolution.node.is_none() {
                if no_create {
                    continue;
                }
                if let Err(e) = ctx.vfs().create_file(&resolution.path, "", &ctx.user) {
                    report.error(ctx.error(e));
                    continue;
                }
            }
            match ctx.vfs().set_mtime(&resolution.path, when, &ctx.user) {
                Ok(()) => report.changed(),
                Err(e) => report.error(ctx.error(e)),
            }
        }
        report.finish(ctx).await
    }
}

pub struct Cat;

#[async_trait]
impl Command for Cat {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("cat", "Concatenate and print files", "cat [FILE]...")
            .readable_files(ArgSelector::ALL)
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        if ctx.args.is_empty() {
            return CommandResult::output(ctx.stdin.take().unwrap_or_default());
        }
        let mut out = String::new();
        for index in 0..ctx.args.len() {
            let Some(path) = ctx.path(index) else {
                continue;
            };
            match ctx.vfs().read_file(path, &ctx.user) {
                Ok(content) => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str(&content);
                }
                Err(e) => return CommandResult::failure(ctx.error(e)),
            }
        }
        CommandResult::output(out)
    }
}

pub struct Rm;

#[async_trait]
impl Command for Rm {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("rm", "Remove files or directories", "rm [-rf] PATH...")
            .flag(FlagSpec::new("recursive", 'r', "Remove directories and their contents").long("recursive"))
            .flag(FlagSpec::new("force", 'f', "Ignore missing files, never prompt").long("force"))
            .args(ArgRule::at_least(1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let recursive = ctx.flag("recursive");
        let force = ctx.flag("force");
        let mut report = Report::default();

        for raw in ctx.args.clone() {
            let resolution = ctx.resolve(&raw, ResolveOptions::default().disallow_root());
            let info = match (&resolution.node, &resolution.error) {
                (Some(info), None) => info.clone(),
                (_, Some(FsError::NotFound(_))) if force => continue,
                _ => {
                    report.error(resolution.message().unwrap_or_else(|| ctx.error("invalid path")));
                    continue;
                }
            };

            if info.is_dir() {
                if !recursive {
                    report.error(ctx.error(FsError::is_directory(&raw)));
                    continue;
                }
                if !force {
                    let prompt = format!("rm: remove directory '{raw}' and its contents?");
                    if !ctx.options.interactive {
                        report.error(ctx.error(format!("{raw}: confirmation required (use -f)")));
                        continue;
                    }
                    if !ctx.confirm(&prompt).await {
                        continue;
                    }
                }
            }

            let outcome = ctx.vfs().delete(&info.path, &ctx.user, recursive);
            if outcome.changed() {
                report.changed();
            }
            for message in outcome.error_messages() {
                report.error(ctx.error(message));
            }
        }
        report.finish(ctx).await
    }
}

/// Destination of `src` for `mv`/`cp` and whether something is already
/// there.
fn landing(ctx: &ExecContext<'_>, src: &str, dst: &str) -> (String, bool) {
    let target = match ctx.vfs().stat(dst, &ctx.user) {
        Ok(info) if info.is_dir() => paths::join(dst, paths::file_name(src)),
        _ => dst.to_string(),
    };
    let exists = ctx.vfs().stat(&target, &ctx.user).is_ok();
    (target, exists)
}

/// Sources and destination for `mv`/`cp`; several sources need a
/// directory destination.
fn operands(ctx: &ExecContext<'_>) -> Result<(Vec<(String, String)>, String), CommandResult> {
    let last = ctx.args.len() - 1;
    let dst = ctx.path(last).unwrap_or_default().to_string();
    let dst_is_dir = ctx
        .resolution(last)
        .and_then(|r| r.node.as_ref())
        .is_some_and(NodeInfo::is_dir);
    if last > 1 && !dst_is_dir {
        return Err(CommandResult::failure(
            ctx.error(format!("target '{}' is not a directory", ctx.args[last])),
        ));
    }
    let sources = (0..last)
        .filter_map(|i| Some((ctx.args[i].clone(), ctx.path(i)?.to_string())))
        .collect();
    Ok((sources, dst))
}

pub struct Mv;

#[async_trait]
impl Command for Mv {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("mv", "Move or rename files", "mv [-f | -i] SOURCE... DEST")
            .flag(FlagSpec::new("force", 'f', "Overwrite without asking"))
            .flag(FlagSpec::new("interactive", 'i', "Ask before overwriting"))
            .args(ArgRule::at_least(2))
            .path(ArgSelector::AllButLast, ResolveOptions::default().disallow_root())
            .path(ArgSelector::Last, ResolveOptions::default().allow_missing())
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let (sources, dst) = match operands(ctx) {
            Ok(operands) => operands,
            Err(result) => return result,
        };
        let ask = ctx.flag("interactive") && !ctx.flag("force");

        let mut report = Report::default();
        for (raw, src) in sources {
            let (target, exists) = landing(ctx, &src, &dst);
            if ask && exists && !ctx.confirm(&format!("mv: overwrite '{target}'?")).await {
                continue;
            }
            let outcome = ctx.vfs().move_node(&src, &dst, &ctx.user, true);
            if outcome.changed() {
                report.changed();
            }
            for message in outcome.error_messages() {
                report.error(ctx.error(format!("cannot move '{raw}': {message}")));
            }
        }
        report.finish(ctx).await
    }
}

pub struct Cp;

#[async_trait]
impl Command for Cp {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("cp", "Copy files and directories", "cp [-r] [-f | -i] [-p] SOURCE... DEST")
            .flag(FlagSpec::new("recursive", 'r', "Copy directories recursively").long("recursive"))
            .flag(FlagSpec::new("force", 'f', "Overwrite without asking"))
            .flag(FlagSpec::new("interactive", 'i', "Ask before overwriting"))
            .flag(FlagSpec::new("preserve", 'p', "Keep mode and timestamps"))
            .args(ArgRule::at_least(2))
            .path(ArgSelector::AllButLast, ResolveOptions::default())
            .path(ArgSelector::Last, ResolveOptions::default().allow_missing())
            .permission(ArgSelector::AllButLast, Access::READ, PermissionTarget::Node)
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let (sources, dst) = match operands(ctx) {
            Ok(operands) => operands,
            Err(result) => return result,
        };
        let ask = ctx.flag("interactive") && !ctx.flag("force");
        let options = CopyOptions {
            recursive: ctx.flag("recursive"),
            preserve: ctx.flag("preserve"),
            overwrite: true,
        };

        let mut report = Report::default();
        for (raw, src) in sources {
            let (target, exists) = landing(ctx, &src, &dst);
            if ask && exists && !ctx.confirm(&format!("cp: overwrite '{target}'?")).await {
                continue;
            }
            let outcome = ctx.vfs().copy(&src, &dst, &ctx.user, options);
            if outcome.changed() {
                report.changed();
            }
            for message in outcome.error_messages() {
                report.error(ctx.error(format!("cannot copy '{raw}': {message}")));
            }
        }
        report.finish(ctx).await
    }
}

pub struct Chmod;

#[async_trait]
impl Command for Chmod {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("chmod", "Change file mode bits", "chmod OCTAL-MODE PATH...")
            .args(ArgRule::at_least(2).with_message("usage: chmod OCTAL-MODE PATH..."))
            .path(ArgSelector::From(1), ResolveOptions::default())
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let raw_mode = ctx.args[0].clone();
        let mode = match u32::from_str_radix(&raw_mode, 8) {
            Ok(mode) if mode <= 0o777 => mode,
            _ => return CommandResult::failure(ctx.error(format!("invalid mode: '{raw_mode}'"))),
        };

        let mut report = Report::default();
        for index in 1..ctx.args.len() {
            let Some(path) = ctx.path(index) else {
                continue;
            };
            match ctx.vfs().chmod(path, mode, &ctx.user) {
                Ok(()) => report.changed(),
                Err(e) => report.error(ctx.error(format!(
                    "changing permissions of '{}': {e}",
                    ctx.args[index]
                ))),
            }
        }
        report.finish(ctx).await
    }
}

pub struct Chown;

#[async_trait]
impl Command for Chown {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("chown", "Change file owner and group", "chown OWNER[:GROUP] PATH...")
            .args(ArgRule::at_least(2).with_message("usage: chown OWNER[:GROUP] PATH..."))
            .path(ArgSelector::From(1), ResolveOptions::default())
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let spec = ctx.args[0].clone();
        let (owner, group) = match spec.split_once(':') {
            Some((owner, group)) => (owner.to_string(), Some(group.to_string()).filter(|g| !g.is_empty())),
            None => (spec.clone(), None),
        };
        let accounts = match load_accounts(ctx) {
            Ok(accounts) => accounts,
            Err(result) => return result,
        };
        if accounts.user(&owner).is_none() {
            return CommandResult::failure(ctx.error(format!("invalid user: '{owner}'")));
        }
        if let Some(group) = &group {
            if !accounts.group_exists(group) {
                return CommandResult::failure(ctx.error(format!("invalid group: '{group}'")));
            }
        }

        let mut report = Report::default();
        for index in 1..ctx.args.len() {
            let Some(path) = ctx.path(index) else {
                continue;
            };
            let changed = ctx.vfs().chown(path, &owner, &ctx.user).and_then(|()| match &group {
                Some(group) => ctx.vfs().chgrp(path, group, &ctx.user),
                None => Ok(()),
            });
            match changed {
                Ok(()) => report.changed(),
                Err(e) => report.error(ctx.error(format!(
                    "changing ownership of '{}': {e}",
                    ctx.args[index]
                ))),
            }
        }
        report.finish(ctx).await
    }
}

pub struct Chgrp;

#[async_trait]
impl Command for Chgrp {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("chgrp", "Change group ownership", "chgrp GROUP PATH...")
            .args(ArgRule::at_least(2).with_message("usage: chgrp GROUP PATH..."))
            .path(ArgSelector::From(1), ResolveOptions::default())
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let group = ctx.args[0].clone();
        let accounts = match load_accounts(ctx) {
            Ok(accounts) => accounts,
            Err(result) => return result,
        };
        if !accounts.group_exists(&group) {
            return CommandResult::failure(ctx.error(format!("invalid group: '{group}'")));
        }

        let mut report = Report::default();
        for index in 1..ctx.args.len() {
            let Some(path) = ctx.path(index) else {
                continue;
            };
            match ctx.vfs().chgrp(path, &group, &ctx.user) {
                Ok(()) => report.changed(),
                Err(e) => report.error(ctx.error(format!(
                    "changing group of '{}': {e}",
                    ctx.args[index]
                ))),
            }
        }
        report.finish(ctx).await
    }
}
