//! Line and pipeline execution.

use vsh_core::{has_permission, paths, ResolveOptions, WriteMode};
use vsh_sdk::{Access, FsError, NodeKind};

use crate::ast::{Operator, Pipeline, RedirectMode, Redirection};
use crate::context::ExecOptions;
use crate::error::ShellError;
use crate::result::{CommandResult, MessageType};
use crate::shell::Shell;
use crate::{expansion, glob, parser};

impl Shell {
    /// Expand and run one command line.
    ///
    /// Results of all but the last pipeline are presented as they finish;
    /// the last one is returned for the caller to present.
    pub async fn execute_line(&self, line: &str, options: &ExecOptions) -> CommandResult {
        if line.trim().is_empty() {
            return CommandResult::ok();
        }

        let expanded = match self.expand(line) {
            Ok(expanded) => expanded,
            Err(e) => return e.into(),
        };
        let groups = match parser::parse(&expanded) {
            Ok(groups) => groups,
            Err(e) => return e.into(),
        };

        let mut last: Option<CommandResult> = None;
        let mut last_success = true;
        let mut previous = Operator::End;
        for (pipeline, operator) in groups {
            if options.is_cancelled() {
                self.flush(last.take(), options);
                return ShellError::Cancelled.into();
            }
            let skip = match previous {
                Operator::And => !last_success,
                Operator::Or => last_success,
                _ => false,
            };
            previous = operator;
            if skip {
                tracing::debug!(pipeline = %pipeline, "skipped");
                continue;
            }

            let result = if pipeline.background {
                self.spawn_job(pipeline, options)
            } else {
                self.run_pipeline(&pipeline, options).await
            };
            last_success = result.success;
            self.flush(last.replace(result), options);
        }
        last.unwrap_or_else(CommandResult::ok)
    }

    fn flush(&self, result: Option<CommandResult>, options: &ExecOptions) {
        if let Some(result) = result {
            if !options.background {
                self.present(&result);
            }
        }
    }

    /// Environment, then aliases, then globs.
    pub fn expand(&self, line: &str) -> Result<String, ShellError> {
        let line = expansion::substitute_env(line, &self.env_snapshot());
        let line = expansion::expand_aliases(
            &line,
            &self.aliases_snapshot(),
            self.config().limits.alias_depth,
        )?;
        let (user, cwd) = self.session();
        Ok(glob::expand_line(&line, self.vfs(), &cwd, &user))
    }

    /// Run the segments of one pipeline, feeding each one's output to the
    /// next, and apply its redirections.
    pub async fn run_pipeline(&self, pipeline: &Pipeline, options: &ExecOptions) -> CommandResult {
        let mut stdin = match &pipeline.input {
            Some(path) => match self.read_input(path) {
                Ok(content) => Some(content),
                Err(result) => return result,
            },
            None => None,
        };

        let multi = pipeline.segments.len() > 1;
        let mut result = CommandResult::ok();
        for segment in &pipeline.segments {
            if options.is_cancelled() {
                return ShellError::Cancelled.into();
            }
            result = self.dispatch(segment, stdin.take(), options).await;
            if !result.success {
                if multi {
                    let error = result.error.unwrap_or_default();
                    return CommandResult::failure(format!(
                        "pipeline failed at '{}': {error}",
                        segment.name
                    ));
                }
                return result;
            }
            stdin = Some(result.output.clone().unwrap_or_default());
        }

        match &pipeline.redirection {
            Some(redirection) => self.redirect(result, redirection).await,
            None => result,
        }
    }

    fn read_input(&self, raw: &str) -> Result<String, CommandResult> {
        let (user, cwd) = self.session();
        let resolution = self.vfs().resolve_path(
            raw,
            raw,
            &cwd,
            &user,
            ResolveOptions::default().expect(NodeKind::File),
        );
        if let Some(message) = resolution.message() {
            return Err(CommandResult::failure(message));
        }
        self.vfs()
            .read_file(&resolution.path, &user)
            .map_err(|_| CommandResult::failure(FsError::permission_denied(raw).to_string()))
    }

    async fn redirect(&self, result: CommandResult, redirection: &Redirection) -> CommandResult {
        let (user, cwd) = self.session();
        let target = &redirection.target;
        let resolution =
            self.vfs()
                .resolve_path(target, target, &cwd, &user, ResolveOptions::default().allow_missing());
        if let Some(message) = resolution.message() {
            return CommandResult::failure(message);
        }

        let allowed = match &resolution.node {
            Some(node) if node.is_dir() => {
                return CommandResult::failure(FsError::is_directory(target).to_string())
            }
            Some(node) => has_permission(node, &user, Access::WRITE),
            None => {
                let parent = paths::parent(&resolution.path).unwrap_or("/");
                self.vfs()
                    .stat(parent, &user)
                    .is_ok_and(|dir| has_permission(&dir, &user, Access::WRITE_EXECUTE))
            }
        };
        if !allowed {
            return CommandResult::failure(FsError::permission_denied(target).to_string());
        }

        let mode = match redirection.mode {
            RedirectMode::Overwrite => WriteMode::Overwrite,
            RedirectMode::Append => WriteMode::Append,
        };
        if let Err(e) = self
            .vfs()
            .write_file(&resolution.path, result.text(), &user, mode)
        {
            return CommandResult::failure(e.to_string());
        }
        CommandResult::ok().with_persistence(self.persist().await)
    }

    /// Register a job and run the pipeline on its own task.
    fn spawn_job(&self, mut pipeline: Pipeline, options: &ExecOptions) -> CommandResult {
        let command = pipeline.to_string();
        let (id, token) = self.jobs().register(command.clone());
        let status = command.clone();
        pipeline.job_id = Some(id);

        let shell = self.clone();
        let job_options = ExecOptions {
            interactive: false,
            background: true,
            cancel: token.clone(),
            script: None,
            depth: options.depth,
        };
        tokio::spawn(async move {
            let result = tokio::select! {
                () = token.cancelled() => None,
                result = shell.run_pipeline(&pipeline, &job_options) => Some(result),
            };
            if !shell.jobs().finish(id) {
                // Killed; kill already removed it
                return;
            }
            match result {
                Some(result) if result.success => {
                    shell
                        .presenter()
                        .append_output(&format!("[{id}] Done: {status}"), MessageType::Info);
                }
                Some(result) => {
                    let error = result.error.unwrap_or_default();
                    tracing::warn!(job = id, %error, "background job failed");
                    shell.presenter().append_output(
                        &format!("[{id}] Exit: {status}: {error}"),
                        MessageType::Warning,
                    );
                }
                None => {}
            }
        });

        CommandResult::message(format!("[{id}] {command}"), MessageType::Info)
    }
}
