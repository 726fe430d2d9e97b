//! Shell state shared by the REPL, scripts and background jobs.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use vsh_config::VshConfig;
use vsh_core::{Accounts, MemoryStore, VirtualFs, DEFAULT_USER};
use vsh_sdk::{Identity, Store, SUPERUSER};

use crate::command::Command;
use crate::context::ExecOptions;
use crate::error::{ShellError, ShellResult};
use crate::jobs::JobTable;
use crate::presenter::{Presenter, TerminalPresenter};
use crate::registry::CommandRegistry;
use crate::result::{CommandResult, MessageType};

#[derive(Debug, Clone)]
struct Session {
    user: Identity,
    cwd: String,
}

/// The shell service. Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct Shell {
    vfs: Arc<VirtualFs>,
    registry: Arc<CommandRegistry>,
    jobs: Arc<JobTable>,
    env: Arc<RwLock<HashMap<String, String>>>,
    aliases: Arc<RwLock<HashMap<String, String>>>,
    history: Arc<Mutex<Vec<String>>>,
    session: Arc<RwLock<Session>>,
    presenter: Arc<dyn Presenter>,
    config: Arc<VshConfig>,
    pub(crate) script_running: Arc<AtomicBool>,
}

impl Shell {
    #[must_use]
    pub fn builder() -> ShellBuilder {
        ShellBuilder::new()
    }

    /// Execute a line as typed at the prompt and present its result.
    pub async fn execute(&self, line: &str) -> CommandResult {
        self.execute_with(line, &ExecOptions::default()).await
    }

    /// Execute and present with explicit options.
    pub async fn execute_with(&self, line: &str, options: &ExecOptions) -> CommandResult {
        let result = self.execute_line(line, options).await;
        if !options.background {
            self.present(&result);
        }
        result
    }

    /// Show a result's output or error. The error of a successful result
    /// is a warning.
    pub fn present(&self, result: &CommandResult) {
        if let Some(output) = result.output.as_deref().filter(|o| !o.is_empty()) {
            self.presenter
                .append_output(output, result.message_type.unwrap_or(MessageType::Info));
        }
        if let Some(error) = &result.error {
            let kind = if result.success {
                MessageType::Warning
            } else {
                MessageType::Error
            };
            self.presenter.append_output(error, kind);
        }
    }

    /// Save the tree. The in-memory change stays even when the save fails;
    /// callers fold the error into their result with
    /// [`CommandResult::with_persistence`].
    pub async fn persist(&self) -> ShellResult<()> {
        self.vfs
            .save()
            .await
            .map_err(|e| ShellError::Persistence(format!("warning: changes not saved: {e}")))
    }

    #[must_use]
    pub fn vfs(&self) -> &VirtualFs {
        &self.vfs
    }

    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    #[must_use]
    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    #[must_use]
    pub fn presenter(&self) -> &dyn Presenter {
        self.presenter.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &VshConfig {
        &self.config
    }

    /// Current user and working directory.
    #[must_use]
    pub fn session(&self) -> (Identity, String) {
        let session = self.session.read().unwrap_or_else(PoisonError::into_inner);
        (session.user.clone(), session.cwd.clone())
    }

    #[must_use]
    pub fn user(&self) -> Identity {
        self.session().0
    }

    #[must_use]
    pub fn cwd(&self) -> String {
        self.session().1
    }

    pub fn set_cwd(&self, cwd: impl Into<String>) {
        let cwd = cwd.into();
        self.set_var("PWD", &cwd);
        self.session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .cwd = cwd;
    }

    /// Switch user, moving to `home`.
    pub fn switch_user(&self, user: Identity, home: &str) {
        tracing::info!(user = %user.name, "switched user");
        self.set_var("USER", &user.name);
        self.set_var("HOME", home);
        self.session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .user = user;
        self.set_cwd(home);
    }

    /// Re-read the current user's groups after account changes.
    pub fn refresh_identity(&self) {
        let name = self.user().name;
        if let Some(identity) = Accounts::load(&self.vfs)
            .ok()
            .and_then(|accounts| accounts.identity(&name))
        {
            self.session
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .user = identity;
        }
    }

    #[must_use]
    pub fn prompt(&self) -> String {
        let (user, cwd) = self.session();
        self.config.shell.render_prompt(&user.name, &cwd)
    }

    #[must_use]
    pub fn get_var(&self, name: &str) -> Option<String> {
        self.env
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn set_var(&self, name: &str, value: &str) {
        self.env
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value.to_string());
    }

    pub fn unset_var(&self, name: &str) -> bool {
        self.env
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    #[must_use]
    pub fn env_snapshot(&self) -> HashMap<String, String> {
        self.env.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn get_alias(&self, name: &str) -> Option<String> {
        self.aliases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn set_alias(&self, name: &str, value: &str) {
        self.aliases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove_alias(&self, name: &str) -> bool {
        self.aliases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    #[must_use]
    pub fn aliases_snapshot(&self) -> HashMap<String, String> {
        self.aliases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn record_history(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let limit = self.config.shell.history_size;
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.push(line.to_string());
        if history.len() > limit {
            let excess = history.len() - limit;
            history.drain(..excess);
        }
    }

    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cancel every background job; used on exit.
    pub fn shutdown(&self) {
        self.jobs.cancel_all();
    }
}

/// Builder for [`Shell`].
pub struct ShellBuilder {
    store: Option<Arc<dyn Store>>,
    user: Option<String>,
    presenter: Option<Arc<dyn Presenter>>,
    env: HashMap<String, String>,
    registry: CommandRegistry,
    config: VshConfig,
}

impl Default for ShellBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: None,
            user: None,
            presenter: None,
            env: HashMap::new(),
            registry: CommandRegistry::with_builtins(),
            config: VshConfig::default(),
        }
    }

    /// Persistence backend. Defaults to an in-memory store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Initial user. Defaults to the configured user.
    #[must_use]
    pub fn user(mut self, name: impl Into<String>) -> Self {
        self.user = Some(name.into());
        self
    }

    #[must_use]
    pub fn presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    #[must_use]
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Add or replace a command.
    #[must_use]
    pub fn command<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Command> + Send + Sync + 'static,
    {
        self.registry.register(name, factory);
        self
    }

    #[must_use]
    pub fn config(mut self, config: VshConfig) -> Self {
        self.config = config;
        self
    }

    /// Restore the file system, make sure the default accounts exist and
    /// log in.
    pub async fn build(self) -> ShellResult<Shell> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn Store>);
        let vfs = VirtualFs::open(store).await?;
        let accounts = Accounts::ensure_defaults(&vfs)?;
        if let Err(e) = vfs.save().await {
            tracing::warn!(error = %e, "could not save initial state");
        }

        let name = self.user.unwrap_or_else(|| self.config.shell.user.clone());
        let (identity, home) = match (accounts.identity(&name), accounts.user(&name)) {
            (Some(identity), Some(record)) => (identity, record.home.clone()),
            _ => {
                return Err(ShellError::Validation(format!(
                    "unknown user '{name}' (known: {SUPERUSER}, {DEFAULT_USER}, ...)"
                )))
            }
        };

        let mut env = self.env;
        env.entry("USER".into()).or_insert_with(|| identity.name.clone());
        env.entry("HOME".into()).or_insert_with(|| home.clone());
        env.insert("PWD".into(), home.clone());

        tracing::debug!(user = %identity.name, store = %vfs.describe_store(), "shell ready");
        Ok(Shell {
            vfs: Arc::new(vfs),
            registry: Arc::new(self.registry),
            jobs: Arc::new(JobTable::new()),
            env: Arc::new(RwLock::new(env)),
            aliases: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(Mutex::new(Vec::new())),
            session: Arc::new(RwLock::new(Session {
                user: identity,
                cwd: home,
            })),
            presenter: self
                .presenter
                .unwrap_or_else(|| Arc::new(TerminalPresenter) as Arc<dyn Presenter>),
            config: Arc::new(self.config),
            script_running: Arc::new(AtomicBool::new(false)),
        })
    }
}
