use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vsh::{ExecOptions, Shell};
use vsh_config::{LogFormat, StorageBackend, VshConfig};
use vsh_core::{JsonFileStore, MemoryStore};
use vsh_sdk::Store;

mod completer;

/// vsh - Simulated multi-user shell over a virtual file system
#[derive(Parser, Debug)]
#[command(name = "vsh", version, about)]
struct Args {
    /// Execute command and exit
    #[arg(short = 'c')]
    command: Option<String>,

    /// Path to configuration file
    #[arg(long, env = "VSH_CONFIG")]
    config: Option<String>,

    /// Start the session as this user
    #[arg(short, long)]
    user: Option<String>,

    /// JSON state file holding the virtual tree
    #[arg(long)]
    state: Option<PathBuf>,

    /// Keep the tree in memory only
    #[arg(long, conflicts_with = "state")]
    memory: bool,

    /// Host script file to execute, followed by its arguments
    script: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    script_args: Vec<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => vsh_config::load_from_file(path).unwrap_or_else(|e| {
            eprintln!("Error: Failed to load config from {path}: {e}");
            std::process::exit(1);
        }),
        None => vsh_config::load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config: {e}, using defaults");
            VshConfig::default()
        }),
    };
    if let Some(user) = &args.user {
        config.shell.user.clone_from(user);
    }
    if let Some(state) = &args.state {
        config.storage.backend = StorageBackend::File;
        config.storage.path = state.display().to_string();
    }
    if args.memory {
        config.storage.backend = StorageBackend::Memory;
    }

    init_logging(&config);

    let store: Arc<dyn Store> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::File => Arc::new(JsonFileStore::new(config.storage.state_path())),
    };

    let shell = match Shell::builder()
        .store(store)
        .user(config.shell.user.clone())
        .config(config.clone())
        .build()
        .await
    {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("vsh: {e}");
            std::process::exit(1);
        }
    };

    let code = if let Some(command) = args.command {
        let options = ExecOptions::batch(CancellationToken::new());
        i32::from(!shell.execute_with(&command, &options).await.success)
    } else if let Some(script) = args.script {
        run_host_script(&shell, &script, &args.script_args).await
    } else {
        match run_repl(&shell, &config).await {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("vsh: {e}");
                1
            }
        }
    };

    shell.shutdown();
    std::process::exit(code);
}

fn init_logging(config: &VshConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.directives()));
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Pretty => registry.with(layer.pretty()).init(),
        LogFormat::Compact => registry.with(layer.compact()).init(),
        LogFormat::Full => registry.with(layer).init(),
    }
}

/// Run a script from the host file system with the same semantics as `run`.
async fn run_host_script(shell: &Shell, path: &std::path::Path, args: &[String]) -> i32 {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("vsh: cannot read '{}': {e}", path.display());
            return 1;
        }
    };
    let options = ExecOptions::batch(CancellationToken::new());
    let name = path.display().to_string();
    let result = shell.run_script(&name, &text, args, &options).await;
    shell.present(&result);
    i32::from(!result.success)
}

/// Run one line, cancelling it on Ctrl-C.
async fn execute_interruptible(shell: &Shell, line: &str) {
    let cancel = CancellationToken::new();
    let options = ExecOptions::interactive(cancel.clone());
    let execution = shell.execute_with(line, &options);
    tokio::pin!(execution);
    loop {
        tokio::select! {
            _ = &mut execution => break,
            Ok(()) = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                println!("^C");
                cancel.cancel();
            }
        }
    }
}

async fn run_repl(shell: &Shell, config: &VshConfig) -> Result<(), Box<dyn std::error::Error>> {
    use completer::VshHelper;
    use rustyline::error::ReadlineError;
    use rustyline::history::DefaultHistory;
    use rustyline::{CompletionType, Config, Editor};

    let rl_config = Config::builder()
        .completion_type(CompletionType::List)
        .max_history_size(config.shell.history_size)?
        .history_ignore_dups(true)?
        .history_ignore_space(true)
        .build();

    let mut rl: Editor<VshHelper, DefaultHistory> = Editor::with_config(rl_config)?;
    rl.set_helper(Some(VshHelper::new(shell.clone())));

    let history_path = config.shell.history_path();
    if let Some(path) = &history_path {
        if let Err(e) = rl.load_history(path) {
            tracing::debug!(path = %path.display(), error = %e, "no history loaded");
        }
    }

    println!("vsh v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' to quit, 'help' for help.");
    println!();

    loop {
        match rl.readline(&shell.prompt()) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Err(e) = rl.add_history_entry(line) {
                    tracing::debug!(error = %e, "history entry not added");
                }
                if line == "exit" || line == "quit" {
                    break;
                }
                shell.record_history(line);
                execute_interruptible(shell, line).await;
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
            }
            Err(ReadlineError::Eof) => {
                println!("exit");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err:?}");
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        if let Err(e) = rl.save_history(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to save history");
        }
    }
    Ok(())
}
