//! vsh - a simulated multi-user shell over a permissioned virtual file system
//!
//! This crate provides:
//! - A lexer and parser for pipelines, redirections and `;`, `&&`, `||`, `&`
//! - A command registry whose dispatcher validates flags, arguments, paths
//!   and permissions before a command runs
//! - A pipeline executor with background jobs and cooperative cancellation
//! - Scripts run line by line, answering prompts from their own next line
//! - Built-in commands (ls, cp, find, grep, useradd, ...) over `vsh-core`

pub mod ast;
pub mod command;
mod commands;
pub mod context;
mod dispatch;
pub mod error;
mod executor;
pub mod expansion;
pub mod glob;
pub mod help;
pub mod jobs;
pub mod lexer;
pub mod parser;
pub mod presenter;
pub mod registry;
pub mod result;
pub mod script;
pub mod shell;
mod utils;

pub use command::{ArgRule, ArgSelector, Command, CommandSpec, FlagSpec, PermissionTarget};
pub use context::{ExecContext, ExecOptions};
pub use error::{ShellError, ShellResult};
pub use parser::parse;
pub use presenter::{BufferPresenter, Presenter, TerminalPresenter};
pub use registry::CommandRegistry;
pub use result::{CommandResult, MessageType};
pub use shell::{Shell, ShellBuilder};
