#![doc = include_str!("../README.md")]

mod access;
mod error;
mod store;
mod types;

pub use access::{format_mode, Access};
pub use error::{FsError, FsResult};
pub use store::Store;
pub use types::{
    Identity, Node, NodeData, NodeInfo, NodeKind, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, SUPERUSER,
};
