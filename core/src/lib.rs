#![allow(missing_docs)]

pub mod accounts;
pub mod ops;
pub mod paths;
pub mod permissions;
pub mod stores;
pub mod vfs;

pub use vsh_sdk;
pub use accounts::{create_home, Accounts, UserRecord, DEFAULT_USER};
pub use ops::{BatchOutcome, CopyOptions};
pub use permissions::has_permission;
pub use stores::{JsonFileStore, MemoryStore};
pub use vfs::{ResolveOptions, Resolution, VirtualFs, Walk, WriteMode};
