use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the identity that bypasses every permission check.
pub const SUPERUSER: &str = "root";

pub const DEFAULT_FILE_MODE: u32 = 0o644;
pub const DEFAULT_DIR_MODE: u32 = 0o755;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeData {
    File { content: String },
    Directory { children: BTreeMap<String, Node> },
}

/// One entry of the tree. Directories own their children; there are no
/// parent pointers, a node's parent is found by walking its path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub data: NodeData,
    pub owner: String,
    pub group: String,
    pub mode: u32,
    pub mtime: DateTime<Utc>,
}

impl Node {
    #[must_use]
    pub fn file(content: impl Into<String>, owner: &str, group: &str) -> Self {
        Self {
            data: NodeData::File {
                content: content.into(),
            },
            owner: owner.to_string(),
            group: group.to_string(),
            mode: DEFAULT_FILE_MODE,
            mtime: Utc::now(),
        }
    }

    #[must_use]
    pub fn directory(owner: &str, group: &str) -> Self {
        Self {
            data: NodeData::Directory {
                children: BTreeMap::new(),
            },
            owner: owner.to_string(),
            group: group.to_string(),
            mode: DEFAULT_DIR_MODE,
            mtime: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self.data {
            NodeData::File { .. } => NodeKind::File,
            NodeData::Directory { .. } => NodeKind::Directory,
        }
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind() == NodeKind::Directory
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind() == NodeKind::File
    }

    /// Content length for files, number of children for directories.
    #[must_use]
    pub fn size(&self) -> u64 {
        match &self.data {
            NodeData::File { content } => content.len() as u64,
            NodeData::Directory { children } => children.len() as u64,
        }
    }

    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match &self.data {
            NodeData::File { content } => Some(content),
            NodeData::Directory { .. } => None,
        }
    }

    #[must_use]
    pub fn children(&self) -> Option<&BTreeMap<String, Node>> {
        match &self.data {
            NodeData::Directory { children } => Some(children),
            NodeData::File { .. } => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut BTreeMap<String, Node>> {
        match &mut self.data {
            NodeData::Directory { children } => Some(children),
            NodeData::File { .. } => None,
        }
    }

    pub fn touch(&mut self) {
        self.mtime = Utc::now();
    }

    /// Detached metadata view for `path`.
    #[must_use]
    pub fn info(&self, path: &str) -> NodeInfo {
        let name = if path == "/" {
            "/".to_string()
        } else {
            path.rsplit('/').next().unwrap_or_default().to_string()
        };
        NodeInfo {
            path: path.to_string(),
            name,
            kind: self.kind(),
            owner: self.owner.clone(),
            group: self.group.clone(),
            mode: self.mode,
            mtime: self.mtime,
            size: self.size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub path: String,
    pub name: String,
    pub kind: NodeKind,
    pub owner: String,
    pub group: String,
    pub mode: u32,
    pub mtime: DateTime<Utc>,
    pub size: u64,
}

impl NodeInfo {
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }
}

/// The acting user as seen by permission checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub groups: Vec<String>,
}

impl Identity {
    #[must_use]
    pub fn new(name: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            name: name.into(),
            groups,
        }
    }

    #[must_use]
    pub fn root() -> Self {
        Self::new(SUPERUSER, vec![SUPERUSER.to_string()])
    }

    #[must_use]
    pub fn is_superuser(&self) -> bool {
        self.name == SUPERUSER
    }

    #[must_use]
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Group new nodes are created with.
    #[must_use]
    pub fn primary_group(&self) -> &str {
        self.groups.first().map_or(self.name.as_str(), String::as_str)
    }
}
