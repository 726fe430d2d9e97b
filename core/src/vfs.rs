//! The virtual file tree: path resolution with kind and permission
//! checks, reads and writes, metadata changes, walks and persistence.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use vsh_sdk::{Access, FsError, FsResult, Identity, Node, NodeInfo, NodeKind, Store, SUPERUSER};

use crate::paths;
use crate::permissions::{self, node_allows};

/// What a caller expects of a path before an operation runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Accept a missing final component as long as its parent directory exists.
    pub allow_missing: bool,
    pub disallow_root: bool,
    pub expected: Option<NodeKind>,
}

impl ResolveOptions {
    #[must_use]
    pub fn allow_missing(mut self) -> Self {
        self.allow_missing = true;
        self
    }

    #[must_use]
    pub fn disallow_root(mut self) -> Self {
        self.disallow_root = true;
        self
    }

    #[must_use]
    pub fn expect(mut self, kind: NodeKind) -> Self {
        self.expected = Some(kind);
        self
    }
}

/// Outcome of [`VirtualFs::resolve_path`]. `error` is set when the path
/// violates the requested [`ResolveOptions`]; `node` is set whenever the
/// path exists, even if it has the wrong kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub label: String,
    pub path: String,
    pub node: Option<NodeInfo>,
    pub error: Option<FsError>,
}

impl Resolution {
    fn failed(label: &str, path: impl Into<String>, error: FsError) -> Self {
        Self {
            label: label.to_string(),
            path: path.into(),
            node: None,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.node.is_some()
    }

    /// `"<label>: <error>"`, as printed by commands.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        self.error.as_ref().map(|e| format!("{}: {e}", self.label))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Overwrite,
    /// Append, inserting a newline first when existing content lacks one.
    Append,
}

/// Result of a depth-first traversal.
#[derive(Debug, Clone, Default)]
pub struct Walk {
    pub entries: Vec<NodeInfo>,
    /// Directories that could not be listed.
    pub denied: Vec<String>,
}

/// The shell's file tree.
///
/// Every operation takes the tree lock for its own duration only, so
/// concurrent jobs interleave at operation granularity. Mutations never
/// persist on their own; callers follow them with [`VirtualFs::save`].
pub struct VirtualFs {
    root: RwLock<Node>,
    store: Arc<dyn Store>,
}

impl VirtualFs {
    /// Fresh tree with the default top-level layout.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_root(default_tree(), store)
    }

    #[must_use]
    pub fn with_root(root: Node, store: Arc<dyn Store>) -> Self {
        Self {
            root: RwLock::new(root),
            store,
        }
    }

    /// Restore the last saved tree, or start fresh when nothing was saved.
    pub async fn open(store: Arc<dyn Store>) -> FsResult<Self> {
        match store.load().await? {
            Some(root) if root.is_dir() => {
                tracing::info!(store = %store.describe(), "restored file system");
                Ok(Self::with_root(root, store))
            }
            Some(_) => Err(FsError::persistence("saved root is not a directory")),
            None => {
                tracing::info!(store = %store.describe(), "no saved state, starting fresh");
                Ok(Self::new(store))
            }
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Node> {
        self.root.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Node> {
        self.root.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn describe_store(&self) -> String {
        self.store.describe()
    }

    /// Deep copy of the whole tree.
    #[must_use]
    pub fn snapshot(&self) -> Node {
        self.read().clone()
    }

    pub async fn save(&self) -> FsResult<()> {
        let snapshot = self.snapshot();
        match self.store.save(&snapshot).await {
            Ok(()) => {
                tracing::debug!(store = %self.store.describe(), "saved file system");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(store = %self.store.describe(), error = %e, "save failed");
                Err(e)
            }
        }
    }

    /// Normalize `raw` against `cwd` and validate it against `opts`.
    ///
    /// Walking the path requires execute permission on every directory
    /// passed through. Error payloads carry `raw` as the user typed it.
    pub fn resolve_path(
        &self,
        label: &str,
        raw: &str,
        cwd: &str,
        user: &Identity,
        opts: ResolveOptions,
    ) -> Resolution {
        let path = match paths::normalize(cwd, raw) {
            Ok(path) => path,
            Err(e) => return Resolution::failed(label, raw, e),
        };
        if opts.disallow_root && path == "/" {
            return Resolution::failed(
                label,
                path,
                FsError::invalid_argument("refusing to operate on '/'"),
            );
        }

        let root = self.read();
        match lookup(&root, &path, user) {
            Ok(node) => {
                let info = node.info(&path);
                let error = match opts.expected {
                    Some(NodeKind::Directory) if !info.is_dir() => Some(FsError::not_directory(raw)),
                    Some(NodeKind::File) if !info.is_file() => Some(FsError::is_directory(raw)),
                    _ => None,
                };
                Resolution {
                    label: label.to_string(),
                    path,
                    node: Some(info),
                    error,
                }
            }
            Err(FsError::NotFound(_)) if opts.allow_missing => {
                let parent = paths::parent(&path).unwrap_or("/");
                match lookup(&root, parent, user) {
                    Ok(dir) if dir.is_dir() => Resolution {
                        label: label.to_string(),
                        path,
                        node: None,
                        error: None,
                    },
                    Ok(_) => Resolution::failed(label, path, FsError::not_directory(raw)),
                    Err(e) => Resolution::failed(label, path, relabel(e, raw)),
                }
            }
            Err(e) => Resolution::failed(label, path, relabel(e, raw)),
        }
    }

    pub fn stat(&self, path: &str, user: &Identity) -> FsResult<NodeInfo> {
        let root = self.read();
        lookup(&root, path, user).map(|node| node.info(path))
    }

    pub fn read_file(&self, path: &str, user: &Identity) -> FsResult<String> {
        let root = self.read();
        let node = lookup(&root, path, user)?;
        let content = node.content().ok_or_else(|| FsError::is_directory(path))?;
        if !node_allows(node, user, Access::READ) {
            return Err(FsError::permission_denied(path));
        }
        Ok(content.to_string())
    }

    /// Children of a directory, sorted by name.
    pub fn list_dir(&self, path: &str, user: &Identity) -> FsResult<Vec<NodeInfo>> {
        let root = self.read();
        let node = lookup(&root, path, user)?;
        let children = node.children().ok_or_else(|| FsError::not_directory(path))?;
        if !node_allows(node, user, Access::READ) {
            return Err(FsError::permission_denied(path));
        }
        Ok(children
            .iter()
            .map(|(name, child)| child.info(&paths::join(path, name)))
            .collect())
    }

    /// Pre-order traversal starting at `path` itself.
    pub fn walk(&self, path: &str, user: &Identity) -> FsResult<Walk> {
        let root = self.read();
        let start = lookup(&root, path, user)?;
        let mut walk = Walk::default();
        walk_into(start, path, user, &mut walk);
        Ok(walk)
    }

    /// Create a new file; fails if anything already exists at `path`.
    pub fn create_file(&self, path: &str, content: &str, user: &Identity) -> FsResult<()> {
        let mut root = self.write();
        if lookup(&root, path, user).is_ok() {
            return Err(FsError::already_exists(path));
        }
        put_file(&mut root, path, content, user, WriteMode::Overwrite)
    }

    /// Write a file, creating it when missing.
    pub fn write_file(
        &self,
        path: &str,
        content: &str,
        user: &Identity,
        mode: WriteMode,
    ) -> FsResult<()> {
        let mut root = self.write();
        put_file(&mut root, path, content, user, mode)
    }

    /// Create a directory. With `parents`, missing ancestors are created
    /// too and an existing directory is not an error. Returns whether
    /// anything was created.
    pub fn create_directory(&self, path: &str, user: &Identity, parents: bool) -> FsResult<bool> {
        let mut root = self.write();
        match lookup(&root, path, user) {
            Ok(node) if node.is_dir() && parents => return Ok(false),
            Ok(_) => return Err(FsError::already_exists(path)),
            Err(FsError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        if !parents {
            let parent = paths::parent(path).ok_or_else(|| FsError::already_exists(path))?;
            insert_child(&mut root, parent, paths::file_name(path), new_dir(user), user)?;
            return Ok(true);
        }

        let mut current = String::from("/");
        for name in paths::components(path) {
            let next = paths::join(&current, name);
            match lookup(&root, &next, user) {
                Ok(node) if node.is_dir() => {}
                Ok(_) => return Err(FsError::not_directory(next)),
                Err(FsError::NotFound(_)) => {
                    insert_child(&mut root, &current, name, new_dir(user), user)?;
                }
                Err(e) => return Err(e),
            }
            current = next;
        }
        Ok(true)
    }

    /// Replace a directory's children wholesale.
    pub fn set_children(
        &self,
        path: &str,
        children: BTreeMap<String, Node>,
        user: &Identity,
    ) -> FsResult<()> {
        let mut root = self.write();
        writable_dir(&root, path, user)?;
        let dir = lookup_mut(&mut root, path)?;
        let slot = dir
            .children_mut()
            .ok_or_else(|| FsError::not_directory(path))?;
        *slot = children;
        dir.touch();
        if let Some(parent) = paths::parent(path) {
            lookup_mut(&mut root, parent)?.touch();
        }
        Ok(())
    }

    pub fn chmod(&self, path: &str, mode: u32, user: &Identity) -> FsResult<()> {
        let mut root = self.write();
        let owner = lookup(&root, path, user)?.owner.clone();
        if !permissions::may_chmod(&owner, user) {
            return Err(FsError::permission_denied(path));
        }
        lookup_mut(&mut root, path)?.mode = mode & 0o777;
        Ok(())
    }

    /// Only the superuser may give a node away.
    pub fn chown(&self, path: &str, owner: &str, user: &Identity) -> FsResult<()> {
        if !user.is_superuser() {
            return Err(FsError::permission_denied(path));
        }
        let mut root = self.write();
        lookup(&root, path, user)?;
        lookup_mut(&mut root, path)?.owner = owner.to_string();
        Ok(())
    }

    /// The owner may move a node into any group they belong to.
    pub fn chgrp(&self, path: &str, group: &str, user: &Identity) -> FsResult<()> {
        let mut root = self.write();
        let owner = lookup(&root, path, user)?.owner.clone();
        if !user.is_superuser() && (owner != user.name || !user.in_group(group)) {
            return Err(FsError::permission_denied(path));
        }
        lookup_mut(&mut root, path)?.group = group.to_string();
        Ok(())
    }

    /// Set a node's modification time. Requires ownership or write access.
    pub fn set_mtime(&self, path: &str, when: DateTime<Utc>, user: &Identity) -> FsResult<()> {
        let mut root = self.write();
        let node = lookup(&root, path, user)?;
        if node.owner != user.name && !node_allows(node, user, Access::WRITE) {
            return Err(FsError::permission_denied(path));
        }
        lookup_mut(&mut root, path)?.mtime = when;
        Ok(())
    }
}

fn default_tree() -> Node {
    let mut root = Node::directory(SUPERUSER, SUPERUSER);
    if let Some(children) = root.children_mut() {
        for (name, mode) in [("home", 0o755), ("etc", 0o755), ("tmp", 0o777), ("root", 0o700)] {
            children.insert(
                name.to_string(),
                Node::directory(SUPERUSER, SUPERUSER).with_mode(mode),
            );
        }
    }
    root
}

fn new_dir(user: &Identity) -> Node {
    Node::directory(&user.name, user.primary_group())
}

/// Put the path the user typed back into a lookup error.
fn relabel(err: FsError, raw: &str) -> FsError {
    match err {
        FsError::NotFound(_) => FsError::not_found(raw),
        FsError::NotDirectory(_) => FsError::not_directory(raw),
        FsError::PermissionDenied(_) => FsError::permission_denied(raw),
        other => other,
    }
}

/// Walk to `path`, requiring execute permission on every directory passed
/// through.
pub(crate) fn lookup<'a>(root: &'a Node, path: &str, user: &Identity) -> FsResult<&'a Node> {
    let mut current = root;
    let mut walked = String::from("/");
    for name in paths::components(path) {
        let children = current
            .children()
            .ok_or_else(|| FsError::not_directory(walked.clone()))?;
        if !node_allows(current, user, Access::EXECUTE) {
            return Err(FsError::permission_denied(walked));
        }
        current = children
            .get(name)
            .ok_or_else(|| FsError::not_found(path))?;
        walked = paths::join(&walked, name);
    }
    Ok(current)
}

/// Unchecked mutable walk; callers run [`lookup`] first.
pub(crate) fn lookup_mut<'a>(root: &'a mut Node, path: &str) -> FsResult<&'a mut Node> {
    let mut current = root;
    for name in paths::components(path) {
        current = current
            .children_mut()
            .and_then(|children| children.get_mut(name))
            .ok_or_else(|| FsError::not_found(path))?;
    }
    Ok(current)
}

/// A directory the user may add entries to or remove entries from.
pub(crate) fn writable_dir<'a>(root: &'a Node, path: &str, user: &Identity) -> FsResult<&'a Node> {
    let dir = lookup(root, path, user)?;
    if !dir.is_dir() {
        return Err(FsError::not_directory(path));
    }
    if !node_allows(dir, user, Access::WRITE_EXECUTE) {
        return Err(FsError::permission_denied(path));
    }
    Ok(dir)
}

fn insert_child(
    root: &mut Node,
    parent: &str,
    name: &str,
    child: Node,
    user: &Identity,
) -> FsResult<()> {
    writable_dir(root, parent, user)?;
    let dir = lookup_mut(root, parent)?;
    dir.children_mut()
        .ok_or_else(|| FsError::not_directory(parent))?
        .insert(name.to_string(), child);
    dir.touch();
    Ok(())
}

pub(crate) fn append_content(existing: &str, addition: &str) -> String {
    if existing.is_empty() || existing.ends_with('\n') {
        format!("{existing}{addition}")
    } else {
        format!("{existing}\n{addition}")
    }
}

fn put_file(
    root: &mut Node,
    path: &str,
    content: &str,
    user: &Identity,
    mode: WriteMode,
) -> FsResult<()> {
    let parent = paths::parent(path).ok_or_else(|| FsError::is_directory(path))?;
    match lookup(root, path, user) {
        Ok(node) => {
            if node.is_dir() {
                return Err(FsError::is_directory(path));
            }
            if !node_allows(node, user, Access::WRITE) {
                return Err(FsError::permission_denied(path));
            }
            let node = lookup_mut(root, path)?;
            let updated = match (mode, node.content()) {
                (WriteMode::Append, Some(existing)) => append_content(existing, content),
                _ => content.to_string(),
            };
            node.data = vsh_sdk::NodeData::File { content: updated };
            node.touch();
            lookup_mut(root, parent)?.touch();
            Ok(())
        }
        Err(FsError::NotFound(_)) => {
            let file = Node::file(content, &user.name, user.primary_group());
            insert_child(root, parent, paths::file_name(path), file, user)
        }
        Err(e) => Err(e),
    }
}

fn walk_into(node: &Node, path: &str, user: &Identity, walk: &mut Walk) {
    walk.entries.push(node.info(path));
    let Some(children) = node.children() else {
        return;
    };
    if !node_allows(node, user, Access::READ_EXECUTE) {
        walk.denied.push(path.to_string());
        return;
    }
    for (name, child) in children {
        walk_into(child, &paths::join(path, name), user, walk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;

    fn guest() -> Identity {
        Identity::new("guest", vec!["guest".into()])
    }

    fn fs() -> VirtualFs {
        let vfs = VirtualFs::new(Arc::new(MemoryStore::new()));
        let root = Identity::root();
        vfs.create_directory("/home/guest", &root, false).unwrap();
        vfs.chown("/home/guest", "guest", &root).unwrap();
        vfs.chgrp("/home/guest", "guest", &root).unwrap();
        vfs
    }

    #[test]
    fn default_layout() {
        let vfs = fs();
        let root = Identity::root();
        for dir in ["/home", "/etc", "/tmp", "/root"] {
            assert!(vfs.stat(dir, &root).unwrap().is_dir(), "{dir}");
        }
        assert_eq!(vfs.stat("/tmp", &root).unwrap().mode, 0o777);
    }

    #[test]
    fn resolve_existing_and_missing() {
        let vfs = fs();
        let user = guest();
        let opts = ResolveOptions::default();

        let res = vfs.resolve_path("ls", "..", "/home/guest", &user, opts);
        assert!(res.is_ok());
        assert_eq!(res.path, "/home");

        let res = vfs.resolve_path("cat", "nope.txt", "/home/guest", &user, opts);
        assert_eq!(res.error, Some(FsError::not_found("nope.txt")));
        assert_eq!(
            res.message().unwrap(),
            "cat: nope.txt: No such file or directory"
        );

        let res = vfs.resolve_path("touch", "new.txt", "/home/guest", &user, opts.allow_missing());
        assert!(res.is_ok());
        assert!(!res.exists());

        let res = vfs.resolve_path("touch", "a/b.txt", "/home/guest", &user, opts.allow_missing());
        assert!(!res.is_ok());
    }

    #[test]
    fn resolve_checks_kind_and_root() {
        let vfs = fs();
        let user = guest();
        vfs.create_file("/home/guest/f", "x", &user).unwrap();

        let opts = ResolveOptions::default().expect(NodeKind::Directory);
        let res = vfs.resolve_path("cd", "f", "/home/guest", &user, opts);
        assert_eq!(res.error, Some(FsError::not_directory("f")));
        assert!(res.exists());

        let opts = ResolveOptions::default().disallow_root();
        let res = vfs.resolve_path("rm", "/..", "/", &user, opts);
        assert!(matches!(res.error, Some(FsError::InvalidArgument(_))));

        let res = vfs.resolve_path("cat", "", "/", &user, ResolveOptions::default());
        assert!(matches!(res.error, Some(FsError::InvalidPath(_))));
    }

    #[test]
    fn resolve_is_idempotent() {
        let vfs = fs();
        let user = guest();
        let opts = ResolveOptions::default();
        let first = vfs.resolve_path("ls", "./../guest/.", "/home/guest", &user, opts);
        let second = vfs.resolve_path("ls", &first.path, "/", &user, opts);
        assert_eq!(first.path, second.path);
        assert_eq!(first.node, second.node);
    }

    #[test]
    fn traversal_needs_execute() {
        let vfs = fs();
        let root = Identity::root();
        vfs.create_directory("/secret", &root, false).unwrap();
        vfs.create_file("/secret/key", "k", &root).unwrap();
        vfs.chmod("/secret", 0o700, &root).unwrap();

        let err = vfs.read_file("/secret/key", &guest()).unwrap_err();
        assert!(err.is_permission_denied());
        assert_eq!(vfs.read_file("/secret/key", &root).unwrap(), "k");
    }

    #[test]
    fn write_modes() {
        let vfs = fs();
        let user = guest();
        let path = "/home/guest/log";
        vfs.write_file(path, "one", &user, WriteMode::Overwrite).unwrap();
        vfs.write_file(path, "two", &user, WriteMode::Append).unwrap();
        assert_eq!(vfs.read_file(path, &user).unwrap(), "one\ntwo");

        vfs.write_file(path, "three\n", &user, WriteMode::Overwrite).unwrap();
        vfs.write_file(path, "four", &user, WriteMode::Append).unwrap();
        assert_eq!(vfs.read_file(path, &user).unwrap(), "three\nfour");

        let info = vfs.stat(path, &user).unwrap();
        assert_eq!(info.owner, "guest");
        assert_eq!(info.mode, vsh_sdk::DEFAULT_FILE_MODE);
    }

    #[test]
    fn write_requires_permission() {
        let vfs = fs();
        let err = vfs
            .write_file("/etc/motd", "hi", &guest(), WriteMode::Overwrite)
            .unwrap_err();
        assert!(err.is_permission_denied());

        let err = vfs
            .write_file("/home", "hi", &Identity::root(), WriteMode::Overwrite)
            .unwrap_err();
        assert_eq!(err, FsError::is_directory("/home"));
    }

    #[test]
    fn create_file_refuses_existing() {
        let vfs = fs();
        let user = guest();
        vfs.create_file("/home/guest/a", "", &user).unwrap();
        assert_eq!(
            vfs.create_file("/home/guest/a", "", &user).unwrap_err(),
            FsError::already_exists("/home/guest/a")
        );
    }

    #[test]
    fn mkdir_parents_is_idempotent() {
        let vfs = fs();
        let user = guest();
        assert!(vfs.create_directory("/home/guest/a/b/c", &user, true).unwrap());
        let before = vfs.stat("/home/guest/a/b/c", &user).unwrap();
        assert!(!vfs.create_directory("/home/guest/a/b/c", &user, true).unwrap());
        let after = vfs.stat("/home/guest/a/b/c", &user).unwrap();
        assert_eq!(before, after);

        assert!(vfs.create_directory("/home/guest/x/y", &user, false).is_err());
        assert_eq!(
            vfs.create_directory("/home/guest/a", &user, false).unwrap_err(),
            FsError::already_exists("/home/guest/a")
        );
    }

    #[test]
    fn mutations_touch_parent() {
        let vfs = fs();
        let user = guest();
        let when = DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        vfs.set_mtime("/home/guest", when, &user).unwrap();
        vfs.create_file("/home/guest/a", "", &user).unwrap();
        assert!(vfs.stat("/home/guest", &user).unwrap().mtime > when);
    }

    #[test]
    fn ownership_changes() {
        let vfs = fs();
        let user = guest();
        vfs.create_file("/home/guest/a", "", &user).unwrap();

        assert!(vfs.chown("/home/guest/a", "root", &user).is_err());
        assert!(vfs.chgrp("/home/guest/a", "wheel", &user).is_err());
        vfs.chmod("/home/guest/a", 0o600, &user).unwrap();
        assert_eq!(vfs.stat("/home/guest/a", &user).unwrap().mode, 0o600);

        assert!(vfs.chmod("/etc", 0o777, &user).unwrap_err().is_permission_denied());
        vfs.chown("/home/guest/a", "alice", &Identity::root()).unwrap();
        assert_eq!(vfs.stat("/home/guest/a", &user).unwrap().owner, "alice");
    }

    #[test]
    fn set_children_replaces_listing() {
        let vfs = fs();
        let user = guest();
        vfs.create_file("/home/guest/old", "", &user).unwrap();
        let mut children = BTreeMap::new();
        children.insert("new".to_string(), Node::file("n", "guest", "guest"));
        vfs.set_children("/home/guest", children, &user).unwrap();

        let names: Vec<_> = vfs
            .list_dir("/home/guest", &user)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["new"]);
    }

    #[test]
    fn walk_reports_denied_directories() {
        let vfs = fs();
        let root = Identity::root();
        vfs.create_directory("/home/guest/pub", &guest(), false).unwrap();
        vfs.create_directory("/root/private", &root, false).unwrap();

        let walk = vfs.walk("/", &guest()).unwrap();
        assert!(walk.entries.iter().any(|e| e.path == "/home/guest/pub"));
        assert!(!walk.entries.iter().any(|e| e.path == "/root/private"));
        assert_eq!(walk.denied, vec!["/root".to_string()]);
    }

    #[tokio::test]
    async fn save_and_reopen() {
        let store = Arc::new(MemoryStore::new());
        let vfs = VirtualFs::new(store.clone());
        vfs.create_file("/tmp/keep", "data", &Identity::root()).unwrap();
        vfs.save().await.unwrap();

        let reopened = VirtualFs::open(store).await.unwrap();
        assert_eq!(reopened.read_file("/tmp/keep", &Identity::root()).unwrap(), "data");
    }

    #[tokio::test]
    async fn failed_save_keeps_tree() {
        let store = Arc::new(MemoryStore::new());
        let vfs = VirtualFs::new(store.clone());
        store.fail_saves(true);
        vfs.create_file("/tmp/x", "1", &Identity::root()).unwrap();
        assert!(vfs.save().await.unwrap_err().is_persistence());
        assert_eq!(vfs.read_file("/tmp/x", &Identity::root()).unwrap(), "1");
    }
}
