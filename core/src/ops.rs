//! Recursive tree operations.
//!
//! Each runs under a single write lock and keeps going past per-item
//! failures, collecting them in a [`BatchOutcome`].

use std::collections::BTreeMap;

use vsh_sdk::{Access, FsError, FsResult, Identity, Node, NodeData, NodeKind};

use crate::paths;
use crate::permissions::node_allows;
use crate::vfs::{lookup, lookup_mut, writable_dir, VirtualFs};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Top-level paths the operation finished for.
    pub completed: Vec<String>,
    pub failures: Vec<(String, FsError)>,
}

impl BatchOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether the tree changed and needs saving.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.completed.is_empty()
    }

    #[must_use]
    pub fn error_messages(&self) -> Vec<String> {
        self.failures.iter().map(|(_, e)| e.to_string()).collect()
    }

    pub fn merge(&mut self, other: Self) {
        self.completed.extend(other.completed);
        self.failures.extend(other.failures);
    }

    fn done(&mut self, path: impl Into<String>) {
        self.completed.push(path.into());
    }

    fn fail(&mut self, path: impl Into<String>, err: FsError) {
        self.failures.push((path.into(), err));
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOptions {
    pub recursive: bool,
    /// Keep mode bits and timestamps; ownership too when run as superuser.
    pub preserve: bool,
    pub overwrite: bool,
}

impl VirtualFs {
    /// Remove `path`. Without `recursive`, only files and empty
    /// directories go. With it, everything the user may remove is removed
    /// and the rest is reported.
    pub fn delete(&self, path: &str, user: &Identity, recursive: bool) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if let Err(e) = self.delete_inner(path, user, recursive, &mut outcome) {
            outcome.fail(path, e);
        }
        outcome
    }

    fn delete_inner(
        &self,
        path: &str,
        user: &Identity,
        recursive: bool,
        outcome: &mut BatchOutcome,
    ) -> FsResult<()> {
        let parent = paths::parent(path)
            .ok_or_else(|| FsError::invalid_argument("refusing to remove '/'"))?;
        let name = paths::file_name(path);

        let mut root = self.write();
        writable_dir(&root, parent, user)?;
        let target = lookup(&root, path, user)?;
        if !recursive && !is_empty(target) {
            return Err(FsError::directory_not_empty(path));
        }

        let dir = lookup_mut(&mut root, parent)?;
        let children = dir
            .children_mut()
            .ok_or_else(|| FsError::not_directory(parent))?;
        if let Some(target) = children.get_mut(name) {
            if target.is_dir() {
                purge(target, path, user, outcome);
            }
        }
        let removable = children.get(name).is_some_and(is_empty);
        if removable {
            children.remove(name);
            dir.touch();
            outcome.done(path);
        } else if outcome.is_success() {
            outcome.fail(path, FsError::directory_not_empty(path));
        }
        Ok(())
    }

    /// Copy `src` to `dst`. An existing directory at `dst` receives the
    /// copy under the source's name.
    pub fn copy(&self, src: &str, dst: &str, user: &Identity, opts: CopyOptions) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if let Err(e) = self.copy_inner(src, dst, user, opts, &mut outcome) {
            outcome.fail(src, e);
        }
        outcome
    }

    fn copy_inner(
        &self,
        src: &str,
        dst: &str,
        user: &Identity,
        opts: CopyOptions,
        outcome: &mut BatchOutcome,
    ) -> FsResult<()> {
        let mut root = self.write();
        let source = lookup(&root, src, user)?;
        if source.is_dir() && !opts.recursive {
            return Err(FsError::invalid_argument(format!(
                "omitting directory '{src}'"
            )));
        }
        let target = destination(&root, src, dst, user)?;
        if target == src || paths::is_descendant(&target, src) {
            return Err(FsError::invalid_argument(format!(
                "cannot copy '{src}' into itself"
            )));
        }
        let parent = paths::parent(&target)
            .ok_or_else(|| FsError::invalid_argument("refusing to overwrite '/'"))?
            .to_string();
        writable_dir(&root, &parent, user)?;
        if let Ok(existing) = lookup(&root, &target, user) {
            check_replace(existing, source.kind(), &target, opts.overwrite)?;
            if existing.is_file() && !node_allows(existing, user, Access::WRITE) {
                return Err(FsError::permission_denied(target));
            }
        }

        let Some(copy) = clone_tree(source, src, user, opts, outcome) else {
            return Ok(());
        };

        let name = paths::file_name(&target).to_string();
        let dir = lookup_mut(&mut root, &parent)?;
        let children = dir
            .children_mut()
            .ok_or_else(|| FsError::not_directory(parent.as_str()))?;
        if children.get(&name).is_some_and(Node::is_dir) {
            if let Some(existing) = children.get_mut(&name) {
                merge_into(existing, copy, &target, user, opts, outcome);
            }
        } else {
            children.insert(name, copy);
        }
        dir.touch();
        outcome.done(target);
        Ok(())
    }

    /// Move or rename `src`. An existing directory at `dst` receives the
    /// node under its own name.
    pub fn move_node(&self, src: &str, dst: &str, user: &Identity, overwrite: bool) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        match self.move_inner(src, dst, user, overwrite) {
            Ok(target) => outcome.done(target),
            Err(e) => outcome.fail(src, e),
        }
        outcome
    }

    fn move_inner(&self, src: &str, dst: &str, user: &Identity, overwrite: bool) -> FsResult<String> {
        let src_parent = paths::parent(src)
            .ok_or_else(|| FsError::invalid_argument("refusing to move '/'"))?;

        let mut root = self.write();
        writable_dir(&root, src_parent, user)?;
        let kind = lookup(&root, src, user)?.kind();
        let target = destination(&root, src, dst, user)?;
        if target == src {
            return Err(FsError::invalid_argument(format!(
                "'{src}' and '{target}' are the same file"
            )));
        }
        if paths::is_descendant(&target, src) {
            return Err(FsError::invalid_argument(format!(
                "cannot move '{src}' to a subdirectory of itself"
            )));
        }
        let target_parent = paths::parent(&target)
            .ok_or_else(|| FsError::invalid_argument("refusing to overwrite '/'"))?
            .to_string();
        writable_dir(&root, &target_parent, user)?;
        if let Ok(existing) = lookup(&root, &target, user) {
            check_replace(existing, kind, &target, overwrite)?;
            if existing.is_dir() && !is_empty(existing) {
                return Err(FsError::directory_not_empty(target));
            }
        }

        let mut node = {
            let dir = lookup_mut(&mut root, src_parent)?;
            let node = dir
                .children_mut()
                .and_then(|children| children.remove(paths::file_name(src)))
                .ok_or_else(|| FsError::not_found(src))?;
            dir.touch();
            node
        };
        node.touch();

        let dir = lookup_mut(&mut root, &target_parent)?;
        if let Some(children) = dir.children_mut() {
            children.insert(paths::file_name(&target).to_string(), node);
        }
        dir.touch();
        Ok(target)
    }
}

fn is_empty(node: &Node) -> bool {
    node.children().map_or(true, BTreeMap::is_empty)
}

/// Where `src` lands when copied or moved to `dst`.
fn destination(root: &Node, src: &str, dst: &str, user: &Identity) -> FsResult<String> {
    match lookup(root, dst, user) {
        Ok(node) if node.is_dir() => Ok(paths::join(dst, paths::file_name(src))),
        Ok(_) | Err(FsError::NotFound(_)) => Ok(dst.to_string()),
        Err(e) => Err(e),
    }
}

fn check_replace(existing: &Node, incoming: NodeKind, target: &str, overwrite: bool) -> FsResult<()> {
    match (existing.kind(), incoming) {
        (NodeKind::Directory, NodeKind::File) => Err(FsError::is_directory(target)),
        (NodeKind::File, NodeKind::Directory) => Err(FsError::not_directory(target)),
        (NodeKind::File, NodeKind::File) if !overwrite => Err(FsError::already_exists(target)),
        _ => Ok(()),
    }
}

/// Empty out a directory, depth first, skipping what the user may not
/// remove.
fn purge(dir: &mut Node, path: &str, user: &Identity, outcome: &mut BatchOutcome) {
    if is_empty(dir) {
        return;
    }
    if !node_allows(dir, user, Access::all()) {
        outcome.fail(path, FsError::permission_denied(path));
        return;
    }
    let Some(children) = dir.children_mut() else {
        return;
    };
    let names: Vec<String> = children.keys().cloned().collect();
    let mut removed = false;
    for name in names {
        let child_path = paths::join(path, &name);
        if let Some(child) = children.get_mut(&name) {
            if child.is_dir() {
                purge(child, &child_path, user, outcome);
            }
        }
        if children.get(&name).is_some_and(is_empty) {
            children.remove(&name);
            removed = true;
        }
    }
    if removed {
        dir.touch();
    }
}

fn clone_tree(
    node: &Node,
    path: &str,
    user: &Identity,
    opts: CopyOptions,
    outcome: &mut BatchOutcome,
) -> Option<Node> {
    let needed = if node.is_dir() {
        Access::READ_EXECUTE
    } else {
        Access::READ
    };
    if !node_allows(node, user, needed) {
        outcome.fail(path, FsError::permission_denied(path));
        return None;
    }

    let mut copy = match &node.data {
        NodeData::File { content } => Node::file(content.clone(), &user.name, user.primary_group()),
        NodeData::Directory { children } => {
            let mut dir = Node::directory(&user.name, user.primary_group());
            if let Some(out) = dir.children_mut() {
                for (name, child) in children {
                    let child_path = paths::join(path, name);
                    if let Some(c) = clone_tree(child, &child_path, user, opts, outcome) {
                        out.insert(name.clone(), c);
                    }
                }
            }
            dir
        }
    };
    copy.mode = node.mode;
    if opts.preserve {
        copy.mtime = node.mtime;
        if user.is_superuser() {
            copy.owner.clone_from(&node.owner);
            copy.group.clone_from(&node.group);
        }
    }
    Some(copy)
}

/// Copy a directory's children into an existing directory.
fn merge_into(
    dest: &mut Node,
    incoming: Node,
    path: &str,
    user: &Identity,
    opts: CopyOptions,
    outcome: &mut BatchOutcome,
) {
    if !node_allows(dest, user, Access::WRITE_EXECUTE) {
        outcome.fail(path, FsError::permission_denied(path));
        return;
    }
    let NodeData::Directory { children: incoming } = incoming.data else {
        return;
    };
    let Some(children) = dest.children_mut() else {
        return;
    };
    for (name, node) in incoming {
        let child_path = paths::join(path, &name);
        let existing = children.get(&name).map(Node::kind);
        match existing {
            Some(NodeKind::Directory) if node.is_dir() => {
                if let Some(dir) = children.get_mut(&name) {
                    merge_into(dir, node, &child_path, user, opts, outcome);
                }
            }
            Some(kind) => match check_replace_kind(kind, node.kind(), &child_path, opts.overwrite) {
                Ok(()) => {
                    children.insert(name, node);
                }
                Err(e) => outcome.fail(child_path, e),
            },
            None => {
                children.insert(name, node);
            }
        }
    }
    dest.touch();
}

fn check_replace_kind(existing: NodeKind, incoming: NodeKind, target: &str, overwrite: bool) -> FsResult<()> {
    match (existing, incoming) {
        (NodeKind::Directory, NodeKind::File) => Err(FsError::is_directory(target)),
        (NodeKind::File, NodeKind::Directory) => Err(FsError::not_directory(target)),
        _ if !overwrite => Err(FsError::already_exists(target)),
        _ => Ok(()),
    }
}
