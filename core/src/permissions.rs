use vsh_sdk::{Access, Identity, Node, NodeInfo};

/// Owner bits apply to the owner, group bits to members of the node's
/// group, other bits to everyone else. The superuser bypasses the check.
#[must_use]
pub fn allows(owner: &str, group: &str, mode: u32, user: &Identity, access: Access) -> bool {
    if user.is_superuser() {
        return true;
    }
    let shift = if user.name == owner {
        6
    } else if user.in_group(group) {
        3
    } else {
        0
    };
    Access::from_mode(mode, shift).contains(access)
}

#[must_use]
pub fn has_permission(info: &NodeInfo, user: &Identity, access: Access) -> bool {
    allows(&info.owner, &info.group, info.mode, user, access)
}

pub(crate) fn node_allows(node: &Node, user: &Identity, access: Access) -> bool {
    allows(&node.owner, &node.group, node.mode, user, access)
}

/// Only the owner or the superuser may change a node's mode.
#[must_use]
pub fn may_chmod(owner: &str, user: &Identity) -> bool {
    user.is_superuser() || user.name == owner
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest() -> Identity {
        Identity::new("guest", vec!["guest".into(), "staff".into()])
    }

    #[test]
    fn owner_group_other_bits() {
        let info = Node::file("", "guest", "guest").with_mode(0o640).info("/f");
        assert!(has_permission(&info, &guest(), Access::READ_WRITE));

        let info = Node::file("", "alice", "staff").with_mode(0o640).info("/f");
        assert!(has_permission(&info, &guest(), Access::READ));
        assert!(!has_permission(&info, &guest(), Access::WRITE));

        let info = Node::file("", "alice", "alice").with_mode(0o640).info("/f");
        assert!(!has_permission(&info, &guest(), Access::READ));
    }

    #[test]
    fn owner_bits_win_over_other_bits() {
        let info = Node::file("", "guest", "guest").with_mode(0o077).info("/f");
        assert!(!has_permission(&info, &guest(), Access::READ));
    }

    #[test]
    fn superuser_bypasses() {
        let info = Node::file("", "alice", "alice").with_mode(0o000).info("/f");
        assert!(has_permission(&info, &Identity::root(), Access::all()));
    }

    #[test]
    fn chmod_rights() {
        assert!(may_chmod("guest", &guest()));
        assert!(!may_chmod("alice", &guest()));
        assert!(may_chmod("alice", &Identity::root()));
    }
}
