use bitflags::bitflags;

use crate::types::NodeKind;

bitflags! {
    /// Access classes, laid out like one octal digit of a Unix mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Access: u32 {
        const READ    = 0o4;
        const WRITE   = 0o2;
        const EXECUTE = 0o1;
    }
}

impl Access {
    pub const READ_WRITE: Self = Self::READ.union(Self::WRITE);
    pub const READ_EXECUTE: Self = Self::READ.union(Self::EXECUTE);
    pub const WRITE_EXECUTE: Self = Self::WRITE.union(Self::EXECUTE);

    /// Extract the triad granted by `mode` to one class.
    /// `shift` is 6 for the owner, 3 for the group and 0 for everyone else.
    #[must_use]
    pub fn from_mode(mode: u32, shift: u32) -> Self {
        Self::from_bits_truncate((mode >> shift) & 0o7)
    }

    #[must_use]
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if self.contains(Self::READ) {
            parts.push("read");
        }
        if self.contains(Self::WRITE) {
            parts.push("write");
        }
        if self.contains(Self::EXECUTE) {
            parts.push("execute");
        }
        parts.join("+")
    }
}

/// Render a mode as `ls -l` does, e.g. `drwxr-xr-x`.
#[must_use]
pub fn format_mode(kind: NodeKind, mode: u32) -> String {
    let mut out = String::with_capacity(10);
    out.push(match kind {
        NodeKind::Directory => 'd',
        NodeKind::File => '-',
    });
    for shift in [6, 3, 0] {
        let triad = Access::from_mode(mode, shift);
        out.push(if triad.contains(Access::READ) { 'r' } else { '-' });
        out.push(if triad.contains(Access::WRITE) { 'w' } else { '-' });
        out.push(if triad.contains(Access::EXECUTE) { 'x' } else { '-' });
    }
    out
}
