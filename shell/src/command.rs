//! Command definitions: the trait every command implements and the
//! declarative spec the dispatcher checks before running it.

use std::collections::HashMap;

use async_trait::async_trait;
use vsh_core::ResolveOptions;
use vsh_sdk::{Access, NodeKind};

use crate::context::ExecContext;
use crate::result::CommandResult;

#[async_trait]
pub trait Command: Send + Sync {
    fn spec(&self) -> CommandSpec;

    /// Core logic. Flags are parsed, argument counts validated, declared
    /// paths resolved and permissions checked by the time this runs.
    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    /// Key the flag is stored under, e.g. `"recursive"`.
    pub name: &'static str,
    pub short: Option<char>,
    pub long: Option<&'static str>,
    pub takes_value: bool,
    pub help: &'static str,
}

impl FlagSpec {
    #[must_use]
    pub fn new(name: &'static str, short: char, help: &'static str) -> Self {
        Self {
            name,
            short: Some(short),
            long: None,
            takes_value: false,
            help,
        }
    }

    #[must_use]
    pub fn long(mut self, long: &'static str) -> Self {
        self.long = Some(long);
        self
    }

    #[must_use]
    pub fn value(mut self) -> Self {
        self.takes_value = true;
        self
    }

    /// `-x, --long VALUE` as shown by `help`.
    #[must_use]
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if let Some(short) = self.short {
            parts.push(format!("-{short}"));
        }
        if let Some(long) = self.long {
            parts.push(format!("--{long}"));
        }
        let mut label = parts.join(", ");
        if self.takes_value {
            label.push_str(" VALUE");
        }
        label
    }
}

/// Positional argument count after flags are removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgRule {
    pub min: usize,
    pub max: Option<usize>,
    /// Replaces the generated message when the count is wrong.
    pub message: Option<&'static str>,
}

impl Default for ArgRule {
    fn default() -> Self {
        Self::any()
    }
}

impl ArgRule {
    #[must_use]
    pub const fn any() -> Self {
        Self {
            min: 0,
            max: None,
            message: None,
        }
    }

    #[must_use]
    pub const fn exact(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
            message: None,
        }
    }

    #[must_use]
    pub const fn at_least(n: usize) -> Self {
        Self {
            min: n,
            max: None,
            message: None,
        }
    }

    #[must_use]
    pub const fn between(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
            message: None,
        }
    }

    #[must_use]
    pub const fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }

    /// Error text for `count`, or `None` if it is acceptable.
    #[must_use]
    pub fn check(&self, count: usize) -> Option<String> {
        let ok = count >= self.min && self.max.map_or(true, |max| count <= max);
        if ok {
            return None;
        }
        if let Some(message) = self.message {
            return Some(message.to_string());
        }
        Some(match self.max {
            Some(max) if max == self.min => format!(
                "expected {max} argument{}, got {count}",
                if max == 1 { "" } else { "s" }
            ),
            Some(max) if count > max => format!("too many arguments (at most {max})"),
            _ if count == 0 => "missing operand".to_string(),
            _ => format!("expected at least {} arguments, got {count}", self.min),
        })
    }
}

/// Which positional arguments a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSelector {
    Index(usize),
    /// Every argument from this index on.
    From(usize),
    /// Every argument but the last.
    AllButLast,
    Last,
}

impl ArgSelector {
    pub const ALL: Self = Self::From(0);

    #[must_use]
    pub fn indices(self, len: usize) -> Vec<usize> {
        match self {
            Self::Index(i) if i < len => vec![i],
            Self::Index(_) => Vec::new(),
            Self::From(start) => (start..len).collect(),
            Self::AllButLast => (0..len.saturating_sub(1)).collect(),
            Self::Last => len.checked_sub(1).into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    pub args: ArgSelector,
    pub options: ResolveOptions,
}

/// Which node a permission rule is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionTarget {
    Node,
    Parent,
    /// The node when it exists, else its parent.
    NodeOrParent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRule {
    pub args: ArgSelector,
    pub access: Access,
    pub target: PermissionTarget,
}

/// Everything the dispatcher needs to know about a command.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub name: &'static str,
    pub summary: &'static str,
    pub usage: &'static str,
    pub flags: Vec<FlagSpec>,
    pub args: ArgRule,
    pub paths: Vec<PathRule>,
    pub permissions: Vec<PermissionRule>,
}

impl CommandSpec {
    #[must_use]
    pub fn new(name: &'static str, summary: &'static str, usage: &'static str) -> Self {
        Self {
            name,
            summary,
            usage,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn flag(mut self, flag: FlagSpec) -> Self {
        self.flags.push(flag);
        self
    }

    #[must_use]
    pub fn args(mut self, rule: ArgRule) -> Self {
        self.args = rule;
        self
    }

    #[must_use]
    pub fn path(mut self, args: ArgSelector, options: ResolveOptions) -> Self {
        self.paths.push(PathRule { args, options });
        self
    }

    #[must_use]
    pub fn permission(mut self, args: ArgSelector, access: Access, target: PermissionTarget) -> Self {
        self.permissions.push(PermissionRule {
            args,
            access,
            target,
        });
        self
    }

    /// Shorthand: the argument must be an existing file the user can read.
    #[must_use]
    pub fn readable_files(self, args: ArgSelector) -> Self {
        self.path(args, ResolveOptions::default().expect(NodeKind::File))
            .permission(args, Access::READ, PermissionTarget::Node)
    }

    fn find_short(&self, c: char) -> Option<&FlagSpec> {
        self.flags.iter().find(|f| f.short == Some(c))
    }

    fn find_long(&self, name: &str) -> Option<&FlagSpec> {
        self.flags.iter().find(|f| f.long == Some(name))
    }

    /// Split `raw` into recognised flags and positional arguments.
    ///
    /// `--` ends flag parsing. A cluster like `-rf` is taken apart only if
    /// every letter up to the first value-taking flag is known, so `-n2` and
    /// `-rd2024` carry their values; anything else starting with `-` stays
    /// positional, so `find . -name x` and `echo -5` pass through.
    pub fn parse_flags(&self, raw: &[String]) -> Result<(Flags, Vec<String>), String> {
        let mut flags = Flags::default();
        let mut positional = Vec::new();
        let mut iter = raw.iter().peekable();

        while let Some(arg) = iter.next() {
            if arg == "--" {
                positional.extend(iter.cloned());
                break;
            }

            if let Some(long) = arg.strip_prefix("--") {
                let (name, inline) = match long.split_once('=') {
                    Some((name, value)) => (name, Some(value.to_string())),
                    None => (long, None),
                };
                match self.find_long(name) {
                    Some(spec) if spec.takes_value => {
                        let value = inline
                            .or_else(|| iter.next().cloned())
                            .ok_or_else(|| format!("option '--{name}' requires a value"))?;
                        flags.set(spec.name, Some(value));
                    }
                    Some(spec) => flags.set(spec.name, None),
                    None => positional.push(arg.clone()),
                }
                continue;
            }

            let Some(cluster) = arg.strip_prefix('-').filter(|c| !c.is_empty()) else {
                positional.push(arg.clone());
                continue;
            };

            // Left to right; a value-taking flag takes the rest of the
            // cluster, or the next argument when nothing is left
            let mut found: Vec<(&FlagSpec, Option<String>)> = Vec::new();
            let mut wants_next = None;
            let mut known = true;
            for (i, c) in cluster.char_indices() {
                let Some(spec) = self.find_short(c) else {
                    known = false;
                    break;
                };
                if spec.takes_value {
                    let rest = &cluster[i + c.len_utf8()..];
                    if rest.is_empty() {
                        wants_next = Some(spec);
                    } else {
                        found.push((spec, Some(rest.to_string())));
                    }
                    break;
                }
                found.push((spec, None));
            }
            if !known {
                positional.push(arg.clone());
                continue;
            }

            for (spec, value) in found {
                flags.set(spec.name, value);
            }
            if let Some(spec) = wants_next {
                let value = iter.next().cloned().ok_or_else(|| {
                    format!("option '-{}' requires a value", spec.short.unwrap_or('?'))
                })?;
                flags.set(spec.name, Some(value));
            }
        }
        Ok((flags, positional))
    }
}

/// Flags recognised for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    values: HashMap<&'static str, Option<String>>,
}

impl Flags {
    pub fn set(&mut self, name: &'static str, value: Option<String>) {
        self.values.insert(name, value);
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Option::as_deref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn rm_spec() -> CommandSpec {
        CommandSpec::new("rm", "remove", "rm [-rf] PATH...")
            .flag(FlagSpec::new("recursive", 'r', "recurse").long("recursive"))
            .flag(FlagSpec::new("force", 'f', "force"))
            .flag(FlagSpec::new("date", 'd', "date").value())
    }

    #[test]
    fn clustered_short_flags() {
        let (flags, rest) = rm_spec().parse_flags(&args(&["-rf", "dir"])).unwrap();
        assert!(flags.has("recursive") && flags.has("force"));
        assert_eq!(rest, vec!["dir"]);
    }

    #[test]
    fn unknown_dash_args_stay_positional() {
        let (flags, rest) = rm_spec().parse_flags(&args(&["-rx", "-5", "-"])).unwrap();
        assert!(!flags.has("recursive"));
        assert_eq!(rest, vec!["-rx", "-5", "-"]);
    }

    #[test]
    fn double_dash_ends_flags() {
        let (flags, rest) = rm_spec().parse_flags(&args(&["--", "-r"])).unwrap();
        assert!(!flags.has("recursive"));
        assert_eq!(rest, vec!["-r"]);
    }

    #[test]
    fn long_flags_and_values() {
        let spec = rm_spec();
        let (flags, _) = spec.parse_flags(&args(&["--recursive", "-d", "2024-01-01"])).unwrap();
        assert!(flags.has("recursive"));
        assert_eq!(flags.value("date"), Some("2024-01-01"));

        let (flags, _) = spec.parse_flags(&args(&["-rd2024"])).unwrap();
        assert!(flags.has("recursive"));
        assert_eq!(flags.value("date"), Some("2024"));

        // Letters after a value-taking flag are its value, known or not
        let (flags, rest) = spec.parse_flags(&args(&["-dr", "x"])).unwrap();
        assert_eq!(flags.value("date"), Some("r"));
        assert!(!flags.has("recursive"));
        assert_eq!(rest, vec!["x"]);

        let (flags, rest) = spec.parse_flags(&args(&["-xd1"])).unwrap();
        assert!(!flags.has("date"));
        assert_eq!(rest, vec!["-xd1"]);

        assert!(spec.parse_flags(&args(&["-d"])).is_err());
    }

    #[test]
    fn arg_rule_messages() {
        assert_eq!(ArgRule::exact(1).check(1), None);
        assert_eq!(
            ArgRule::exact(2).check(1).unwrap(),
            "expected 2 arguments, got 1"
        );
        assert_eq!(ArgRule::at_least(1).check(0).unwrap(), "missing operand");
        assert_eq!(
            ArgRule::between(0, 1).check(3).unwrap(),
            "too many arguments (at most 1)"
        );
        assert_eq!(
            ArgRule::exact(1).with_message("usage: kill ID").check(0).unwrap(),
            "usage: kill ID"
        );
    }

    #[test]
    fn selectors() {
        assert_eq!(ArgSelector::ALL.indices(3), vec![0, 1, 2]);
        assert_eq!(ArgSelector::AllButLast.indices(3), vec![0, 1]);
        assert_eq!(ArgSelector::Last.indices(3), vec![2]);
        assert_eq!(ArgSelector::Last.indices(0), Vec::<usize>::new());
        assert_eq!(ArgSelector::Index(5).indices(3), Vec::<usize>::new());
    }
}
