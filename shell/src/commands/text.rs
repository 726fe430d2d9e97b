//! Text utilities. Each reads the named files or, with none, the previous
//! pipeline stage's output.

use async_trait::async_trait;
use regex::RegexBuilder;
use vsh_core::ResolveOptions;
use vsh_sdk::Access;

use super::display_path;
use crate::command::{ArgRule, ArgSelector, Command, CommandSpec, FlagSpec, PermissionTarget};
use crate::context::ExecContext;
use crate::result::CommandResult;
use crate::utils::{interpret_escape_sequences, split_lines};

/// A named file or stdin (`name: None`) with its content.
struct Input {
    name: Option<String>,
    text: String,
}

/// Read the resolved file arguments from `first` on, or stdin when there
/// are none.
fn inputs(ctx: &mut ExecContext<'_>, first: usize) -> Result<Vec<Input>, CommandResult> {
    if ctx.args.len() <= first {
        return Ok(vec![Input {
            name: None,
            text: ctx.stdin.take().unwrap_or_default(),
        }]);
    }
    let mut inputs = Vec::new();
    for index in first..ctx.args.len() {
        let Some(path) = ctx.path(index) else {
            continue;
        };
        let text = ctx
            .vfs()
            .read_file(path, &ctx.user)
            .map_err(|e| CommandResult::failure(ctx.error(e)))?;
        inputs.push(Input {
            name: Some(ctx.args[index].clone()),
            text,
        });
    }
    Ok(inputs)
}

fn count_flag(ctx: &ExecContext<'_>, default: usize) -> Result<usize, CommandResult> {
    match ctx.flag_value("lines") {
        Some(raw) => raw.parse().map_err(|_| {
            CommandResult::failure(ctx.error(format!("invalid number of lines: '{raw}'")))
        }),
        None => Ok(default),
    }
}

pub struct Echo;

#[async_trait]
impl Command for Echo {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("echo", "Print arguments", "echo [-e] [TEXT]...")
            .flag(FlagSpec::new("escapes", 'e', "Interpret \\n, \\t and \\\\"))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let text = ctx.args.join(" ");
        if ctx.flag("escapes") {
            CommandResult::output(interpret_escape_sequences(&text))
        } else {
            CommandResult::output(text)
        }
    }
}

pub struct Grep;

impl Grep {
    fn matching<'a>(
        regex: &'a regex::Regex,
        text: &'a str,
        invert: bool,
    ) -> impl Iterator<Item = (usize, String)> + 'a {
        split_lines(text)
            .into_iter()
            .enumerate()
            .filter(move |(_, line)| regex.is_match(line) != invert)
            .map(|(i, line)| (i + 1, line.to_string()))
    }

    /// Files under each argument, recursing into directories.
    fn collect_recursive(ctx: &ExecContext<'_>, errors: &mut Vec<String>) -> Vec<Input> {
        let mut files = Vec::new();
        for index in 1..ctx.args.len() {
            let raw = &ctx.args[index];
            let Some(resolution) = ctx.resolution(index) else {
                continue;
            };
            let walk = match ctx.vfs().walk(&resolution.path, &ctx.user) {
                Ok(walk) => walk,
                Err(e) => {
                    errors.push(ctx.error(e));
                    continue;
                }
            };
            for denied in walk.denied {
                errors.push(ctx.error(format!("{denied}: Permission denied")));
            }
            for entry in walk.entries.into_iter().filter(|e| e.is_file()) {
                let shown = display_path(raw, &resolution.path, &entry.path);
                match ctx.vfs().read_file(&entry.path, &ctx.user) {
                    Ok(text) => files.push(Input {
                        name: Some(shown),
                        text,
                    }),
                    Err(e) => errors.push(ctx.error(e)),
                }
            }
        }
        files
    }
}

#[async_trait]
impl Command for Grep {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("grep", "Print lines matching a pattern", "grep [-ivncR] PATTERN [FILE]...")
            .flag(FlagSpec::new("ignore-case", 'i', "Case-insensitive match").long("ignore-case"))
            .flag(FlagSpec::new("invert", 'v', "Select non-matching lines").long("invert-match"))
            .flag(FlagSpec::new("line-number", 'n', "Prefix lines with their number").long("line-number"))
            .flag(FlagSpec::new("count", 'c', "Print only a count of matching lines").long("count"))
            .flag(FlagSpec::new("recursive", 'R', "Search directories recursively").long("recursive"))
            .args(ArgRule::at_least(1).with_message("missing pattern"))
            .path(ArgSelector::From(1), ResolveOptions::default())
            .permission(ArgSelector::From(1), Access::READ, PermissionTarget::Node)
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let regex = match RegexBuilder::new(&ctx.args[0])
            .case_insensitive(ctx.flag("ignore-case"))
            .build()
        {
            Ok(regex) => regex,
            Err(e) => return CommandResult::failure(ctx.error(format!("invalid pattern: {e}"))),
        };
        let invert = ctx.flag("invert");
        let numbered = ctx.flag("line-number");
        let count_only = ctx.flag("count");
        let recursive = ctx.flag("recursive");

        let mut errors = Vec::new();
        let sources = if recursive && ctx.args.len() > 1 {
            Self::collect_recursive(ctx, &mut errors)
        } else {
            if let Some(index) = (1..ctx.args.len())
                .find(|&i| ctx.resolution(i).is_some_and(|r| r.node.as_ref().is_some_and(|n| n.is_dir())))
            {
                return CommandResult::failure(ctx.error(format!("{}: Is a directory", ctx.args[index])));
            }
            match inputs(ctx, 1) {
                Ok(sources) => sources,
                Err(result) => return result,
            }
        };

        let prefix_names = recursive || sources.len() > 1;
        let mut lines = Vec::new();
        for source in &sources {
            let prefix = match (&source.name, prefix_names) {
                (Some(name), true) => format!("{name}:"),
                _ => String::new(),
            };
            if count_only {
                let count = Self::matching(&regex, &source.text, invert).count();
                lines.push(format!("{prefix}{count}"));
                continue;
            }
            for (number, line) in Self::matching(&regex, &source.text, invert) {
                if numbered {
                    lines.push(format!("{prefix}{number}:{line}"));
                } else {
                    lines.push(format!("{prefix}{line}"));
                }
            }
        }

        let output = lines.join("\n");
        if errors.is_empty() {
            CommandResult::output(output)
        } else {
            CommandResult {
                success: false,
                output: Some(output).filter(|o| !o.is_empty()),
                ..CommandResult::failure(errors.join("\n"))
            }
        }
    }
}

/// Shared by `head` and `tail`: print `==> name <==` headers when there
/// is more than one input.
fn with_headers(sources: &[Input], body: impl Fn(&str) -> Vec<String>) -> String {
    let headers = sources.len() > 1;
    let mut blocks = Vec::new();
    for source in sources {
        let mut block = Vec::new();
        if headers {
            block.push(format!("==> {} <==", source.name.as_deref().unwrap_or("-")));
        }
        block.extend(body(&source.text));
        blocks.push(block.join("\n"));
    }
    blocks.join(if headers { "\n\n" } else { "\n" })
}

pub struct Head;

#[async_trait]
impl Command for Head {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("head", "Print the first lines of input", "head [-n N] [FILE]...")
            .flag(FlagSpec::new("lines", 'n', "Number of lines (default 10)").long("lines").value())
            .readable_files(ArgSelector::ALL)
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let count = match count_flag(ctx, 10) {
            Ok(count) => count,
            Err(result) => return result,
        };
        let sources = match inputs(ctx, 0) {
            Ok(sources) => sources,
            Err(result) => return result,
        };
        CommandResult::output(with_headers(&sources, |text| {
            split_lines(text).into_iter().take(count).map(String::from).collect()
        }))
    }
}

pub struct Tail;

#[async_trait]
impl Command for Tail {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("tail", "Print the last lines of input", "tail [-n N] [FILE]...")
            .flag(FlagSpec::new("lines", 'n', "Number of lines (default 10)").long("lines").value())
            .readable_files(ArgSelector::ALL)
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let count = match count_flag(ctx, 10) {
            Ok(count) => count,
            Err(result) => return result,
        };
        let sources = match inputs(ctx, 0) {
            Ok(sources) => sources,
            Err(result) => return result,
        };
        CommandResult::output(with_headers(&sources, |text| {
            let lines = split_lines(text);
            let skip = lines.len().saturating_sub(count);
            lines.into_iter().skip(skip).map(String::from).collect()
        }))
    }
}

pub struct Wc;

#[async_trait]
impl Command for Wc {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("wc", "Count lines, words and bytes", "wc [-lwc] [FILE]...")
            .flag(FlagSpec::new("lines", 'l', "Count lines").long("lines"))
            .flag(FlagSpec::new("words", 'w', "Count words").long("words"))
            .flag(FlagSpec::new("bytes", 'c', "Count bytes").long("bytes"))
            .readable_files(ArgSelector::ALL)
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let (mut lines, mut words, mut bytes) =
            (ctx.flag("lines"), ctx.flag("words"), ctx.flag("bytes"));
        if !(lines || words || bytes) {
            (lines, words, bytes) = (true, true, true);
        }
        let sources = match inputs(ctx, 0) {
            Ok(sources) => sources,
            Err(result) => return result,
        };

        let format = |counts: [usize; 3], name: Option<&str>| {
            let mut fields: Vec<String> = [lines, words, bytes]
                .iter()
                .zip(counts)
                .filter(|(on, _)| **on)
                .map(|(_, n)| n.to_string())
                .collect();
            if let Some(name) = name {
                fields.push(name.to_string());
            }
            fields.join(" ")
        };

        let mut total = [0; 3];
        let mut out = Vec::new();
        for source in &sources {
            let counts = [
                split_lines(&source.text).len(),
                source.text.split_whitespace().count(),
                source.text.len(),
            ];
            for (sum, n) in total.iter_mut().zip(counts) {
                *sum += n;
            }
            out.push(format(counts, source.name.as_deref()));
        }
        if sources.len() > 1 {
            out.push(format(total, Some("total")));
        }
        CommandResult::output(out.join("\n"))
    }
}

pub struct Sort;

#[async_trait]
impl Command for Sort {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("sort", "Sort lines", "sort [-rnu] [FILE]...")
            .flag(FlagSpec::new("reverse", 'r', "Reverse the order").long("reverse"))
            .flag(FlagSpec::new("numeric", 'n', "Compare by leading number").long("numeric-sort"))
            .flag(FlagSpec::new("unique", 'u', "Drop repeated lines").long("unique"))
            .readable_files(ArgSelector::ALL)
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let sources = match inputs(ctx, 0) {
            Ok(sources) => sources,
            Err(result) => return result,
        };
        let mut lines: Vec<&str> = sources
            .iter()
            .flat_map(|s| split_lines(&s.text))
            .collect();

        if ctx.flag("numeric") {
            let key = |line: &str| leading_number(line).unwrap_or(f64::NEG_INFINITY);
            lines.sort_by(|a, b| key(*a).total_cmp(&key(*b)).then_with(|| a.cmp(b)));
        } else {
            lines.sort_unstable();
        }
        if ctx.flag("unique") {
            lines.dedup();
        }
        if ctx.flag("reverse") {
            lines.reverse();
        }
        CommandResult::output(lines.join("\n"))
    }
}

fn leading_number(line: &str) -> Option<f64> {
    let trimmed = line.trim_start();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && c == '-')))
        .map_or(trimmed.len(), |(i, _)| i);
    trimmed[..end].parse().ok()
}

pub struct Uniq;

#[async_trait]
impl Command for Uniq {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("uniq", "Collapse adjacent repeated lines", "uniq [-c] [FILE]")
            .flag(FlagSpec::new("count", 'c', "Prefix lines with their repeat count").long("count"))
            .args(ArgRule::between(0, 1))
            .readable_files(ArgSelector::ALL)
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let sources = match inputs(ctx, 0) {
            Ok(sources) => sources,
            Err(result) => return result,
        };
        let mut runs: Vec<(usize, &str)> = Vec::new();
        for line in sources.iter().flat_map(|s| split_lines(&s.text)) {
            match runs.last_mut() {
                Some((count, last)) if *last == line => *count += 1,
                _ => runs.push((1, line)),
            }
        }
        let counted = ctx.flag("count");
        let lines: Vec<String> = runs
            .into_iter()
            .map(|(count, line)| {
                if counted {
                    format!("{count:>7} {line}")
                } else {
                    line.to_string()
                }
            })
            .collect();
        CommandResult::output(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_numbers() {
        assert_eq!(leading_number("10 apples"), Some(10.0));
        assert_eq!(leading_number("  -2.5x"), Some(-2.5));
        assert_eq!(leading_number("apples"), None);
    }

    #[test]
    fn headers_only_for_several_inputs() {
        let one = [Input {
            name: Some("a".into()),
            text: "1\n2".into(),
        }];
        assert_eq!(with_headers(&one, |t| vec![t.to_string()]), "1\n2");

        let two = [
            Input {
                name: Some("a".into()),
                text: "x".into(),
            },
            Input {
                name: Some("b".into()),
                text: "y".into(),
            },
        ];
        assert_eq!(
            with_headers(&two, |t| vec![t.to_string()]),
            "==> a <==\nx\n\n==> b <==\ny"
        );
    }

    #[test]
    fn grep_matching_lines() {
        let regex = regex::Regex::new("o").unwrap();
        let hits: Vec<_> = Grep::matching(&regex, "one\ntwo\nthree\n", false).collect();
        assert_eq!(hits, vec![(1, "one".to_string()), (2, "two".to_string())]);
        let misses: Vec<_> = Grep::matching(&regex, "one\ntwo\nthree", true).collect();
        assert_eq!(misses, vec![(3, "three".to_string())]);
    }
}
