use crate::command::CommandSpec;
use crate::registry::CommandRegistry;

pub fn format_help(spec: &CommandSpec) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} - {}\n\n", spec.name, spec.summary));
    out.push_str(&format!("Usage: {}", spec.usage));
    if !spec.flags.is_empty() {
        out.push_str("\n\nOptions:");
        for flag in &spec.flags {
            out.push_str(&format!("\n  {:16} {}", flag.label(), flag.help));
        }
    }
    out
}

pub fn format_help_list(registry: &CommandRegistry) -> String {
    let mut out = String::new();
    out.push_str("vsh - virtual shell commands\n\n");
    out.push_str("Available commands:\n\n");

    for name in registry.names() {
        let summary = registry
            .get(name)
            .map(|command| command.spec().summary)
            .unwrap_or_default();
        out.push_str(&format!("  {name:12} {summary}\n"));
    }

    out.push_str("\nUse 'help COMMAND' or 'COMMAND --help' for more information.");
    out
}

pub fn wants_help(args: &[String]) -> bool {
    args.iter().any(|a| a == "--help")
}
