//! Embed vsh in your Rust application, with a custom command and a
//! presenter that captures output.
//!
//! Run:  cargo run -p vsh --example embed

use std::sync::Arc;

use async_trait::async_trait;
use vsh::{
    ArgRule, BufferPresenter, Command, CommandResult, CommandSpec, ExecContext, ShellResult,
};

/// `greet NAME`: prints a greeting and records it in `$LAST_GREETED`.
struct Greet;

#[async_trait]
impl Command for Greet {
    fn spec(&self) -> CommandSpec {
        CommandSpec::new("greet", "Say hello", "greet NAME").args(ArgRule::exact(1))
    }

    async fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult {
        let name = ctx.args[0].clone();
        ctx.shell.set_var("LAST_GREETED", &name);
        CommandResult::output(format!("hello, {name} (from {})", ctx.user.name))
    }
}

fn print_lines(label: &str, presenter: &BufferPresenter) {
    println!("\n== {label} ==");
    for (line, kind) in presenter.take_lines() {
        println!("[{kind:?}] {line}");
    }
}

#[tokio::main]
async fn main() -> ShellResult<()> {
    let presenter = Arc::new(BufferPresenter::new());
    let shell = vsh::Shell::builder()
        .presenter(presenter.clone())
        .env("APP_NAME", "embed-demo")
        .command("greet", || Arc::new(Greet) as Arc<dyn Command>)
        .build()
        .await?;

    println!("vsh embedded demo");
    println!("APP_NAME from builder env: {:?}", shell.get_var("APP_NAME"));

    shell.execute("greet world").await;
    print_lines("custom command", &presenter);
    println!("LAST_GREETED: {:?}", shell.get_var("LAST_GREETED"));

    shell
        .execute("echo one > notes.txt && echo two >> notes.txt && cat notes.txt | wc -l")
        .await;
    print_lines("redirection and pipes", &presenter);

    let result = shell.execute("cat /etc/shadow").await;
    print_lines("permission denied", &presenter);
    println!("success: {}", result.success);

    shell.execute("sleep 1 &").await;
    shell.execute("ps").await;
    print_lines("background job", &presenter);

    shell.shutdown();
    Ok(())
}
