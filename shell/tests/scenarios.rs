//! End-to-end scenarios driving a `Shell` with a capturing presenter.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vsh::{BufferPresenter, ExecOptions, MessageType, Shell};
use vsh_core::{Accounts, JsonFileStore, MemoryStore};
use vsh_sdk::{Identity, Store};

struct Session {
    shell: Shell,
    presenter: Arc<BufferPresenter>,
    store: Arc<MemoryStore>,
}

async fn login(user: &str) -> Session {
    let presenter = Arc::new(BufferPresenter::new());
    let store = Arc::new(MemoryStore::new());
    let shell = Shell::builder()
        .store(store.clone())
        .presenter(presenter.clone())
        .user(user)
        .build()
        .await
        .unwrap();
    Session {
        shell,
        presenter,
        store,
    }
}

fn batch() -> ExecOptions {
    ExecOptions::batch(CancellationToken::new())
}

#[tokio::test]
async fn redirected_output_reads_back() {
    let s = login("root").await;
    let result = s.shell.execute("echo hi > /home/x.txt").await;
    assert!(result.success);
    assert!(s.presenter.lines().is_empty(), "redirected output is not shown");

    let result = s.shell.execute("cat /home/x.txt").await;
    assert_eq!(result.output.as_deref(), Some("hi"));
    assert_eq!(s.presenter.contents(), "hi");
}

#[tokio::test]
async fn truncate_and_append() {
    let s = login("guest").await;
    s.shell.execute("echo one > f.txt").await;
    s.shell.execute("echo two >> f.txt").await;
    let result = s.shell.execute("cat f.txt").await;
    assert_eq!(result.output.as_deref(), Some("one\ntwo"));

    s.shell.execute("echo three > f.txt").await;
    let result = s.shell.execute("cat f.txt").await;
    assert_eq!(result.output.as_deref(), Some("three"));
}

#[tokio::test]
async fn pipes_pass_exact_output() {
    let s = login("guest").await;
    let result = s.shell.execute("echo hello | wc -c").await;
    assert_eq!(result.output.as_deref(), Some("5"));

    // Empty output still reaches the next stage
    let result = s.shell.execute("echo \"\" | wc -c").await;
    assert_eq!(result.output.as_deref(), Some("0"));
}

#[tokio::test]
async fn input_redirection_feeds_the_pipeline() {
    let s = login("guest").await;
    s.shell.execute("echo b > in.txt; echo a >> in.txt").await;

    let result = s.shell.execute("cat < in.txt | wc -l").await;
    assert_eq!(result.output.as_deref(), Some("2"));
    let result = s.shell.execute("sort < in.txt | head -n 1").await;
    assert_eq!(result.output.as_deref(), Some("a"));
    let result = s.shell.execute("< in.txt sort").await;
    assert_eq!(result.output.as_deref(), Some("a\nb"));
}

#[tokio::test]
async fn pipeline_failure_names_the_command() {
    let s = login("guest").await;
    let result = s.shell.execute("cat missing.txt | wc -l").await;
    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.starts_with("pipeline failed at 'cat'"), "{error}");
}

#[tokio::test]
async fn mkdir_parents_is_idempotent() {
    let s = login("guest").await;
    assert!(s.shell.execute("mkdir -p a/b/c").await.success);
    let again = s.shell.execute("mkdir -p a/b/c").await;
    assert!(again.success);
    assert_eq!(again.message_type, Some(MessageType::Info));

    let result = s.shell.execute("ls a/b").await;
    assert_eq!(result.output.as_deref(), Some("c"));
}

#[tokio::test]
async fn recursive_rm_needs_force_when_not_interactive() {
    let s = login("guest").await;
    s.shell.execute("mkdir -p dir/sub").await;
    s.shell.execute("touch dir/sub/f").await;

    let result = s.shell.execute_with("rm -r dir", &batch()).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("confirmation required"));
    assert!(s.shell.execute("ls dir").await.success);

    let result = s.shell.execute_with("rm -rf dir", &batch()).await;
    assert!(result.success);
    assert!(!s.shell.execute("ls dir").await.success);
}

#[tokio::test]
async fn interactive_rm_asks_first() {
    let s = login("guest").await;
    s.shell.execute("mkdir -p keep/sub").await;

    s.presenter.push_confirmation(false);
    s.shell.execute("rm -r keep").await;
    assert!(s.shell.execute("ls keep").await.success);

    s.presenter.push_confirmation(true);
    s.shell.execute("rm -r keep").await;
    assert!(!s.shell.execute("ls keep").await.success);
}

#[tokio::test]
async fn sequencing_operators() {
    let s = login("guest").await;
    let result = s.shell.execute("cat nope && echo yes || echo no").await;
    assert_eq!(result.output.as_deref(), Some("no"));
    let contents = s.presenter.contents();
    assert!(!contents.contains("yes"));

    let result = s.shell.execute("echo a; echo b").await;
    assert_eq!(result.output.as_deref(), Some("b"));
    assert!(s.presenter.contents().ends_with("a\nb"));
}

#[tokio::test]
async fn syntax_errors_are_reported() {
    let s = login("guest").await;
    let result = s.shell.execute("echo hi &&").await;
    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("syntax error"));

    let result = s.shell.execute("echo \"open").await;
    assert!(!result.success);
}

#[tokio::test]
async fn kill_removes_job_at_once() {
    let s = login("guest").await;
    let result = s.shell.execute("sleep 10 &").await;
    assert!(result.success);
    assert!(result.output.unwrap().contains("sleep 10"));
    assert!(s.shell.jobs().contains(1));

    let ps = s.shell.execute("ps").await;
    assert!(ps.output.unwrap().contains("sleep 10"));

    assert!(s.shell.execute("kill 1").await.success);
    assert!(!s.shell.jobs().contains(1));
    let ps = s.shell.execute("ps").await;
    assert!(!ps.output.unwrap().contains("sleep 10"));

    assert!(!s.shell.execute("kill 99").await.success);
}

#[tokio::test]
async fn finished_job_reports_status() {
    let s = login("guest").await;
    s.shell.execute("echo done > bg.txt &").await;

    for _ in 0..100 {
        if s.presenter.contents().contains("Done") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(s.presenter.contents().contains("[1] Done"));
    assert!(s.shell.jobs().list().is_empty());
    let result = s.shell.execute("cat bg.txt").await;
    assert_eq!(result.output.as_deref(), Some("done"));
}

#[tokio::test]
async fn cancelled_line_does_not_run() {
    let s = login("guest").await;
    let token = CancellationToken::new();
    token.cancel();
    let result = s
        .shell
        .execute_with("touch never", &ExecOptions::interactive(token))
        .await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Cancelled"));
    assert!(!s.shell.execute("ls never").await.success);
}

#[tokio::test]
async fn background_output_is_not_shown() {
    let s = login("guest").await;
    let result = s.shell.execute("echo hi &").await;
    assert_eq!(result.output.as_deref(), Some("[1] echo hi"));

    for _ in 0..100 {
        if s.presenter.contents().contains("Done") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let lines: Vec<String> = s.presenter.lines().into_iter().map(|(text, _)| text).collect();
    assert_eq!(lines, vec!["[1] echo hi", "[1] Done: echo hi"]);
}

#[tokio::test]
async fn cancelling_stops_a_running_script() {
    let s = login("guest").await;
    s.shell
        .execute("echo \"sleep 5\" > slow.sh; echo \"touch after\" >> slow.sh; chmod 755 slow.sh")
        .await;

    let token = CancellationToken::new();
    let options = ExecOptions::batch(token.clone());
    let shell = s.shell.clone();
    let running = tokio::spawn(async move { shell.execute_with("run slow.sh", &options).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .unwrap()
        .unwrap();
    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("line 1: sleep 5"), "{error}");
    assert!(error.contains("Cancelled"), "{error}");
    assert!(!s.shell.execute("ls after").await.success);
}

#[tokio::test]
async fn sleep_rejects_bad_intervals() {
    let s = login("guest").await;
    for interval in ["1e300", "-1", "soon", "inf"] {
        let result = s.shell.execute(&format!("sleep {interval}")).await;
        assert!(!result.success, "{interval}");
        assert!(result.error.unwrap().contains("invalid time interval"));
    }
}

#[tokio::test]
async fn script_line_answers_password_prompt() {
    let s = login("root").await;
    s.shell
        .vfs()
        .create_file(
            "/root/setup.sh",
            "# create bob\nuseradd bob\nsecret\n\nsu bob\nwhoami\n",
            &Identity::root(),
        )
        .unwrap();
    s.shell.execute("chmod 700 /root/setup.sh").await;

    let result = s.shell.execute("run /root/setup.sh").await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(s.shell.user().name, "bob");
    assert_eq!(s.shell.cwd(), "/home/bob");

    let contents = s.presenter.contents();
    assert!(contents.contains("bob"));
    assert!(!contents.contains("command not found"));

    let accounts = Accounts::load(s.shell.vfs()).unwrap();
    assert!(accounts.verify_password("bob", "secret"));
    assert!(!accounts.verify_password("bob", "wrong"));
}

#[tokio::test]
async fn script_stops_at_failing_line() {
    let s = login("guest").await;
    s.shell
        .execute("echo \"echo first\" > s.sh; echo frobnicate >> s.sh; echo \"echo last\" >> s.sh")
        .await;
    s.shell.execute("chmod 755 s.sh").await;
    s.presenter.take_lines();

    let result = s.shell.execute("run s.sh").await;
    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("line 2: frobnicate"), "{error}");
    let contents = s.presenter.contents();
    assert!(contents.contains("first"));
    assert!(!contents.contains("last"));
}

#[tokio::test]
async fn script_positional_arguments() {
    let s = login("guest").await;
    s.shell.execute("echo 'echo $# $1' > args.sh").await;
    s.shell.execute("chmod 755 args.sh").await;
    s.presenter.take_lines();

    assert!(s.shell.execute("run args.sh alpha beta").await.success);
    assert_eq!(s.presenter.contents(), "2 alpha");
}

#[tokio::test]
async fn scripts_need_execute_permission() {
    let s = login("guest").await;
    s.shell.execute("echo pwd > plain.sh").await;
    s.shell.execute("chmod 644 plain.sh").await;
    let result = s.shell.execute("run plain.sh").await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("Permission denied"));
}

#[tokio::test]
async fn check_fail_inverts() {
    let s = login("guest").await;
    assert!(s.shell.execute("check_fail cat missing.txt").await.success);
    assert!(!s.shell.execute("check_fail echo hi").await.success);
    assert!(s.shell.execute("check_fail -z grep zzz /etc/passwd").await.success);
}

#[tokio::test]
async fn permissions_are_enforced() {
    let s = login("guest").await;
    let result = s.shell.execute("cat /etc/shadow").await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("Permission denied"));

    let result = s.shell.execute("echo x > /etc/passwd").await;
    assert!(!result.success);

    let result = s.shell.execute("mkdir /home/other").await;
    assert!(!result.success);
}

#[tokio::test]
async fn su_checks_passwords() {
    let s = login("root").await;
    s.presenter.push_answer("pw");
    assert!(s.shell.execute("useradd alice").await.success);
    assert!(s.shell.execute("su guest").await.success);
    assert_eq!(s.shell.user().name, "guest");

    s.presenter.push_answer("wrong");
    let result = s.shell.execute("su alice").await;
    assert!(!result.success);
    assert_eq!(s.shell.user().name, "guest");

    s.presenter.push_answer("pw");
    assert!(s.shell.execute("su alice").await.success);
    let result = s.shell.execute("whoami").await;
    assert_eq!(result.output.as_deref(), Some("alice"));
}

#[tokio::test]
async fn group_membership_grants_access() {
    let s = login("root").await;
    s.shell.execute("groupadd staff").await;
    s.shell.execute("usermod -aG staff guest").await;
    s.shell.execute("echo report > /tmp/r.txt").await;
    s.shell.execute("chgrp staff /tmp/r.txt").await;
    s.shell.execute("chmod 640 /tmp/r.txt").await;

    s.shell.execute("su guest").await;
    let groups = s.shell.execute("groups").await;
    assert!(groups.output.unwrap().contains("staff"));
    let result = s.shell.execute("cat /tmp/r.txt").await;
    assert_eq!(result.output.as_deref(), Some("report"));
}

#[tokio::test]
async fn globs_expand_in_cwd() {
    let s = login("guest").await;
    s.shell.execute("echo A > a.txt; echo B > b.txt; echo C > c.log").await;
    let result = s.shell.execute("cat *.txt").await;
    assert_eq!(result.output.as_deref(), Some("A\nB"));

    // Quoted patterns stay literal
    assert!(!s.shell.execute("cat '*.txt'").await.success);
}

#[tokio::test]
async fn aliases_and_variables() {
    let s = login("guest").await;
    s.shell.execute("alias greet='echo hello'").await;
    let result = s.shell.execute("greet world").await;
    assert_eq!(result.output.as_deref(), Some("hello world"));

    s.shell.execute("export NAME=vsh").await;
    let result = s.shell.execute("echo $NAME ${NAME}!").await;
    assert_eq!(result.output.as_deref(), Some("vsh vsh!"));

    assert!(s.shell.execute("export GREETING=\"a  b\"").await.success);
    let result = s.shell.execute("echo \"$GREETING\"").await;
    assert_eq!(result.output.as_deref(), Some("a  b"));

    s.shell.execute("unset NAME").await;
    let result = s.shell.execute("echo [$NAME]").await;
    assert_eq!(result.output.as_deref(), Some("[]"));
}

#[tokio::test]
async fn find_walks_the_tree() {
    let s = login("guest").await;
    s.shell.execute("mkdir -p d/e").await;
    s.shell.execute("touch d/x.txt d/e/y.txt d/e/z.log").await;

    let result = s.shell.execute("find d -name \"*.txt\"").await;
    assert_eq!(result.output.as_deref(), Some("d/e/y.txt\nd/x.txt"));

    let result = s.shell.execute("find d -type d").await;
    assert_eq!(result.output.as_deref(), Some("d\nd/e"));

    let result = s.shell.execute("find d -not -name \"*.txt\" -type f").await;
    assert_eq!(result.output.as_deref(), Some("d/e/z.log"));

    assert!(s.shell.execute("find d -name \"*.log\" -delete").await.success);
    assert!(!s.shell.execute("ls d/e/z.log").await.success);
}

#[tokio::test]
async fn grep_text_utilities() {
    let s = login("guest").await;
    let (user, cwd) = s.shell.session();
    s.shell
        .vfs()
        .create_file(&format!("{cwd}/words"), "pear\napple\nPeach\napple\n", &user)
        .unwrap();

    let result = s.shell.execute("grep -n pe words").await;
    assert_eq!(result.output.as_deref(), Some("1:pear"));
    let result = s.shell.execute("grep -ic pe words").await;
    assert_eq!(result.output.as_deref(), Some("2"));
    let result = s.shell.execute("sort words | uniq -c").await;
    assert_eq!(
        result.output.as_deref(),
        Some("      1 Peach\n      2 apple\n      1 pear")
    );
    let result = s.shell.execute("head -n 2 words | tail -n 1").await;
    assert_eq!(result.output.as_deref(), Some("apple"));
    let result = s.shell.execute("head -n3 words | tail -n1").await;
    assert_eq!(result.output.as_deref(), Some("Peach"));
}

#[tokio::test]
async fn failed_save_warns_and_keeps_change() {
    let s = login("guest").await;
    s.store.fail_saves(true);
    let result = s.shell.execute("touch kept").await;
    assert!(result.success);
    assert_eq!(result.message_type, Some(MessageType::Warning));
    assert!(result.error.unwrap().contains("changes not saved"));
    assert!(s
        .presenter
        .lines()
        .iter()
        .any(|(text, kind)| *kind == MessageType::Warning && text.contains("changes not saved")));
    assert!(s.shell.execute("ls kept").await.success);

    // Redirection reports the failed save to its caller too
    let result = s.shell.execute_line("echo x > f", &batch()).await;
    assert!(result.success);
    assert_eq!(result.message_type, Some(MessageType::Warning));
    assert!(result.error.unwrap().contains("changes not saved"));
    assert_eq!(s.shell.execute("cat f").await.output.as_deref(), Some("x"));
}

#[tokio::test]
async fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(&path));
    let shell = Shell::builder()
        .store(store)
        .presenter(Arc::new(BufferPresenter::new()))
        .build()
        .await
        .unwrap();
    assert!(shell.execute("echo data > /tmp/keep").await.success);
    drop(shell);

    let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(&path));
    let shell = Shell::builder()
        .store(store)
        .presenter(Arc::new(BufferPresenter::new()))
        .build()
        .await
        .unwrap();
    let result = shell.execute("cat /tmp/keep").await;
    assert_eq!(result.output.as_deref(), Some("data"));
}

#[tokio::test]
async fn help_is_available() {
    let s = login("guest").await;
    let result = s.shell.execute("ls --help").await;
    assert!(result.output.unwrap().starts_with("ls - "));
    let result = s.shell.execute("help").await;
    assert!(result.output.unwrap().contains("check_fail"));
    let result = s.shell.execute("frob").await;
    assert_eq!(result.error.as_deref(), Some("frob: command not found"));
}
