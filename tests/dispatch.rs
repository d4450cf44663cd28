use std::path::Path;
use std::time::{Duration, Instant};

use debugrun::outcome::{FAILURE_MARKER, SUCCESS_MARKER};
use debugrun::{Config, Dispatcher, ExecutionOutcome, Language};

fn dispatcher(yaml: &str) -> Dispatcher {
    let cfg = Config::from_yaml(yaml).expect("test config parses");
    Dispatcher::new(&cfg)
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Every external tool replaced by a name that cannot resolve.
fn nothing_installed(root: &Path) -> String {
    let mut yaml = format!("workspace_root: {}\nlanguages:\n", root.display());
    for lang in Language::ALL {
        let proto = debugrun::protocol::LanguageProtocol::builtin(lang);
        if proto.compile.is_some() {
            yaml.push_str(&format!(
                "  {}:\n    compile: [\"debugrun-absent-{}\", \"{{source}}\"]\n",
                lang.name(),
                lang.name()
            ));
        } else if proto.run.is_some() {
            yaml.push_str(&format!(
                "  {}:\n    run: [\"debugrun-absent-{}\", \"{{source}}\"]\n",
                lang.name(),
                lang.name()
            ));
        }
    }
    yaml
}

#[tokio::test]
async fn every_language_yields_a_marked_summary_without_toolchains() {
    let root = tempfile::tempdir().unwrap();
    let d = dispatcher(&nothing_installed(root.path()));

    for lang in Language::ALL {
        let outcome = d.run(lang.name(), "anything at all", &[], "").await;
        let summary = outcome.summary();

        assert!(
            summary.starts_with(SUCCESS_MARKER) || summary.starts_with(FAILURE_MARKER),
            "{lang}: {summary}"
        );
        match outcome {
            ExecutionOutcome::ToolUnavailable { tool } => {
                assert_eq!(tool, format!("debugrun-absent-{}", lang.name()));
            }
            ExecutionOutcome::Success { .. } => {
                assert!(matches!(
                    lang,
                    Language::Sql | Language::Html | Language::Css | Language::Xml
                ));
            }
            other => panic!("{lang}: unexpected {other:?}"),
        }
    }

    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn sql_batch_reports_writes_and_tables() {
    let d = Dispatcher::new(&Config::default());
    let summary = d
        .execute(
            "sql",
            "```sql\nCREATE TABLE t(x);\nINSERT INTO t VALUES (1);\nSELECT * FROM t;\n```",
            &[],
            "",
        )
        .await;

    assert_eq!(
        summary,
        format!(
            "{} Statement executed successfully.\nStatement executed successfully.\nx\n---\n1",
            SUCCESS_MARKER
        )
    );
}

#[tokio::test]
async fn html_returns_advisory() {
    let d = Dispatcher::new(&Config::default());
    let summary = d.execute("HTML", "<div>unclosed", &[], "").await;
    assert!(summary.starts_with(&format!("{} HTML has no standalone runtime", SUCCESS_MARKER)));
}

#[tokio::test]
async fn unknown_tag_runs_as_default_language() {
    let d = dispatcher(
        "default_language: bash\nlanguages:\n  bash:\n    run: [\"sh\", \"{source}\"]\n",
    );
    let summary = d.execute("cobol", "echo fallback", &[], "").await;
    assert_eq!(summary, format!("{} fallback", SUCCESS_MARKER));
}

#[tokio::test]
async fn compile_then_run_through_the_dispatcher() {
    let root = tempfile::tempdir().unwrap();
    let d = dispatcher(&format!(
        "workspace_root: {}\nlanguages:\n  c:\n    compile: [\"cp\", \"{{source}}\", \"{{artifact}}\"]\n    run: [\"sh\", \"{{artifact}}\"]\n",
        root.path().display()
    ));

    let ok = d.execute("c", "```c\necho 42\n```", &[], "").await;
    assert_eq!(ok, format!("{} 42", SUCCESS_MARKER));

    let failed = d.execute("c", "echo oops >&2; exit 2", &[], "").await;
    assert_eq!(failed, format!("{} Runtime Error:\noops\n", FAILURE_MARKER));

    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn runaway_program_times_out_and_is_killed() {
    let root = tempfile::tempdir().unwrap();
    let d = dispatcher(&format!(
        "workspace_root: {}\nlanguages:\n  bash:\n    run: [\"sh\", \"{{source}}\"]\n    run_timeout_ms: 300\n",
        root.path().display()
    ));

    let started = Instant::now();
    let summary = d.execute("bash", "sleep 30 & sleep 30", &[], "").await;

    assert_eq!(
        summary,
        format!("{} Execution timed out after 300ms.", FAILURE_MARKER)
    );
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn python_inputs_are_checked_before_running() {
    let d = dispatcher("languages:\n  python:\n    run: [\"cat\", \"{source}\"]\n");
    let code = "a = input('a')\nb = input('b')";

    let rejected = d.execute("python", code, &["1".to_string()], "").await;
    assert_eq!(
        rejected,
        format!("{} Not enough test inputs (expected 2)", FAILURE_MARKER)
    );

    let ran = d
        .execute("py", code, &["1".to_string(), "2".to_string()], "")
        .await;
    assert_eq!(ran, format!("{} a = '1'\nb = '2'", SUCCESS_MARKER));
}

#[tokio::test]
async fn concurrent_executions_are_isolated() {
    let root = tempfile::tempdir().unwrap();
    let d = dispatcher(&format!(
        "workspace_root: {}\nlanguages:\n  c:\n    compile: [\"cp\", \"{{source}}\", \"{{artifact}}\"]\n    run: [\"sh\", \"{{artifact}}\"]\n",
        root.path().display()
    ));

    let mut handles = Vec::new();
    for i in 0..8 {
        let d = d.clone();
        handles.push(tokio::spawn(async move {
            d.execute("c", &format!("echo run-{i}"), &[], "").await
        }));
    }

    for (i, h) in handles.into_iter().enumerate() {
        assert_eq!(h.await.unwrap(), format!("{} run-{}", SUCCESS_MARKER, i));
    }
    assert_eq!(entries(root.path()), 0);
}
