//! End-to-end pipeline tests with a scripted collaborator.
//!
//! These tests drive `run_pipeline` through several rounds and check the
//! on-disk project: round directories, `final/`, and both history documents.

use std::fs;
use std::path::Path;

use serde_json::Value;

use genloop::core::history::StopReason;
use genloop::core::sanitize::Sanitizer;
use genloop::io::history_store::load_compact_history;
use genloop::io::layout::list_round_dirs;
use genloop::io::repair::repair;
use genloop::pipeline::{PipelineStop, RoundOutcome, RunContext, run_pipeline};
use genloop::test_support::{Scripted, ScriptedCollaborator, TestProject, fenced_response};

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn context(project: &TestProject, rounds: u32) -> RunContext {
    fs::create_dir_all(project.project_dir()).expect("mkdir");
    RunContext::new("Build a tiny web app", project.config(rounds), project.paths())
        .expect("context")
}

/// Three rounds then finalize:
///
/// ```text
/// project/
/// ├── round_1/  round_2/  round_3/
/// ├── final/                        (byte-equal to round_3/)
/// ├── generation_history.json
/// └── detailed_generation_history.json
/// ```
#[test]
fn three_rounds_produce_round_dirs_and_final() {
    let project = TestProject::new().expect("project");
    let generator = (1..=3)
        .map(|round| {
            Scripted::respond(fenced_response(&[
                ("app.py", "python", &format!("VERSION = {round}")),
                ("static/style.css", "css", "body { margin: 0; }"),
            ]))
        })
        .collect();
    let reviewer = (1..=3)
        .map(|round| Scripted::respond(format!("review {round}")))
        .collect();
    let mut collaborator = ScriptedCollaborator::new(generator, reviewer);

    let mut rounds: Vec<RoundOutcome> = Vec::new();
    let outcome = run_pipeline(context(&project, 3), &mut collaborator, |round| {
        rounds.push(round.clone());
    })
    .expect("run");

    assert_eq!(outcome.stop, PipelineStop::Completed);
    assert_eq!(outcome.rounds_completed, 3);
    assert_eq!(rounds.len(), 3);

    let paths = project.paths();
    assert_eq!(
        listing(&paths.root),
        vec![
            "detailed_generation_history.json",
            "final",
            "generation_history.json",
            "round_1",
            "round_2",
            "round_3",
        ]
    );
    let round_indices: Vec<u32> = list_round_dirs(&paths.root)
        .expect("list")
        .into_iter()
        .map(|(round, _)| round)
        .collect();
    assert_eq!(round_indices, vec![1, 2, 3]);

    let final_files = listing(&paths.final_dir);
    assert_eq!(final_files, listing(&paths.round_dir(3)));
    for name in &final_files {
        assert_eq!(
            fs::read(paths.final_dir.join(name)).expect("final"),
            fs::read(paths.round_dir(3).join(name)).expect("round 3")
        );
    }
    assert_eq!(
        fs::read_to_string(paths.round_dir(1).join("app.py")).expect("round 1"),
        "VERSION = 1\n"
    );
    assert_eq!(
        fs::read_to_string(paths.final_dir.join("app.py")).expect("final"),
        "VERSION = 3\n"
    );

    // Manifest file list equals the files present in each round directory.
    let history = load_compact_history(&paths.compact_history_path).expect("history");
    for (round, record) in &history.rounds {
        let mut files = record.files.clone();
        files.sort();
        assert_eq!(files, listing(&paths.round_dir(*round)), "round {round}");
    }
    assert_eq!(history.stop_reason, Some(StopReason::Completed));
    assert_eq!(history.completed_rounds, 3);
    let snapshot = history.final_snapshot.expect("final snapshot");
    assert_eq!(snapshot.round, 3);
    assert_eq!(snapshot.files, final_files);
}

#[test]
fn detailed_history_keeps_full_task_and_transcript() {
    let project = TestProject::new().expect("project");
    fs::create_dir_all(project.project_dir()).expect("mkdir");
    let task = "t".repeat(300);
    let ctx = RunContext::new(task.clone(), project.config(1), project.paths()).expect("context");
    let mut collaborator = ScriptedCollaborator::new(
        vec![Scripted::respond(fenced_response(&[("a.py", "python", "pass")]))],
        vec![Scripted::respond("looks fine")],
    );
    run_pipeline(ctx, &mut collaborator, |_| {}).expect("run");

    let paths = project.paths();
    let compact: Value =
        serde_json::from_str(&fs::read_to_string(&paths.compact_history_path).expect("read"))
            .expect("compact json");
    let detailed: Value =
        serde_json::from_str(&fs::read_to_string(&paths.detailed_history_path).expect("read"))
            .expect("detailed json");

    assert_eq!(compact["task"].as_str().map(str::len), Some(203));
    assert_eq!(detailed["task"].as_str(), Some(task.as_str()));
    assert_eq!(detailed["rounds"]["1"]["review_notes"], "looks fine");
    assert_eq!(detailed["rounds"]["1"]["transcript"]["generator"]["round"], 1);
    assert_eq!(
        compact["rounds"].as_object().map(|rounds| rounds.keys().collect::<Vec<_>>()),
        detailed["rounds"].as_object().map(|rounds| rounds.keys().collect::<Vec<_>>())
    );
}

#[test]
fn labeled_and_unlabeled_regions_get_stable_names() {
    let project = TestProject::new().expect("project");
    let response = "Project files:\n\n`main.py`\n```python\nprint('hi')\n```\n\nThen the frontend:\n```javascript\nconsole.log('hi');\n```\n";
    let mut collaborator = ScriptedCollaborator::new(
        vec![Scripted::respond(response)],
        vec![Scripted::respond("ok")],
    );
    let mut seen = Vec::new();
    run_pipeline(context(&project, 1), &mut collaborator, |round| {
        seen.push(round.files.clone());
    })
    .expect("run");
    assert_eq!(seen, vec![vec!["main.py".to_string(), "file_2.js".to_string()]]);
}

#[test]
fn collaborator_failure_finalizes_last_completed_round() {
    let project = TestProject::new().expect("project");
    let mut collaborator = ScriptedCollaborator::new(
        vec![
            Scripted::respond(fenced_response(&[("a.py", "python", "one")])),
            Scripted::respond(fenced_response(&[("a.py", "python", "two")])),
            Scripted::respond(fenced_response(&[("a.py", "python", "three")])),
        ],
        vec![
            Scripted::respond("r1"),
            Scripted::respond("r2"),
            Scripted::Fail("rate limited".to_string()),
        ],
    );

    let outcome = run_pipeline(context(&project, 3), &mut collaborator, |_| {}).expect("run");
    match &outcome.stop {
        PipelineStop::Aborted { round, reason } => {
            assert_eq!(*round, 3);
            assert!(reason.contains("rate limited"), "reason: {reason}");
        }
        other => panic!("expected abort, got {other:?}"),
    }
    assert_eq!(outcome.rounds_completed, 2);

    let paths = project.paths();
    assert!(!paths.round_dir(3).exists(), "aborted round must not be written");
    assert_eq!(
        fs::read_to_string(paths.final_dir.join("a.py")).expect("final"),
        "two\n"
    );
    let history = load_compact_history(&paths.compact_history_path).expect("history");
    assert_eq!(history.stop_reason, Some(StopReason::Aborted));
    assert_eq!(history.rounds.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn repair_is_a_noop_on_pipeline_output() {
    let project = TestProject::new().expect("project");
    let mut collaborator = ScriptedCollaborator::new(
        vec![Scripted::respond(fenced_response(&[
            ("`weird name`.py", "python", "x = 1"),
            ("檔案：server.js", "javascript", "let a"),
        ]))],
        vec![Scripted::respond("ok")],
    );
    run_pipeline(context(&project, 1), &mut collaborator, |_| {}).expect("run");

    let report = repair(&project.paths().root, &Sanitizer::with_defaults()).expect("repair");
    assert!(report.renamed.is_empty(), "renamed: {:?}", report.renamed);
}
