use std::path::Path;

use assert_cmd::Command;
use chrono::Local;
use memspan::results::{ResultStore, ResultsDb};
use memspan::session::{Participant, Session, SessionConfig, SessionEvent};
use memspan::Mode;

// Exercises the non-interactive subcommands against a throwaway database.

fn memspan(home: &Path, db: &Path) -> Command {
    let mut cmd = Command::cargo_bin("memspan").unwrap();
    cmd.env("HOME", home).arg("--db").arg(db);
    cmd
}

fn seed_db(db: &Path) -> i64 {
    let mut session = Session::new(SessionConfig {
        seed: Some(3),
        ..SessionConfig::default()
    });
    session
        .handle(SessionEvent::Start {
            participant: Participant::new("Grace", "grace@example.com").unwrap(),
            mode: Mode::Backward,
        })
        .unwrap();
    session.handle(SessionEvent::StimulusShown).unwrap();
    let answer = session.trial().unwrap().expected_answer();
    session
        .handle(SessionEvent::Submit {
            input: answer,
            time_taken: 2.5,
        })
        .unwrap();
    let snapshot = session.finish(Local::now()).unwrap();

    let mut results = ResultsDb::open(db).unwrap();
    results.save(&snapshot).unwrap()
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn history_on_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("stats.db");

    let out = stdout_of(memspan(dir.path(), &db).arg("history"));
    assert_eq!(out, "No saved sessions.\n");
}

#[test]
fn history_and_show_list_saved_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("stats.db");
    let id = seed_db(&db);

    let out = stdout_of(memspan(dir.path(), &db).args(["history", "--limit", "5"]));
    assert!(out.contains("grace@example.com"));
    assert!(out.contains("Backward"));
    assert!(out.contains("100.00%"));

    let out = stdout_of(memspan(dir.path(), &db).args(["show", &id.to_string()]));
    assert!(out.contains(&format!("Session #{id}")));
    assert!(out.contains("Name:                Grace"));
    assert!(out.contains("Max success length:  3"));
    assert!(out.contains("2.50s"));
    assert!(out.contains("correct"));
}

#[test]
fn show_unknown_session_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("stats.db");

    memspan(dir.path(), &db)
        .args(["show", "42"])
        .assert()
        .failure();
}

#[test]
fn export_writes_csv() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("stats.db");
    seed_db(&db);
    seed_db(&db);
    let csv_path = dir.path().join("out").join("results.csv");
    std::fs::create_dir_all(csv_path.parent().unwrap()).unwrap();

    let out = stdout_of(memspan(dir.path(), &db).arg("export").arg(&csv_path));
    assert!(out.starts_with("Exported 2 session(s)"));

    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert!(headers.iter().any(|h| h == "max_success_length"));
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    let email_col = headers.iter().position(|h| h == "email").unwrap();
    assert_eq!(&rows[0][email_col], "grace@example.com");
}
