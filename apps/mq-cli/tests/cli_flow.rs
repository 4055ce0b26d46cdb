// cli_flow.rs — End-to-end test of the `mq` binary against a temp project.
//
// Flow:
//   1. Write .mq/types.toml with an author and a book type
//   2. mq submit author --bypass → live immediately, nothing queued
//   3. mq submit book → hidden entity + Created changeset
//   4. mq pending / mq show → the creation is listed with its diff
//   5. mq approve → book goes live, status approved
//   6. mq submit book --id → edit staged, entity stays untouched
//   7. mq reject → queue empty again, original title kept

use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

const SCHEMA: &str = r#"
[[types]]
name = "author"

[[types.fields]]
name = "name"
kind = { type = "scalar" }

[[types]]
name = "book"

[[types.fields]]
name = "title"
kind = { type = "scalar" }

[[types.fields]]
name = "author"
kind = { type = "relation", target = "author" }
nullable = true
"#;

fn mq(root: &Path, args: &[&str]) -> Value {
    let output = Command::new(env!("CARGO_BIN_EXE_mq"))
        .arg("--project-root")
        .arg(root)
        .arg("--json")
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "mq {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join(".mq")).unwrap();
    fs::write(dir.path().join(".mq/types.toml"), SCHEMA).unwrap();
    dir
}

#[test]
fn submit_review_and_resolve_through_the_cli() {
    let dir = project();
    let root = dir.path();

    // =========================================================
    // 2. Bypassed submission goes live without a changeset
    // =========================================================
    let author = mq(root, &["submit", "author", "-f", "name=Ursula"]);
    assert!(author["changeset"].is_object());
    let author_cs = author["changeset"]["id"].as_u64().unwrap().to_string();
    mq(root, &["approve", &author_cs]);

    let bypassed = mq(root, &["submit", "author", "-f", "name=Italo", "--bypass"]);
    assert!(bypassed["changeset"].is_null());
    assert_eq!(bypassed["entity"]["is_live"], true);

    // =========================================================
    // 3. New book is created hidden with a Created changeset
    // =========================================================
    let author_id = author["entity"]["id"].as_u64().unwrap();
    let book = mq(
        root,
        &[
            "submit",
            "book",
            "-f",
            "title=The Dispossessed",
            "-f",
            &format!("author={}", author_id),
            "--submitter",
            "reader",
        ],
    );
    assert_eq!(book["entity"]["is_live"], false);
    assert_eq!(book["changeset"]["status"], "created");
    let book_id = book["entity"]["id"].as_u64().unwrap().to_string();
    let book_cs = book["changeset"]["id"].as_u64().unwrap().to_string();

    let live = mq(root, &["entities", "book"]);
    assert_eq!(live.as_array().unwrap().len(), 0);
    let all = mq(root, &["entities", "book", "--all"]);
    assert_eq!(all.as_array().unwrap().len(), 1);

    // =========================================================
    // 4. Queue and diff
    // =========================================================
    let pending = mq(root, &["pending", "--type", "book"]);
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let details = mq(root, &["show", &book_cs]);
    let title = details["diff"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["field"] == "title")
        .unwrap();
    assert_eq!(title["changed"], true);

    // =========================================================
    // 5. Approve the creation
    // =========================================================
    let approved = mq(root, &["approve", &book_cs, "--reviewer", "mod"]);
    assert_eq!(approved["status"], "approved");
    let status = mq(root, &["status", "book", &book_id]);
    assert_eq!(status["status"], "approved");

    // =========================================================
    // 6. Edit is staged, entity unchanged
    // =========================================================
    let edit = mq(
        root,
        &["submit", "book", "--id", &book_id, "-f", "title=Changing Planes"],
    );
    let edit_cs = edit["changeset"]["id"].as_u64().unwrap().to_string();
    assert_eq!(edit["changeset"]["status"], "pending");
    let status = mq(root, &["status", "book", &book_id]);
    assert_eq!(status["status"], "pending");

    // =========================================================
    // 7. Reject the edit
    // =========================================================
    let rejected = mq(root, &["reject", &edit_cs, "--reason", "spam"]);
    assert_eq!(rejected["status"], "rejected");
    assert_eq!(mq(root, &["pending"]).as_array().unwrap().len(), 0);

    let books = mq(root, &["entities", "book"]);
    assert_eq!(
        books[0]["fields"]["title"]["value"],
        "The Dispossessed"
    );

    // Events were logged as JSON lines.
    let log = fs::read_to_string(root.join(".mq/events.jsonl")).unwrap();
    assert!(log.lines().count() >= 6);
}

#[test]
fn unknown_type_fails_cleanly() {
    let dir = project();
    let output = Command::new(env!("CARGO_BIN_EXE_mq"))
        .arg("--project-root")
        .arg(dir.path())
        .args(["pending", "--type", "magazine"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("magazine"));
}
