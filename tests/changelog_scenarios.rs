//! End-to-end scenarios: load a fixture changelog, run an offline update and
//! a full rollback, and compare the change sets named in the SQL output.

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use revmark::filter::RuntimeEnvironment;
use revmark::history::InMemoryHistory;
use revmark::runner::OfflineRunner;
use revmark::{
    Changelog, ChangelogLoader, Database, LoadError, RevisionLoader, TomlChangelogLoader,
};

const UPDATE_MARKER: &str = "-- Changeset ";
const ROLLBACK_MARKER: &str = "-- Rolling Back ChangeSet: ";
const REVISION_AUTHOR: &str = "liquibase-envers-support plugin";

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn load(name: &str) -> Changelog {
    RevisionLoader::new(TomlChangelogLoader::new(fixture(name)))
        .load(Path::new("master.toml"))
        .unwrap()
}

fn env(contexts: &[&str]) -> RuntimeEnvironment {
    RuntimeEnvironment::new(Database::new("postgresql")).contexts(contexts)
}

fn marked(sql: &str, marker: &str) -> Vec<String> {
    sql.lines()
        .filter_map(|line| line.strip_prefix(marker))
        .map(str::to_string)
        .collect()
}

struct Outcome {
    update: Vec<String>,
    rollback: Vec<String>,
    update_sql: String,
}

fn run(name: &str, contexts: &[&str]) -> Outcome {
    let changelog = load(name);

    let mut runner = OfflineRunner::new(env(contexts), InMemoryHistory::new(), Vec::new());
    runner.update(&changelog).unwrap();
    let (history, output) = runner.into_parts();
    let update_sql = String::from_utf8(output).unwrap();

    let mut runner = OfflineRunner::new(env(contexts), history, Vec::new());
    runner.rollback(&changelog, usize::MAX).unwrap();
    assert!(runner.history().is_empty());
    let rollback_sql = String::from_utf8(runner.into_parts().1).unwrap();

    Outcome {
        update: marked(&update_sql, UPDATE_MARKER),
        rollback: marked(&rollback_sql, ROLLBACK_MARKER),
        update_sql,
    }
}

fn test(id: u32) -> String {
    format!("master.toml::Test {}::JUnit", id)
}

fn tag(version: &str) -> String {
    format!("master.toml::Tag {}::liquibase-db-release", version)
}

fn revision(version: &str) -> String {
    format!("master.toml::Envers revision for version {}::{}", version, REVISION_AUTHOR)
}

fn reversed(mut keys: Vec<String>) -> Vec<String> {
    keys.reverse();
    keys
}

#[test]
fn test_without_tag() {
    let outcome = run("without_tag", &[]);
    let expected = vec![test(1), test(2)];
    assert_eq!(outcome.update, expected);
    assert_eq!(outcome.rollback, reversed(expected));
}

#[test]
fn test_tag_before_template_is_ignored() {
    let outcome = run("tag_before_template", &[]);
    let expected = vec![
        test(1),
        tag("1.0.0"),
        test(2),
        test(3),
        tag("2.0.0"),
        revision("develop"),
        test(4),
    ];
    assert_eq!(outcome.update, expected);
    assert_eq!(outcome.rollback, reversed(expected));
}

#[test]
fn test_tag_without_follower() {
    let outcome = run("tag_without_follower", &[]);
    let expected = vec![test(1), tag("1.0.0")];
    assert_eq!(outcome.update, expected);
    assert_eq!(outcome.rollback, reversed(expected));
}

#[test]
fn test_tag_with_follower() {
    let outcome = run("tag_with_follower", &[]);
    let expected = vec![test(1), tag("1.0.0"), revision("develop"), test(2)];
    assert_eq!(outcome.update, expected);
    assert_eq!(outcome.rollback, reversed(expected));
}

#[test]
fn test_adjacent_tags_keep_the_later_boundary() {
    let outcome = run("adjacent_tags", &[]);
    let expected = vec![test(1), tag("1.0.0"), tag("1.0.1"), revision("develop"), test(2)];
    assert_eq!(outcome.update, expected);
    assert_eq!(outcome.rollback, reversed(expected));
    assert!(outcome.update_sql.contains("'1.0.1', 'develop')"));
}

#[test]
fn test_follower_in_other_context() {
    let outcome = run("follower_in_other_context", &["core"]);
    let expected = vec![test(1), tag("1.0.0")];
    assert_eq!(outcome.update, expected);
    assert_eq!(outcome.rollback, reversed(expected));
}

#[test]
fn test_context_expression_with_matching_follower() {
    let outcome = run("context_expression", &["core", "customer"]);
    let expected = vec![test(1), tag("1.0.0"), revision("develop"), test(2)];
    assert_eq!(outcome.update, expected);
    assert_eq!(outcome.rollback, reversed(expected));
}

#[test]
fn test_context_expression_without_matching_follower() {
    let outcome = run("context_expression", &["core", "otherCustomer"]);
    let expected = vec![test(1), tag("1.0.0")];
    assert_eq!(outcome.update, expected);
    assert_eq!(outcome.rollback, reversed(expected));
}

#[test]
fn test_two_releases() {
    let outcome = run("two_releases", &[]);
    let expected = vec![
        test(1),
        tag("1.0.0"),
        revision("1.1.0"),
        test(2),
        test(3),
        tag("1.1.0"),
        revision("develop"),
        test(4),
    ];
    assert_eq!(outcome.update, expected);
    assert_eq!(outcome.rollback, reversed(expected));

    assert!(outcome.update_sql.contains(
        "INSERT INTO revinfo (rev, revtstmp, previous_version, current_version) \
         VALUES (nextval('revinfo_seq'), CURRENT_TIMESTAMP, '1.0.0', '1.1.0');"
    ));
}

#[test]
fn test_revision_rollback_deletes_its_row() {
    let changelog = load("tag_with_follower");
    let mut runner = OfflineRunner::new(env(&[]), InMemoryHistory::new(), Vec::new());
    runner.update(&changelog).unwrap();

    let (history, _) = runner.into_parts();
    let mut runner = OfflineRunner::new(env(&[]), history, Vec::new());
    runner.rollback(&changelog, 2).unwrap();
    let sql = String::from_utf8(runner.into_parts().1).unwrap();

    assert_eq!(marked(&sql, ROLLBACK_MARKER), vec![test(2), revision("develop")]);
    assert!(sql.contains("DELETE FROM revinfo WHERE current_version = 'develop';"));
}

#[test]
fn test_second_update_adds_no_revision() {
    let changelog = load("tag_with_follower");
    let mut runner = OfflineRunner::new(env(&[]), InMemoryHistory::new(), Vec::new());
    runner.update(&changelog).unwrap();

    let summary = runner.update(&changelog).unwrap();
    assert!(summary.executed.is_empty());
    assert_eq!(runner.history().len(), 4);
}

#[test]
fn test_revision_waits_for_new_follower() {
    let changelog = load("two_releases");

    // Only the first release has been applied so far
    let mut applied = InMemoryHistory::new();
    {
        use revmark::history::ChangeLogHistory;
        for change_set in changelog.iter().take(3) {
            applied.mark_ran(change_set, revmark::ExecType::Executed).unwrap();
        }
    }

    let mut runner = OfflineRunner::new(env(&[]), applied, Vec::new());
    let summary = runner.update(&changelog).unwrap();
    let ids: Vec<String> = summary.executed.iter().map(|k| k.to_string()).collect();
    assert_eq!(ids, vec![test(2), test(3), tag("1.1.0"), revision("develop"), test(4)]);
}

#[test]
fn test_unsupported_changelog_format() {
    let loader = RevisionLoader::new(TomlChangelogLoader::new(fixture("tag_with_follower")));
    let err = loader.load(Path::new("master.xml")).unwrap_err();
    assert!(matches!(err, LoadError::Unsupported(_)));
}
