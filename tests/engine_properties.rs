//! Property and behaviour tests for the patch engine
//!
//! Purity, idempotence, extension gating, zero-match directories and
//! per-file failure isolation.

use patch_suite::{
    check, patch_text, process, scan_tree, Mode, Outcome, PatchRule, RuleSet, Target,
};
use proptest::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const FRAGMENTS: &[&str] = &[
    "var isPremium = false;",
    "isPremium = true;",
    "if (licenseValid) {",
    "if (!hasProAccess)",
    "function checkLicense(k) { return k; }",
    "checkLicense()",
    "proVersion",
    "=",
    "false",
    "}",
    "let x = 1;",
    " ",
    "\n",
];

fn source_text() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(FRAGMENTS), 0..24).prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn prop_patch_text_is_deterministic(text in source_text()) {
        let rules = RuleSet::builtin();
        let first = patch_text(&rules, &text);
        let second = patch_text(&rules, &text);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_patched_text_is_stable(text in source_text()) {
        let rules = RuleSet::builtin();
        let once = patch_text(&rules, &text);
        let twice = patch_text(&rules, &once.text);
        prop_assert!(!twice.changed, "second pass changed {:?}", once.text);
        prop_assert_eq!(twice.text, once.text);
    }

    #[test]
    fn prop_changed_flag_matches_text(text in source_text()) {
        let outcome = patch_text(&RuleSet::builtin(), &text);
        prop_assert_eq!(outcome.changed, outcome.text != text);
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_extension_gating() {
    let dir = TempDir::new().unwrap();
    let gated = [
        ("Gate.kt", "val isPremium = false"),
        ("gate.rb", "if (isPremium)"),
        ("LICENSE", "checkLicense(x) { no }"),
        ("Legacy.JS", "if (!proVersion) { nag(); }"),
    ];
    for (name, content) in gated {
        write(dir.path(), name, content);
    }
    write(dir.path(), "gate.js", "isPremium = false");

    let outcome = process(&RuleSet::builtin(), dir.path());
    assert_eq!(outcome.count(), 1);
    for (name, content) in gated {
        assert_eq!(fs::read_to_string(dir.path().join(name)).unwrap(), content);
    }
}

#[test]
fn test_zero_match_directory() {
    let dir = TempDir::new().unwrap();
    let files = [
        ("index.html", "<html></html>"),
        ("src/app.js", "var isPremium = true;"),
        ("src/util.py", "licensed = False"),
        ("docs/notes.md", "Premium features are listed below."),
    ];
    for (name, content) in files {
        write(dir.path(), name, content);
    }

    let outcome = process(&RuleSet::builtin(), dir.path());
    assert!(matches!(
        outcome,
        Outcome::NoChangesFound {
            target: Target::Directory,
            ..
        }
    ));
    assert!(!outcome.is_failure());
    for (name, content) in files {
        assert_eq!(fs::read_to_string(dir.path().join(name)).unwrap(), content);
    }
}

#[test]
fn test_directory_second_run_finds_nothing() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.js", "if (proVersion) { pro(); }\nproVersion = false;");
    write(dir.path(), "b/c.ts", "function checkLicense(key) { return verify(key); }");

    let first = process(&RuleSet::builtin(), dir.path());
    assert_eq!(first.count(), 2);

    let second = process(&RuleSet::builtin(), dir.path());
    assert!(matches!(second, Outcome::NoChangesFound { .. }));
}

#[test]
fn test_check_directory_is_read_only() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.js", "isPremium = false");

    let outcome = check(&RuleSet::builtin(), dir.path());
    assert_eq!(outcome.count(), 1);
    assert_eq!(
        fs::read_to_string(dir.path().join("a.js")).unwrap(),
        "isPremium = false"
    );
}

#[test]
fn test_custom_rule_set() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "app.vue", "trialExpired = true");
    write(dir.path(), "app.js", "trialExpired = true");

    let rule = PatchRule::new("trial", r"trialExpired = true", "trialExpired = false").unwrap();
    let rules = RuleSet::new(vec![rule], [".vue"]);

    let report = scan_tree(&rules, dir.path(), Mode::Apply);
    assert_eq!(report.count(), 1);
    assert_eq!(
        fs::read_to_string(dir.path().join("app.vue")).unwrap(),
        "trialExpired = false"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("app.js")).unwrap(),
        "trialExpired = true"
    );
}

#[test]
fn test_read_only_file_failure_isolated() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a/locked.js", "isPremium = false");
    write(dir.path(), "b/open.js", "isPremium = false");

    let locked = dir.path().join("a/locked.js");
    let mut permissions = fs::metadata(&locked).unwrap().permissions();
    permissions.set_readonly(true);
    fs::set_permissions(&locked, permissions.clone()).unwrap();

    let report = scan_tree(&RuleSet::builtin(), dir.path(), Mode::Apply);
    permissions.set_readonly(false);
    fs::set_permissions(&locked, permissions).unwrap();

    assert_eq!(report.count(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, Path::new("a/locked.js"));
    assert_eq!(fs::read_to_string(&locked).unwrap(), "isPremium = false");
    assert_eq!(
        fs::read_to_string(dir.path().join("b/open.js")).unwrap(),
        "isPremium = True"
    );
}

#[test]
#[cfg(unix)]
fn test_write_failure_isolated_to_file() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    write(dir.path(), "locked/a.js", "isPremium = false");
    write(dir.path(), "open/b.js", "isPremium = false");

    let locked = dir.path().join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

    // Privileged users ignore directory permissions; nothing to test then.
    if fs::write(locked.join("canary"), b"").is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let report = scan_tree(&RuleSet::builtin(), dir.path(), Mode::Apply);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(report.count(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, Path::new("locked/a.js"));
    assert_eq!(
        fs::read_to_string(dir.path().join("locked/a.js")).unwrap(),
        "isPremium = false"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("open/b.js")).unwrap(),
        "isPremium = True"
    );
}
