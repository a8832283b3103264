use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use prompt_migrate::{
    AutoApprove, CandidateStatus, Decision, MigrateError, MigrationConfig, MigrationSummary,
    Migrator, ReviewMode, ScriptedReviewer, migrate,
};
use prompt_runtime::{Resolver, render, vars};
use prompt_store::{
    CombinedStore, DirectoryStore, Lockfile, PromptId, StoreError, StoreResult, TemplateStore,
    TemplateVersion, VersionLabel,
};

const SHOP: &str = "\
def checkout(user, price):
    msg = f\"Hello {user.name}, price: {price:.2f}\"
    return msg
";

const CHAT: &str = "\
greeting = f\"Hello {name}, welcome back\"
farewell = f\"Goodbye {name}, see you soon\"
reminder = f\"Remember {task} before noon\"
";

fn write(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

fn id(value: &str) -> PromptId {
    PromptId::new(value).unwrap()
}

fn auto() -> MigrationConfig {
    MigrationConfig::default().with_mode(ReviewMode::Auto)
}

fn run(root: &Path, config: MigrationConfig) -> MigrationSummary {
    Migrator::for_project(root, config)
        .unwrap()
        .run(root, &mut AutoApprove)
        .unwrap()
}

#[test]
fn extracts_literal_into_store_and_rewrites_call() {
    let dir = tempfile::tempdir().unwrap();
    let shop = write(dir.path(), "shop.py", SHOP);

    let summary = run(dir.path(), auto());
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.files_modified, 1);
    assert!(summary.file_errors.is_empty());

    assert_eq!(
        read(&shop),
        "\
from promptkit import p
def checkout(user, price):
    msg = p(\"shop_msg\", \"Hello {user_name}, price: {price:.2f}\", user_name=user.name, price=price)
    return msg
"
    );

    let store = DirectoryStore::new(dir.path().join("prompts"));
    let stored = store.read(&id("shop_msg"), VersionLabel::FIRST).unwrap();
    assert_eq!(stored.template(), "Hello {user_name}, price: {price:.2f}");
    assert_eq!(stored.description(), Some("Extracted from shop.py:2"));

    let report = &summary.reports[0];
    assert_eq!(report.id, "shop_msg");
    assert_eq!(report.line, 2);
    assert_eq!(
        report.status,
        CandidateStatus::Applied {
            version: VersionLabel::FIRST
        }
    );

    // user.name = "Ada", price = 3.14159 renders like the original f-string.
    let rendered = render(
        stored.template(),
        &vars!(user_name = "Ada", price = 3.141_59),
    )
    .unwrap();
    assert_eq!(rendered, "Hello Ada, price: 3.14");
}

#[test]
fn second_run_finds_nothing_new() {
    for clean in [false, true] {
        let dir = tempfile::tempdir().unwrap();
        let shop = write(dir.path(), "shop.py", SHOP);
        let chat = write(dir.path(), "pkg/chat.py", CHAT);

        let first = run(dir.path(), auto().with_clean(clean));
        assert_eq!(first.accepted, 4);
        let shop_after = read(&shop);
        let chat_after = read(&chat);

        let second = run(dir.path(), auto().with_clean(clean));
        assert_eq!(second.accepted, 0);
        assert!(second.reports.is_empty());
        assert_eq!(second.files_modified, 0);
        assert_eq!(read(&shop), shop_after);
        assert_eq!(read(&chat), chat_after);

        let store = DirectoryStore::new(dir.path().join("prompts"));
        assert_eq!(
            store.list_versions(&id("shop_msg")).unwrap(),
            vec![VersionLabel::FIRST]
        );
    }
}

#[test]
fn identical_trees_migrate_identically() {
    let runs: Vec<(Vec<String>, Vec<String>)> = (0..2)
        .map(|_| {
            let dir = tempfile::tempdir().unwrap();
            let files = [
                write(dir.path(), "b/prompts.py", CHAT),
                write(dir.path(), "a/prompts.py", CHAT),
                write(dir.path(), "shop.py", SHOP),
            ];
            let summary = run(dir.path(), auto());
            let ids = summary.reports.iter().map(|r| r.id.clone()).collect();
            let contents = files.iter().map(|file| read(file)).collect();
            (ids, contents)
        })
        .collect();

    assert_eq!(runs[0], runs[1]);
    assert_eq!(
        runs[0].0[..4],
        [
            "prompts_greeting",
            "prompts_farewell",
            "prompts_reminder",
            "prompts_greeting_2"
        ]
    );
}

#[test]
fn generated_ids_are_unique_across_files() {
    let dir = tempfile::tempdir().unwrap();
    for index in 0..12 {
        write(
            dir.path(),
            &format!("mod{index:02}/prompts.py"),
            "system_prompt = f\"You are {role}, be concise\"\n",
        );
    }

    let summary = run(dir.path(), auto());
    assert_eq!(summary.accepted, 12);
    let ids: BTreeSet<_> = summary.reports.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids.len(), 12);
    assert!(ids.contains("prompts_system_prompt"));
    assert!(ids.contains("prompts_system_prompt_12"));
}

#[test]
fn ids_already_in_the_store_are_not_reused() {
    let dir = tempfile::tempdir().unwrap();
    DirectoryStore::new(dir.path().join("prompts"))
        .write_new_version(&id("shop_msg"), "unrelated", None)
        .unwrap();
    let shop = write(dir.path(), "shop.py", SHOP);

    let summary = run(dir.path(), auto());
    assert_eq!(summary.reports[0].id, "shop_msg_2");
    assert!(read(&shop).contains("p(\"shop_msg_2\""));
}

#[test]
fn dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let chat = write(dir.path(), "chat.py", CHAT);

    let summary = run(dir.path(), MigrationConfig::default());
    assert_eq!(summary.proposed, 3);
    assert_eq!(summary.accepted, 0);
    assert_eq!(summary.files_modified, 0);
    assert!(summary
        .reports
        .iter()
        .all(|report| report.status == CandidateStatus::Proposed));
    assert_eq!(
        summary.reports[0].replacement,
        "p(\"chat_greeting\", \"Hello {name}, welcome back\", name=name)"
    );

    assert_eq!(read(&chat), CHAT);
    assert!(!dir.path().join("prompts").exists());
    assert!(!dir.path().join(".prompt_lock.json").exists());
}

#[test]
fn interactive_quit_keeps_what_was_applied() {
    let dir = tempfile::tempdir().unwrap();
    let chat = write(dir.path(), "chat.py", CHAT);
    let later = write(
        dir.path(),
        "zzz.py",
        "note = f\"Another {thing} to extract\"\n",
    );

    let migrator = Migrator::for_project(
        dir.path(),
        MigrationConfig::default().with_mode(ReviewMode::Interactive),
    )
    .unwrap();
    let mut reviewer =
        ScriptedReviewer::new([Decision::Accept, Decision::Reject, Decision::Quit]);
    let summary = migrator.run(dir.path(), &mut reviewer).unwrap();

    assert!(summary.quit);
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.reports.len(), 2);
    assert_eq!(reviewer.remaining(), 0);
    assert_eq!(
        read(&chat),
        "\
from promptkit import p
greeting = p(\"chat_greeting\", \"Hello {name}, welcome back\", name=name)
farewell = f\"Goodbye {name}, see you soon\"
reminder = f\"Remember {task} before noon\"
"
    );
    assert_eq!(read(&later), "note = f\"Another {thing} to extract\"\n");
}

#[test]
fn closures_can_review() {
    let dir = tempfile::tempdir().unwrap();
    let chat = write(dir.path(), "chat.py", CHAT);

    let migrator = Migrator::for_project(
        dir.path(),
        MigrationConfig::default().with_mode(ReviewMode::Interactive),
    )
    .unwrap();
    let mut reviewer = |candidate: &prompt_migrate::PlannedCandidate| {
        if candidate.id().as_str().ends_with("farewell") {
            Decision::Accept
        } else {
            Decision::Reject
        }
    };
    let summary = migrator.run(dir.path(), &mut reviewer).unwrap();

    assert_eq!((summary.accepted, summary.rejected), (1, 2));
    assert!(read(&chat).contains("farewell = p(\"chat_farewell\""));
}

#[test]
fn clean_mode_pins_and_resolves_from_store() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();
    let shop = write(dir.path(), "src/shop.py", SHOP);

    let summary = migrate(
        &dir.path().join("src"),
        auto().with_clean(true),
        &mut AutoApprove,
    )
    .unwrap();
    assert_eq!(summary.accepted, 1);
    assert!(read(&shop).contains("msg = p(\"shop_msg\", user_name=user.name, price=price)\n"));

    let lockfile = Lockfile::load(dir.path().join(".prompt_lock.json")).unwrap();
    assert_eq!(lockfile.get("shop_msg"), Some(VersionLabel::FIRST));

    let resolver = Resolver::for_project(dir.path()).unwrap();
    let text = resolver
        .resolve("shop_msg", None, &vars!(user_name = "Bo", price = 2.5))
        .unwrap();
    assert_eq!(text, "Hello Bo, price: 2.50");
}

#[test]
fn import_follows_future_imports_and_is_not_duplicated() {
    let dir = tempfile::tempdir().unwrap();
    let module = write(
        dir.path(),
        "mod.py",
        "\"\"\"Docs.\"\"\"\nfrom __future__ import annotations\n\nprompt = f\"Summarize {document} briefly\"\n",
    );
    let imported = write(
        dir.path(),
        "imported.py",
        "from promptkit import p\n\nprompt = f\"Translate {text} to French\"\n",
    );

    run(dir.path(), auto());

    assert_eq!(
        read(&module),
        "\"\"\"Docs.\"\"\"\nfrom __future__ import annotations\nfrom promptkit import p\n\nprompt = p(\"mod_prompt\", \"Summarize {document} briefly\", document=document)\n"
    );
    assert_eq!(read(&imported).matches("from promptkit import p").count(), 1);
}

#[derive(Debug)]
struct FlakyStore {
    inner: DirectoryStore,
}

impl TemplateStore for FlakyStore {
    fn list_versions(&self, id: &PromptId) -> StoreResult<Vec<VersionLabel>> {
        self.inner.list_versions(id)
    }

    fn read(&self, id: &PromptId, version: VersionLabel) -> StoreResult<TemplateVersion> {
        self.inner.read(id, version)
    }

    fn write_new_version(
        &self,
        id: &PromptId,
        template: &str,
        description: Option<&str>,
    ) -> StoreResult<VersionLabel> {
        if id.as_str().contains("broken") {
            return Err(StoreError::io(
                "prompts",
                std::io::Error::other("disk full"),
            ));
        }
        self.inner.write_new_version(id, template, description)
    }

    fn list_ids(&self) -> StoreResult<BTreeSet<PromptId>> {
        self.inner.list_ids()
    }
}

#[test]
fn failed_store_write_only_affects_its_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let app = write(
        dir.path(),
        "app.py",
        "ok_prompt = f\"Works {fine} every time\"\nbroken_prompt = f\"Fails {always} on write\"\n",
    );
    let store = Arc::new(FlakyStore {
        inner: DirectoryStore::new(dir.path().join("prompts")),
    });

    let summary = Migrator::new(store, dir.path().join(".prompt_lock.json"), auto())
        .run(dir.path(), &mut AutoApprove)
        .unwrap();

    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.failed, 1);
    assert!(matches!(
        summary.reports[1].status,
        CandidateStatus::Failed { .. }
    ));
    let rewritten = read(&app);
    assert!(rewritten.contains("ok_prompt = p(\"app_ok_prompt\""));
    assert!(rewritten.contains("broken_prompt = f\"Fails {always} on write\""));
}

#[test]
fn unreadable_file_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write(dir.path(), "bad.py", "x = 'oops\nmsg = f\"Hello {name}, broken\"\n");
    let good = write(dir.path(), "good.py", "msg = f\"Hello {name}, fine here\"\n");

    let summary = run(dir.path(), auto());

    assert_eq!(summary.files_scanned, 2);
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.file_errors.len(), 1);
    assert_eq!(summary.file_errors[0].path, bad);
    assert!(matches!(
        summary.file_errors[0].error,
        MigrateError::Lex { line: 1, .. }
    ));
    assert!(read(&good).contains("p(\"good_msg\""));
}

#[test]
fn escaped_non_ascii_in_a_field_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let odd = write(dir.path(), "odd.py", "x = f\"{a\\é} long enough text\"\n");
    let good = write(dir.path(), "good.py", "msg = f\"Hello {name}, fine here\"\n");

    let summary = run(dir.path(), auto());

    assert_eq!(summary.files_scanned, 2);
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.unsupported, 1);
    assert!(summary.file_errors.is_empty());
    assert_eq!(read(&odd), "x = f\"{a\\é} long enough text\"\n");
    assert!(read(&good).contains("p(\"good_msg\""));
}

#[test]
fn corrupt_lockfile_aborts_before_any_write() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".prompt_lock.json"), "{ not json").unwrap();
    let shop = write(dir.path(), "shop.py", SHOP);

    let err = Migrator::for_project(dir.path(), auto())
        .unwrap()
        .run(dir.path(), &mut AutoApprove)
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(
        err,
        MigrateError::Store(StoreError::LockfileCorrupt { .. })
    ));
    assert_eq!(read(&shop), SHOP);
    assert!(!dir.path().join("prompts").exists());
}

#[test]
fn skipped_literals_are_counted() {
    let dir = tempfile::tempdir().unwrap();
    let source = "\
short = f\"Hi {x}\"
raw = rf\"Raw {path}\\d literal\"
joined = f\"Concatenated {x} here\" \"tail\"
converted = f\"Converted {value!r} field\"
";
    let file = write(dir.path(), "skips.py", source);

    let summary = run(dir.path(), auto());
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.unsupported, 1);
    assert_eq!(summary.accepted, 0);
    assert_eq!(read(&file), source);
}

#[test]
fn target_names_restrict_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(
        dir.path(),
        "agent.py",
        "system_prompt = f\"You are {role}, be helpful\"\nlog_line = f\"Handled {count} requests\"\n",
    );

    let summary = run(dir.path(), auto().with_target_names(["prompt"]));
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.skipped, 1);
    assert!(read(&file).contains("log_line = f\"Handled {count} requests\""));
}

#[test]
fn combined_layout_is_honoured() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".promptkit.yaml"), "layout: combined\n").unwrap();
    write(dir.path(), "shop.py", SHOP);

    run(dir.path(), auto());

    let document: serde_yaml::Value =
        serde_yaml::from_str(&read(&dir.path().join("prompts.yaml"))).unwrap();
    assert!(document.get("shop_msg").is_some());

    let store = CombinedStore::new(dir.path().join("prompts.yaml"));
    let stored = store.latest(&id("shop_msg")).unwrap().unwrap();
    assert_eq!(stored.template(), "Hello {user_name}, price: {price:.2f}");
    assert!(!dir.path().join("prompts").exists());
}
