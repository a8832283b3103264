use std::sync::Arc;

use prompt_runtime::{ResolveError, ResolveResult, Resolver, global, prompt, vars};
use prompt_store::{DirectoryStore, Lockfile, PromptId, TemplateStore};
use tempfile::TempDir;

#[prompt(id = "greeting")]
/// Hello {name}, you have {count} new messages.
fn greeting(name: &str, count: u32) {}

#[prompt(id = "summary")]
/// Summarise the following text in {words} words:
///
///     {text}
fn summary(text: String, words: usize) -> ResolveResult<String> {}

#[prompt(id = "strict")]
/// Needs {missing}.
fn strict(present: &str) {}

// The process-wide resolver is shared, so every scenario runs inside one test.
#[test]
fn attribute_functions_resolve_through_the_global_resolver() {
    let dir = TempDir::new().expect("tempdir");
    let store: Arc<dyn TemplateStore> = Arc::new(DirectoryStore::new(dir.path().join("prompts")));
    let lockfile_path = dir.path().join(".prompt_lock.json");
    global::install(Resolver::new(Arc::clone(&store), &lockfile_path));

    assert_eq!(
        greeting("Bo", 3).unwrap(),
        "Hello Bo, you have 3 new messages."
    );
    assert_eq!(
        summary("Rust is fast.".to_owned(), 5).unwrap(),
        "Summarise the following text in 5 words:\n\n    Rust is fast."
    );
    let err = strict("here").expect_err("missing variable");
    assert!(matches!(err, ResolveError::MissingVariable { name } if name == "missing"));

    let id = PromptId::new("greeting").unwrap();
    let version = store
        .write_new_version(&id, "Hi {name}! ({count})", Some("shorter greeting"))
        .unwrap();
    let mut lockfile = Lockfile::empty(&lockfile_path);
    lockfile.set(id, version);
    lockfile.save().unwrap();
    global::resolver().unwrap().reload().unwrap();

    assert_eq!(greeting("Bo", 3).unwrap(), "Hi Bo! (3)");
    assert_eq!(
        global::p("greeting", None, &vars!(name = "Al", count = 0)).unwrap(),
        "Hi Al! (0)"
    );

    global::set_project_root(dir.path()).unwrap();
    assert_eq!(greeting("Cy", 1).unwrap(), "Hi Cy! (1)");

    global::reset();
}
