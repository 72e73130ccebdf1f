use std::ffi::OsString;

use chrono::{Duration, Utc};
use clap::Parser;
use todolist_core::cli::{GlobalCli, Invocation, preprocess_args};
use todolist_core::commands::dispatch;
use todolist_core::config::Config;
use todolist_core::confirm::{AssumeNo, AssumeYes};
use todolist_core::render::Renderer;
use todolist_core::storage::{FileStore, KeyValueStore, MODE_KEY, TODOS_KEY};
use todolist_core::store::{DeleteOutcome, StoreSettings, TodoStore};
use todolist_core::todo::Category;
use tempfile::tempdir;

#[test]
fn work_and_travel_scenario_survives_restart() {
    let temp = tempdir().expect("tempdir");
    let storage = FileStore::open(temp.path()).expect("open storage");
    let mut store = TodoStore::load(&storage, StoreSettings::default()).expect("load store");
    assert_eq!(store.mode(), Category::Work);

    let now = Utc::now();
    let milk = store
        .add("Buy milk", now)
        .expect("add milk")
        .expect("non-empty text");
    store.set_mode(Category::Travel).expect("switch to travel");
    let flight = store
        .add("Book flight", now + Duration::milliseconds(1))
        .expect("add flight")
        .expect("non-empty text");
    assert_eq!(store.len(), 2);

    let work: Vec<_> = store.list(Category::Work);
    assert_eq!(work.len(), 1);
    assert_eq!(work[0].1.text, "Buy milk");
    let travel: Vec<_> = store.list(Category::Travel);
    assert_eq!(travel.len(), 1);
    assert_eq!(travel[0].1.text, "Book flight");

    assert!(store.toggle_done(milk).expect("toggle"));
    assert!(store.get(milk).expect("milk exists").done);

    assert_eq!(
        store.delete(milk, &mut AssumeYes).expect("delete"),
        DeleteOutcome::Deleted
    );
    assert_eq!(store.len(), 1);
    assert!(store.get(flight).is_some());

    let reopened = FileStore::open(temp.path()).expect("reopen storage");
    let reloaded = TodoStore::load(reopened, StoreSettings::default()).expect("reload");
    assert_eq!(reloaded.mode(), Category::Travel);
    assert_eq!(reloaded.len(), 1);
    let (id, todo) = reloaded.iter().next().expect("one to-do");
    assert_eq!(id, flight);
    assert_eq!(todo.text, "Book flight");
    assert_eq!(todo.category, Category::Travel);
    assert!(!todo.done);
}

#[test]
fn legacy_slots_written_by_older_releases_load() {
    let temp = tempdir().expect("tempdir");
    let storage = FileStore::open(temp.path()).expect("open storage");
    storage
        .set_item(
            TODOS_KEY,
            r#"{"1650000000000":{"text":"Pack bags","work":false,"done":true},"1650000000500":{"text":"Expense report","work":true,"done":false}}"#,
        )
        .expect("seed todos");
    storage.set_item(MODE_KEY, "false").expect("seed mode");

    let store = TodoStore::load(&storage, StoreSettings::default()).expect("load");
    assert_eq!(store.mode(), Category::Travel);
    let visible = store.visible();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].1.text, "Pack bags");
    assert!(visible[0].1.done);
}

fn run_command(
    store: &mut TodoStore<&FileStore>,
    args: &[&str],
    confirm_yes: bool,
) -> String {
    let cfg = Config::default();
    let mut raw = vec![OsString::from("todo")];
    raw.extend(args.iter().map(OsString::from));
    let pre = preprocess_args(&raw).expect("preprocess");
    assert!(pre.rc_overrides.is_empty());
    let cli = GlobalCli::parse_from(pre.cleaned_args);
    let inv = Invocation::parse(&cfg, cli.command.as_deref(), cli.args).expect("parse invocation");
    let mut out = Vec::new();
    let result = if confirm_yes {
        dispatch(store, &cfg, &Renderer::plain(), &mut AssumeYes, inv, &mut out)
    } else {
        dispatch(store, &cfg, &Renderer::plain(), &mut AssumeNo, inv, &mut out)
    };
    result.expect("dispatch");
    String::from_utf8(out).expect("utf8 output")
}

#[test]
fn commands_drive_the_store() {
    let temp = tempdir().expect("tempdir");
    let storage = FileStore::open(temp.path()).expect("open storage");
    let mut store = TodoStore::load(&storage, StoreSettings::default()).expect("load");

    let created = run_command(&mut store, &["add", "Write", "minutes"], false);
    assert!(created.starts_with("Created to-do "));
    assert!(created.trim_end().ends_with("in Work."));
    let (id, _) = store.iter().next().expect("created");

    assert_eq!(run_command(&mut store, &["add"], false), "Nothing to add.\n");

    let noted = run_command(&mut store, &["add", "read", "rc.local:notes"], false);
    assert!(noted.starts_with("Created to-do "));
    let (_, newest) = store.iter().last().expect("newest");
    assert_eq!(newest.text, "read rc.local:notes");

    let board = run_command(&mut store, &["list"], false);
    assert!(board.contains("[Work]"));
    assert!(board.contains("Write minutes"));

    let done = run_command(&mut store, &["done", &id.to_string()], false);
    assert_eq!(done, format!("Marked to-do {id} done.\n"));

    run_command(&mut store, &["edit", &id.to_string(), "Send", "minutes"], false);
    assert_eq!(store.get(id).expect("exists").text, "Send minutes");

    let travel_board = run_command(&mut store, &["travel"], false);
    assert!(travel_board.contains("[Travel]"));
    assert!(travel_board.contains("Where do you want to go?"));
    assert_eq!(run_command(&mut store, &["mode"], false), "Travel\n");

    let everything = run_command(&mut store, &["list", "all"], false);
    assert!(everything.contains("Send minutes"));

    let kept = run_command(&mut store, &["delete", &id.to_string()], false);
    assert_eq!(kept, format!("Kept to-do {id}.\n"));
    let gone = run_command(&mut store, &["delete", &id.to_string()], true);
    assert_eq!(gone, format!("Deleted to-do {id}.\n"));
    let missing = run_command(&mut store, &["delete", &id.to_string()], true);
    assert_eq!(missing, format!("No to-do {id}.\n"));
    assert!(store.is_empty());
}
