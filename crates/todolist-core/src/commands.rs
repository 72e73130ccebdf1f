use std::io::Write;

use anyhow::{Context, anyhow};
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::confirm::Confirm;
use crate::render::Renderer;
use crate::storage::KeyValueStore;
use crate::store::{DeleteOutcome, TodoStore};
use crate::todo::{Category, TodoId};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "list", "work", "travel", "mode", "done", "edit", "delete", "show", "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &str, known: &[&'a str]) -> Option<&'a str> {
    if let Some(exact) = known.iter().copied().find(|name| *name == token) {
        return Some(exact);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, confirm, inv, out))]
pub fn dispatch<S: KeyValueStore, W: Write>(
    store: &mut TodoStore<S>,
    cfg: &Config,
    renderer: &Renderer,
    confirm: &mut dyn Confirm,
    inv: Invocation,
    out: &mut W,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    let args = inv.command_args.as_slice();
    debug!(command, ?args, "dispatching command");

    match command {
        "add" => cmd_add(store, args, out),
        "list" => cmd_list(store, renderer, args, out),
        "work" => cmd_switch(store, renderer, Category::Work, out),
        "travel" => cmd_switch(store, renderer, Category::Travel, out),
        "mode" => {
            writeln!(out, "{}", store.mode())?;
            Ok(())
        }
        "done" => cmd_done(store, args, out),
        "edit" => cmd_edit(store, args, out),
        "delete" => cmd_delete(store, confirm, args, out),
        "show" => cmd_show(cfg, out),
        "help" => cmd_help(out),
        "version" => {
            writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn cmd_add<S: KeyValueStore, W: Write>(
    store: &mut TodoStore<S>,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command add");

    let text = args.join(" ");
    match store.add(&text, Utc::now())? {
        Some(id) => writeln!(out, "Created to-do {id} in {}.", store.mode())?,
        None => writeln!(out, "Nothing to add.")?,
    }
    Ok(())
}

fn cmd_list<S: KeyValueStore, W: Write>(
    store: &TodoStore<S>,
    renderer: &Renderer,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command list");

    match args.first().map(|a| a.to_ascii_lowercase()).as_deref() {
        None => renderer.write_board(&mut *out, store.mode(), &store.visible()),
        Some("all") => {
            for category in [Category::Work, Category::Travel] {
                writeln!(out, "{category}")?;
                renderer.write_todo_table(&mut *out, &store.list(category))?;
                writeln!(out)?;
            }
            Ok(())
        }
        Some(name) => {
            let category: Category = name.parse()?;
            renderer.write_board(&mut *out, category, &store.list(category))
        }
    }
}

fn cmd_switch<S: KeyValueStore, W: Write>(
    store: &mut TodoStore<S>,
    renderer: &Renderer,
    category: Category,
    out: &mut W,
) -> anyhow::Result<()> {
    info!(%category, "command switch");

    store.set_mode(category)?;
    renderer.write_board(&mut *out, category, &store.visible())
}

fn cmd_done<S: KeyValueStore, W: Write>(
    store: &mut TodoStore<S>,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command done");

    let id = parse_id(args)?;
    if store.toggle_done(id)? {
        writeln!(out, "Marked to-do {id} done.")?;
    } else {
        writeln!(out, "Marked to-do {id} not done.")?;
    }
    Ok(())
}

fn cmd_edit<S: KeyValueStore, W: Write>(
    store: &mut TodoStore<S>,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command edit");

    let id = parse_id(args)?;
    let text = args[1..].join(" ");
    store.edit_text(id, &text)?;
    writeln!(out, "Updated to-do {id}.")?;
    Ok(())
}

fn cmd_delete<S: KeyValueStore, W: Write>(
    store: &mut TodoStore<S>,
    confirm: &mut dyn Confirm,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command delete");

    let id = parse_id(args)?;
    match store.delete(id, confirm)? {
        DeleteOutcome::Deleted => writeln!(out, "Deleted to-do {id}.")?,
        DeleteOutcome::Cancelled => writeln!(out, "Kept to-do {id}.")?,
        DeleteOutcome::Missing => writeln!(out, "No to-do {id}.")?,
    }
    Ok(())
}

fn cmd_show<W: Write>(cfg: &Config, out: &mut W) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        writeln!(out, "{k}={v}")?;
    }
    Ok(())
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "usage: todo [options] <command> [args]\n\
         \n\
         commands:\n  \
           add <text>          add a to-do to the active list\n  \
           list [work|travel|all]\n                      show to-dos (default: active list)\n  \
           work | travel       switch the active list\n  \
           mode                print the active list\n  \
           done <id>           toggle completion\n  \
           edit <id> <text>    replace the text of a to-do\n  \
           delete <id>         delete a to-do after confirmation\n  \
           show                print effective configuration\n  \
           help | version"
    )?;
    Ok(())
}

fn parse_id(args: &[String]) -> anyhow::Result<TodoId> {
    let raw = args.first().context("missing to-do id")?;
    raw.parse()
}
