pub mod cli;
pub mod commands;
pub mod config;
pub mod confirm;
pub mod render;
pub mod schema;
pub mod storage;
pub mod store;
pub mod todo;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use crate::confirm::{AssumeYes, Confirm, TerminalConfirm};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let pre = cli::preprocess_args(&raw_args)?;
    let cli = cli::GlobalCli::parse_from(pre.cleaned_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(verbose = cli.verbose, quiet = cli.quiet, "starting todo CLI");
    debug!(?pre.rc_overrides, "preprocessed rc overrides");

    let mut cfg = config::Config::load(cli.todorc.as_deref())?;
    cfg.apply_overrides(
        pre.rc_overrides
            .into_iter()
            .chain(cli.rc_overrides)
            .map(Into::into),
    );

    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;
    let storage = storage::FileStore::open(&data_dir)
        .with_context(|| format!("failed to open storage at {}", data_dir.display()))?;
    let mut store = store::TodoStore::load(storage, cfg.store_settings())?;

    let renderer = render::Renderer::new(&cfg);
    let inv = cli::Invocation::parse(&cfg, cli.command.as_deref(), cli.args)?;

    let mut confirm: Box<dyn Confirm> = if cli.yes || !cfg.get_bool("confirm").unwrap_or(true) {
        Box::new(AssumeYes)
    } else {
        Box::new(TerminalConfirm::stdio())
    };

    let mut out = io::stdout().lock();
    commands::dispatch(
        &mut store,
        &cfg,
        &renderer,
        confirm.as_mut(),
        inv,
        &mut out,
    )?;

    info!("done");
    Ok(())
}
