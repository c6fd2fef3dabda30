pub mod board;
pub mod calendar;
pub mod capability;
pub mod cli;
pub mod commands;
pub mod config;
pub mod convert;
pub mod datastore;
pub mod datetime;
pub mod detail;
pub mod error;
pub mod gesture;
pub mod optimistic;
pub mod order;
pub mod range;
pub mod render;
pub mod store;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::commands::CommandContext;
use crate::config::StoreBackend;
use crate::store::{
  FileOrderStore,
  HttpOrderStore,
  MemoryOrderStore
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting planboard CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  let role_override = cli
    .role
    .map(|role| {
      ("access.role".to_string(), role)
    });
  cfg.apply_overrides(
    pre
      .rc_overrides
      .into_iter()
      .chain(
        cli
          .rc_overrides
          .into_iter()
          .map(|kv| (kv.key, kv.value))
      )
      .chain(role_override)
  )?;

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let today =
    datetime::today_in_timezone(
      cfg.timezone()
    );
  let ctx = CommandContext {
    viewer: cfg.viewer(),
    today,
    data_dir,
    backend: cfg.store.backend,
    renderer: render::Renderer::new(
      &cfg
    )
  };
  let inv =
    cli::Invocation::parse(cli.rest)?;

  let runtime =
    tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  runtime.block_on(serve(
    &cfg, &ctx, inv
  ))?;

  info!("done");
  Ok(())
}

async fn serve(
  cfg: &config::Config,
  ctx: &CommandContext,
  inv: cli::Invocation
) -> anyhow::Result<()> {
  match cfg.store.backend {
    | StoreBackend::File => {
      let store = FileOrderStore::open(
        &ctx.data_dir
      )
      .with_context(|| {
        format!(
          "failed to open datastore at \
           {}",
          ctx.data_dir.display()
        )
      })?;
      commands::dispatch(
        Arc::new(store),
        ctx,
        inv
      )
      .await
    }
    | StoreBackend::Http => {
      let url = cfg
        .store
        .url
        .as_deref()
        .ok_or_else(|| {
          anyhow!(
            "store.url is required for \
             the http backend"
          )
        })?;
      let store = HttpOrderStore::new(
        url,
        Duration::from_secs(
          cfg.store.timeout_secs
        )
      )?;
      commands::dispatch(
        Arc::new(store),
        ctx,
        inv
      )
      .await
    }
    | StoreBackend::Memory => {
      // Seeded from the local file;
      // changes end with the process.
      let seed =
        datastore::DataStore::open(
          &ctx.data_dir
        )?
        .load_orders()?;
      commands::dispatch(
        Arc::new(MemoryOrderStore::new(
          seed
        )),
        ctx,
        inv
      )
      .await
    }
  }
}
