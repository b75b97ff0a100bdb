//! Command implementations
//!
//! Each submodule exposes one function named after its command. They all
//! run against a [`Context`] built by [`open_context`].

pub mod backends;
pub mod completions;
pub mod info;
pub mod install;
pub mod list;
pub mod remove;
pub mod search;
pub mod update;

use anyhow::{Context as _, Result, anyhow, bail};
use crossterm::style::Stylize;
use depot_core::{BackendRegistry, Context, DepotConfig, Resource, TransactionEvent};
use depot_schema::{BackendId, TransactionId, TransactionStatus};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::ui;

/// Load the configuration, build every enabled backend and wait for their
/// initial fetch.
pub async fn open_context(config: Option<&Path>, backends: &[String]) -> Result<Context> {
    let mut config = match config {
        Some(path) => DepotConfig::load(path),
        None => DepotConfig::load_default(),
    }
    .context("Failed to load configuration")?;

    config.apply_env();
    if !backends.is_empty() {
        config.restrict_backends(backends);
    }

    let mut context = Context::from_config(&config, &BackendRegistry::with_builtin()).await;
    context.wait_until_ready().await;
    tracing::debug!(
        backends = context.model.backends().count(),
        resources = context.model.row_count(),
        "Context ready"
    );
    Ok(context)
}

/// Find a package by name, or by `backend/name` to pick a backend explicitly.
///
/// A bare name resolves to the copy from the highest priority backend.
pub fn find_resource(context: &Context, spec: &str) -> Result<Arc<dyn Resource>> {
    if let Some((backend, name)) = spec.split_once('/') {
        let Some(found) = context.model.backend(&BackendId::new(backend)) else {
            bail!("Unknown backend '{backend}'");
        };
        return found
            .resources()
            .into_iter()
            .find(|r| r.package_name() == name)
            .ok_or_else(|| anyhow!("Package '{name}' not found in backend '{backend}'"));
    }
    context
        .model
        .resource_by_package_name(spec)
        .ok_or_else(|| anyhow!("Package '{spec}' not found"))
}

/// Print the outcome of every finished transaction in `names`.
///
/// Fails when any of them did not finish with `Done`.
pub fn report_transactions(
    events: &mut UnboundedReceiver<TransactionEvent>,
    names: &HashMap<TransactionId, String>,
) -> Result<()> {
    let mut failed = 0;
    println!();
    while let Ok(event) = events.try_recv() {
        match event {
            TransactionEvent::PassiveMessage { message, .. } => ui::info(&message),
            TransactionEvent::Removed {
                id, status, error, ..
            } => {
                let Some(name) = names.get(&id) else {
                    continue;
                };
                match status {
                    TransactionStatus::Done => {
                        println!("  {} {}", ui::ICON_OK.green(), name.as_str().white());
                    }
                    TransactionStatus::Cancelled => {
                        failed += 1;
                        println!(
                            "  {} {} {}",
                            ui::ICON_WARN.yellow(),
                            name.as_str().white(),
                            "cancelled".yellow()
                        );
                    }
                    _ => {
                        failed += 1;
                        let reason = error.unwrap_or_else(|| "unknown error".to_string());
                        println!(
                            "  {} {} {}",
                            ui::ICON_FAIL.red(),
                            name.as_str().white(),
                            reason.red()
                        );
                    }
                }
            }
            _ => {}
        }
    }
    println!();

    if failed > 0 {
        bail!("{failed} of {} transactions failed", names.len());
    }
    Ok(())
}
