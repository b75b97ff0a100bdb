//! Remove command

use anyhow::{Context as _, Result};
use depot_core::Context;
use std::collections::HashMap;

use super::{find_resource, report_transactions};

/// Remove packages and wait for every transaction to finish
pub async fn remove(context: &mut Context, packages: &[String]) -> Result<()> {
    let mut targets = Vec::with_capacity(packages.len());
    for spec in packages {
        targets.push((spec, find_resource(context, spec)?.key()));
    }

    let mut events = context.transactions.subscribe();
    let mut names = HashMap::new();
    for (spec, key) in targets {
        let id = context
            .remove_application(&key)
            .with_context(|| format!("Cannot remove '{spec}'"))?;
        names.insert(id, spec.clone());
    }

    context.wait_for_transactions().await;
    report_transactions(&mut events, &names)
}
