//! Install command

use anyhow::{Context as _, Result};
use depot_core::Context;
use depot_schema::AddonList;
use std::collections::HashMap;

use super::{find_resource, report_transactions};

/// Install packages and wait for every transaction to finish
///
/// Addon flags apply to every named package. On an installed package they
/// turn the install into an addon change.
pub async fn install(
    context: &mut Context,
    packages: &[String],
    addons: &[String],
    remove_addons: &[String],
) -> Result<()> {
    let mut addon_list = AddonList::new();
    for addon in addons {
        addon_list.add_install(addon.as_str());
    }
    for addon in remove_addons {
        addon_list.add_remove(addon.as_str());
    }

    // Resolve everything first so a typo queues nothing
    let mut targets = Vec::with_capacity(packages.len());
    for spec in packages {
        targets.push((spec, find_resource(context, spec)?.key()));
    }

    let mut events = context.transactions.subscribe();
    let mut names = HashMap::new();
    for (spec, key) in targets {
        let id = context
            .install_application(&key, &addon_list)
            .with_context(|| format!("Cannot install '{spec}'"))?;
        names.insert(id, spec.clone());
    }

    context.wait_for_transactions().await;
    report_transactions(&mut events, &names)
}
