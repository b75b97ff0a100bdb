//! Update command

use anyhow::Result;
use crossterm::style::Stylize;
use depot_core::{Context, Filters, ResourcesProxyModel};
use serde::Serialize;
use std::collections::HashMap;

use super::list::collect;
use super::report_transactions;
use crate::ViewArgs;
use crate::ui::{self, table::ResourceRow};

#[derive(Serialize)]
struct UpdateCheck {
    updates: usize,
    security_updates: bool,
    packages: Vec<ResourceRow>,
}

/// Refresh update information, then update every backend that has something pending
pub async fn update(context: &mut Context, check: bool, json: bool) -> Result<()> {
    context.model.check_for_updates();
    context.wait_until_ready().await;

    if check {
        return report_pending(context, json).await;
    }

    if context.model.updates_count() == 0 {
        println!();
        ui::info("Everything is up to date");
        println!();
        return Ok(());
    }

    let mut events = context.transactions.subscribe();
    let started = context.update_all()?;
    let names: HashMap<_, _> = started
        .iter()
        .filter_map(|id| {
            let transaction = context.transactions.transaction(*id)?;
            Some((*id, format!("{} ({})", transaction.name(), transaction.backend())))
        })
        .collect();

    context.wait_for_transactions().await;
    report_transactions(&mut events, &names)
}

async fn report_pending(context: &mut Context, json: bool) -> Result<()> {
    let mut proxy = ResourcesProxyModel::new(&mut context.model);
    let every_backend = ViewArgs {
        all_backends: true,
        ..ViewArgs::default()
    };
    let packages = collect(context, &mut proxy, Filters::upgradeable(), &every_backend).await;

    let summary = UpdateCheck {
        updates: context.model.updates_count(),
        security_updates: context.model.has_security_updates(),
        packages,
    };
    if json {
        return ui::print_json(&summary);
    }

    println!();
    if summary.updates == 0 {
        ui::info("Everything is up to date");
        println!();
        return Ok(());
    }
    println!("{}", ui::table::resource_table(&summary.packages));
    println!();
    let mut line = format!("{} updates available", summary.updates);
    if summary.security_updates {
        line.push_str(", including security fixes");
    }
    println!("  {} {}", ui::ICON_INFO.blue(), line.as_str().bold());
    println!();
    Ok(())
}
