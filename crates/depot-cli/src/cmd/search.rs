//! Search command

use anyhow::{Result, bail};
use crossterm::style::Stylize;
use depot_core::{Context, Filters, ResourcesProxyModel};
use std::time::Instant;

use super::list::collect;
use crate::ViewArgs;
use crate::ui;

/// Search every backend, most relevant results first
pub async fn search(context: &mut Context, query: &str, view: &ViewArgs, json: bool) -> Result<()> {
    let query = query.trim();
    if query.chars().count() < 2 {
        bail!("Search text needs at least two characters");
    }

    let start = Instant::now();
    let mut proxy = ResourcesProxyModel::new(&mut context.model);
    let rows = collect(context, &mut proxy, Filters::search(query), view).await;

    if json {
        return ui::print_json(&rows);
    }

    println!();
    if rows.is_empty() {
        println!(
            "  {} No packages found matching '{}'",
            ui::ICON_INFO.blue(),
            query.white()
        );
        println!();
        return Ok(());
    }

    println!("{}", ui::table::resource_table(&rows));
    println!();
    println!(
        "SEARCH COMPLETE {}, elapsed {:.2}s",
        rows.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
