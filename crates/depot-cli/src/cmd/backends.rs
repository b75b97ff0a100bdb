//! Backends command

use anyhow::Result;
use depot_core::Context;
use depot_schema::BackendId;

use crate::ui::{self, table::BackendRow};

/// Show every registered backend and the ones that were turned away
pub fn backends(context: &Context, json: bool) -> Result<()> {
    let current = context.model.current_application_backend();
    let rows: Vec<BackendRow> = context
        .model
        .backends()
        .map(|b| BackendRow::from_backend(b.as_ref(), current == Some(b.id())))
        .collect();

    if json {
        return ui::print_json(&rows);
    }

    println!();
    if rows.is_empty() {
        ui::info("No backends enabled. Add [[backends]] entries to the configuration.");
    } else {
        println!("{}", ui::table::backend_table(&rows));
    }

    let blacklist = context.model.blacklist();
    if !blacklist.is_empty() {
        let names: Vec<&str> = blacklist.iter().map(BackendId::as_str).collect();
        println!();
        ui::warn(&format!("Disabled after failing to start: {}", names.join(", ")));
    }
    println!();
    Ok(())
}
