//! Info command

use anyhow::Result;
use crossterm::style::Stylize;
use depot_core::Context;
use serde::Serialize;

use super::find_resource;
use crate::ui::{self, format_size, table::ResourceRow};

#[derive(Serialize)]
struct InfoOutput {
    #[serde(flatten)]
    row: ResourceRow,
    url: String,
    license: String,
    section: String,
    categories: Vec<String>,
    long_description: String,
    addons: Vec<AddonOutput>,
    transaction: Option<String>,
}

#[derive(Serialize)]
struct AddonOutput {
    package: String,
    name: String,
    installed: bool,
}

/// Show details about one package
pub fn info(context: &Context, package: &str, json: bool) -> Result<()> {
    let resource = find_resource(context, package)?;
    let row = ResourceRow::from_resource(resource.as_ref());
    let addons: Vec<AddonOutput> = resource
        .addons_information()
        .into_iter()
        .map(|a| AddonOutput {
            package: a.package_name,
            name: a.name,
            installed: a.installed,
        })
        .collect();
    let transaction = context
        .transactions
        .transaction_from_resource(&resource.key())
        .map(|t| t.status_text().to_string());

    if json {
        return ui::print_json(&InfoOutput {
            row,
            url: resource.url(),
            license: resource.license().to_string(),
            section: resource.section().to_string(),
            categories: resource.categories().to_vec(),
            long_description: resource.long_description().to_string(),
            addons,
            transaction,
        });
    }

    let lw = 12;
    println!();
    println!("  {} {}", row.name.as_str().white().bold(), row.version().dark_grey());
    if !row.comment.is_empty() {
        println!("  {}", row.comment);
    }
    println!();
    println!("  {:<lw$}{}", "package", row.package);
    println!("  {:<lw$}{}", "backend", row.backend);
    println!("  {:<lw$}{}", "origin", row.origin);
    println!("  {:<lw$}{}", "state", row.state);
    println!("  {:<lw$}{}", "size", format_size(row.size));
    if !resource.license().is_empty() {
        println!("  {:<lw$}{}", "license", resource.license());
    }
    if !resource.categories().is_empty() {
        println!("  {:<lw$}{}", "categories", resource.categories().join(", "));
    }
    if let Some(rating) = resource.rating() {
        println!("  {:<lw$}{:.1}/10 ({} ratings)", "rating", rating.average, rating.count);
    }
    println!("  {:<lw$}{}", "url", resource.url().dark_grey());
    if let Some(status) = &transaction {
        println!("  {:<lw$}{}", "transaction", status.as_str().yellow());
    }

    if !addons.is_empty() {
        println!();
        println!("  {}", "addons".bold());
        for addon in &addons {
            let mark = if addon.installed { ui::ICON_OK.green() } else { "-".dark_grey() };
            println!("    {} {:<20} {}", mark, addon.package, addon.name.as_str().dark_grey());
        }
    }

    if !resource.long_description().is_empty() {
        println!();
        for line in resource.long_description().lines() {
            println!("  {line}");
        }
    }
    println!();
    Ok(())
}
