//! List command

use anyhow::{Result, bail};
use depot_core::{Context, Filters, ResourcesProxyModel, SortOrder};
use depot_schema::{BackendId, ResourceState};
use std::time::Instant;

use crate::ui::{self, table::ResourceRow};
use crate::{ListArgs, ViewArgs};

/// List packages matching the given filters
pub async fn list(context: &mut Context, args: &ListArgs, json: bool) -> Result<()> {
    let start = Instant::now();

    let state = if args.upgradeable {
        ResourceState::Upgradeable
    } else if args.installed {
        ResourceState::Installed
    } else {
        ResourceState::None
    };
    let category = match &args.category {
        Some(name) => match context.category(name) {
            Some(category) => Some(category.clone()),
            None => bail!("Unknown category '{name}'"),
        },
        None => None,
    };
    let filters = Filters {
        state,
        category,
        origin: args.origin.clone().unwrap_or_default(),
        technical: args.technical.then_some(true),
        ..Filters::default()
    };

    let mut proxy = ResourcesProxyModel::new(&mut context.model);
    proxy.set_sort_role(args.sort);
    proxy.set_sort_order(if args.desc {
        SortOrder::Descending
    } else {
        SortOrder::Ascending
    });
    let rows = collect(context, &mut proxy, filters, &args.view).await;

    if json {
        return ui::print_json(&rows);
    }

    println!();
    if rows.is_empty() {
        ui::info("No packages found");
    } else {
        println!("{}", ui::table::resource_table(&rows));
    }
    println!();
    println!(
        "LIST COMPLETE {}, elapsed {:.2}s",
        rows.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Run `filters` through `proxy` and flatten every resulting row.
pub async fn collect(
    context: &Context,
    proxy: &mut ResourcesProxyModel,
    mut filters: Filters,
    view: &ViewArgs,
) -> Vec<ResourceRow> {
    filters.backend = view.backend.as_deref().map(BackendId::new);
    filters.all_backends = view.all_backends;
    proxy.set_filters(filters);
    proxy.wait_for_results(&context.model).await;

    (0..proxy.row_count())
        .filter_map(|row| proxy.resource_at(&context.model, row))
        .map(|resource| ResourceRow::from_resource(resource.as_ref()))
        .collect()
}
