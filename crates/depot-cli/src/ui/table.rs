//! Resource and backend tables

use comfy_table::presets::NOTHING;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use depot_core::{Resource, ResourcesBackend};
use depot_schema::ResourceState;
use serde::Serialize;

use super::format_size;

/// One resource, flattened for printing.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceRow {
    pub backend: String,
    pub package: String,
    pub name: String,
    pub state: ResourceState,
    pub installed_version: Option<String>,
    pub available_version: Option<String>,
    pub origin: String,
    pub size: u64,
    pub rating: Option<f32>,
    pub comment: String,
}

impl ResourceRow {
    pub fn from_resource(resource: &dyn Resource) -> Self {
        Self {
            backend: resource.backend_id().to_string(),
            package: resource.package_name().to_string(),
            name: resource.name().to_string(),
            state: resource.state(),
            installed_version: resource.installed_version().map(str::to_string),
            available_version: resource.available_version().map(str::to_string),
            origin: resource.origin().to_string(),
            size: resource.size(),
            rating: resource.rating().map(|r| r.average),
            comment: resource.comment().to_string(),
        }
    }

    /// `0.9 → 1.0` for upgrades, otherwise the most relevant single version.
    pub fn version(&self) -> String {
        let installed = self.installed_version.as_deref();
        let available = self.available_version.as_deref();
        if let (ResourceState::Upgradeable, Some(installed), Some(available)) =
            (self.state, installed, available)
        {
            return format!("{installed} → {available}");
        }
        let preferred = if self.state >= ResourceState::Installed {
            installed.or(available)
        } else {
            available.or(installed)
        };
        preferred.unwrap_or("?").to_string()
    }
}

/// One backend, flattened for printing.
#[derive(Debug, Clone, Serialize)]
pub struct BackendRow {
    pub name: String,
    pub display_name: String,
    pub resources: usize,
    pub updates: usize,
    pub security_updates: bool,
    pub fetching: bool,
    pub applications: bool,
    pub application_backend: bool,
}

impl BackendRow {
    pub fn from_backend(backend: &dyn ResourcesBackend, application_backend: bool) -> Self {
        Self {
            name: backend.id().to_string(),
            display_name: backend.display_name().to_string(),
            resources: backend.resources().len(),
            updates: backend.updates_count(),
            security_updates: backend.has_security_updates(),
            fetching: backend.is_fetching(),
            applications: backend.has_applications(),
            application_backend,
        }
    }
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(label).add_attribute(Attribute::Bold))
        .collect()
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn state_cell(state: ResourceState) -> Cell {
    let color = match state {
        ResourceState::Broken => Color::Red,
        ResourceState::None => Color::DarkGrey,
        ResourceState::Installed => Color::Green,
        ResourceState::Upgradeable => Color::Yellow,
    };
    Cell::new(state.label()).fg(color)
}

pub fn resource_table(rows: &[ResourceRow]) -> Table {
    let mut table = base_table();
    table.set_header(header(&["NAME", "VERSION", "STATE", "BACKEND", "SIZE", "DESCRIPTION"]));
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.package).add_attribute(Attribute::Bold),
            Cell::new(row.version()).fg(Color::DarkGrey),
            state_cell(row.state),
            Cell::new(format!("{}:{}", row.backend, row.origin)),
            Cell::new(format_size(row.size)).set_alignment(CellAlignment::Right),
            Cell::new(&row.comment),
        ]);
    }
    table
}

pub fn backend_table(rows: &[BackendRow]) -> Table {
    let mut table = base_table();
    table.set_header(header(&["BACKEND", "RESOURCES", "UPDATES", "STATUS"]));
    for row in rows {
        let mut flags = Vec::new();
        if row.fetching {
            flags.push("fetching");
        }
        if row.application_backend {
            flags.push("applications");
        }
        if row.security_updates {
            flags.push("security updates");
        }
        let name = if row.display_name == row.name {
            row.name.clone()
        } else {
            format!("{} ({})", row.name, row.display_name)
        };
        table.add_row(vec![
            Cell::new(name).add_attribute(Attribute::Bold),
            Cell::new(row.resources).set_alignment(CellAlignment::Right),
            Cell::new(row.updates).set_alignment(CellAlignment::Right),
            Cell::new(flags.join(", ")).fg(Color::DarkGrey),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(state: ResourceState, installed: Option<&str>, available: Option<&str>) -> ResourceRow {
        ResourceRow {
            backend: "apt".into(),
            package: "vim".into(),
            name: "Vim".into(),
            state,
            installed_version: installed.map(str::to_string),
            available_version: available.map(str::to_string),
            origin: "debian".into(),
            size: 2048,
            rating: None,
            comment: "Vi IMproved".into(),
        }
    }

    #[test]
    fn test_version_column() {
        assert_eq!(row(ResourceState::None, None, Some("1.0")).version(), "1.0");
        assert_eq!(row(ResourceState::Installed, Some("1.0"), Some("1.0")).version(), "1.0");
        assert_eq!(
            row(ResourceState::Upgradeable, Some("0.9"), Some("1.0")).version(),
            "0.9 → 1.0"
        );
        assert_eq!(row(ResourceState::Broken, None, None).version(), "?");
    }

    #[test]
    fn test_resource_table_lists_rows() {
        let rendered = resource_table(&[row(ResourceState::Installed, Some("1.0"), None)]).to_string();
        assert!(rendered.contains("NAME"));
        assert!(rendered.contains("vim"));
        assert!(rendered.contains("apt:debian"));
        assert!(rendered.contains("2.0 KB"));
    }
}
