//! Terminal output

pub mod table;

use anyhow::Result;
use crossterm::style::Stylize;
use serde::Serialize;

pub const ICON_OK: &str = "✔";
pub const ICON_FAIL: &str = "✘";
pub const ICON_WARN: &str = "⚠";
pub const ICON_INFO: &str = "ℹ";

/// Human readable byte count (`1.5 MB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

pub fn info(message: &str) {
    println!("  {} {}", ICON_INFO.blue(), message);
}

pub fn warn(message: &str) {
    println!("  {} {}", ICON_WARN.yellow(), message);
}

/// Pretty-printed JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
