//! `hubline state` - show where each resource's incremental pull stands

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use hubline_hubspot::{StateMap, WatermarkStore};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct StateArgs {
    /// Pull state file (overrides [state].path)
    #[arg(long)]
    pub state_file: Option<PathBuf>,
}

fn format_table(state: &StateMap) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Resource").fg(Color::Cyan),
            Cell::new("Watermark").fg(Color::Cyan),
            Cell::new("Next cursor").fg(Color::Cyan),
        ]);
    for (name, s) in state {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(s.timestamp.as_deref().unwrap_or("-")),
            Cell::new(s.after.as_deref().unwrap_or("-")),
        ]);
    }
    format!("\n{table}")
}

pub fn run(args: StateArgs, config: &Config) -> Result<()> {
    let path = args.state_file.unwrap_or_else(|| config.state.path.clone());
    let state = WatermarkStore::new(&path).load();
    if state.is_empty() {
        eprintln!("No pull state in {}", path.display());
        return Ok(());
    }
    eprintln!("{}", format_table(&state));
    Ok(())
}
