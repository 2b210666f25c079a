pub mod run;
pub mod state;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::Config;

/// `hubline config`: print the effective configuration, never the token itself.
pub fn show_config(config: &Config) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec!["HubSpot base URL", &config.hubspot.base_url]);
    table.add_row(vec![
        "HubSpot token",
        if config.hubspot.access_token.is_some() {
            "configured"
        } else {
            "not set"
        },
    ]);
    table.add_row(vec![
        "Request timeout",
        &format!("{}s", config.hubspot.timeout_secs),
    ]);
    table.add_row(vec![
        "Retries",
        &format!(
            "{} attempts, base {}ms, 429 default {}s",
            config.retry.max_retries,
            config.retry.base_delay_ms,
            config.retry.default_retry_after_secs
        ),
    ]);
    table.add_row(vec![
        "BigQuery project",
        config.warehouse.project_id.as_deref().unwrap_or("not set"),
    ]);
    table.add_row(vec![
        "BigQuery dataset",
        config.warehouse.dataset_id.as_deref().unwrap_or("not set"),
    ]);
    table.add_row(vec![
        "Credentials",
        config
            .warehouse
            .credentials_file
            .as_deref()
            .unwrap_or("application default"),
    ]);
    table.add_row(vec![
        "Batch size",
        &config.warehouse.batch_size.to_string(),
    ]);
    table.add_row(vec!["State file", &config.state.path.display().to_string()]);

    let resources: Vec<String> = config.resources().iter().map(|r| r.to_string()).collect();
    table.add_row(vec!["Resources", &resources.join(", ")]);

    eprintln!("\n{table}");
}
