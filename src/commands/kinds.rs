//! `beacon kinds` - list the resource kinds this build manages

use crate::resource::Registry;
use crate::ui;
use anyhow::Result;
use beaconapi::{Client, ClientConfig};
use colored::Colorize;

pub fn run() -> Result<()> {
    // Listing kinds needs no credentials; the client is never called.
    let registry = Registry::new(&Client::new(ClientConfig::new("https://localhost")));

    ui::header("Resource kinds");
    for row in rows(&registry) {
        println!("  {}", row.bold());
    }
    Ok(())
}

fn rows(registry: &Registry) -> Vec<String> {
    registry
        .iter()
        .map(|(name, resource)| {
            let import = resource.import_grammar().unwrap_or("not importable");
            format!(
                "{name:<20} update: {:<10} import: {import}",
                resource.update_strategy().to_string()
            )
        })
        .collect()
}
