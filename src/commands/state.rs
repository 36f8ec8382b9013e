//! `beacon state` - inspect and edit the state file

use super::Workspace;
use crate::Context;
use crate::cli::StateCommand;
use crate::ui;
use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use declarative::{Address, AttributeTree, Value};

pub fn run(ctx: &Context, cmd: StateCommand) -> Result<()> {
    let mut ws = Workspace::open(ctx)?;
    match cmd {
        StateCommand::List { kind } => {
            list(&ws, kind.as_deref());
            Ok(())
        }
        StateCommand::Show { address, json } => show(&ws, &address.parse()?, json),
        StateCommand::Rm { address } => {
            let address: Address = address.parse()?;
            forget(&mut ws, &address)?;
            ui::success(&format!("{address} is no longer tracked"));
            ui::dim("The remote object was left in place.");
            Ok(())
        }
    }
}

fn list(ws: &Workspace, kind: Option<&str>) {
    let addresses: Vec<&Address> = ws.state.addresses(kind).collect();
    if addresses.is_empty() {
        ui::info("No tracked instances");
        return;
    }
    for address in addresses {
        let id = ws
            .state
            .get(address)
            .and_then(|tree| tree.get("id").as_str().map(str::to_string))
            .unwrap_or_default();
        println!("{:<40} {}", address.to_string(), id.dimmed());
    }
}

fn show(ws: &Workspace, address: &Address, json: bool) -> Result<()> {
    let tree = ws
        .state
        .get(address)
        .with_context(|| format!("{address} is not tracked"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(tree)?);
        return Ok(());
    }

    ui::header(&address.to_string());
    for (name, value) in visible_attributes(tree) {
        ui::kv(name, &value);
    }
    Ok(())
}

/// Attributes to print, with write-only values masked
fn visible_attributes(tree: &AttributeTree) -> Vec<(&str, String)> {
    tree.iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| {
            let shown = match (name.as_str(), value) {
                ("secret", Value::String(_)) => "(sensitive)".to_string(),
                _ => value.to_string(),
            };
            (name.as_str(), shown)
        })
        .collect()
}

/// Stop tracking `address` and save the state.
pub fn forget(ws: &mut Workspace, address: &Address) -> Result<AttributeTree> {
    let removed = ws
        .state
        .remove(address)
        .with_context(|| format!("{address} is not tracked"))?;
    ws.save_state()?;
    Ok(removed)
}
