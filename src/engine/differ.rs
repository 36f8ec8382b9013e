//! Plan rendering

use crate::ui;
use colored::Colorize;
use declarative::{
    Action, AttributePath, ChangeKind, DiffSummary, ExecutionPlan, FieldChange, PathStep,
    PlannedInstance, Value,
};
use similar::{ChangeTag, TextDiff};

/// Attributes whose values never appear in plan output
const SENSITIVE: &[&str] = &["secret"];

/// Print every change in the plan, then the plan errors and the summary line.
pub fn display_plan(plan: &ExecutionPlan) {
    for line in render_plan(plan) {
        println!("{line}");
    }
}

pub fn render_plan(plan: &ExecutionPlan) -> Vec<String> {
    let mut lines = Vec::new();

    for instance in plan.changes() {
        lines.push(String::new());
        lines.extend(render_instance(instance));
    }

    for (address, diagnostics) in &plan.errors {
        lines.push(String::new());
        lines.push(format!("  {} {}", "✗".red(), address.to_string().bold()));
        for diagnostic in diagnostics.iter() {
            lines.push(format!("      {diagnostic}"));
        }
    }

    lines.push(String::new());
    lines.push(summary_line(&plan.summary()));
    lines
}

pub fn summary_line(summary: &DiffSummary) -> String {
    if !summary.has_changes() {
        return format!("  {} No changes. Remote objects match the configuration.", "✓".green());
    }
    format!(
        "  {} {} to create, {} to update, {} to replace, {} to destroy.",
        "Plan:".bold(),
        summary.additions,
        summary.modifications,
        summary.replacements,
        summary.removals
    )
}

fn render_instance(instance: &PlannedInstance) -> Vec<String> {
    let action = instance.action();
    let mut lines = vec![format!(
        "  {} {} {}",
        ui::action_symbol(action),
        instance.address.to_string().bold(),
        format!("({action})").dimmed()
    )];

    // Deletes list nothing but the address.
    if action == Action::Delete {
        return lines;
    }
    for change in &instance.change.changes {
        lines.extend(render_change(change));
    }
    lines
}

fn render_change(change: &FieldChange) -> Vec<String> {
    let path = change.path.to_string();
    if is_sensitive(&change.path) {
        let symbol = change_symbol(change.kind);
        return vec![format!("      {symbol} {path} = {}", "(sensitive)".dimmed())];
    }

    match change.kind {
        ChangeKind::Added => vec![format!("      {} {path} = {}", "+".green(), change.after)],
        ChangeKind::Removed => {
            vec![format!("      {} {path} = {}", "-".red(), change.before.to_string().dimmed())]
        }
        ChangeKind::Modified => match text_diff(&change.before, &change.after) {
            Some(diff) => {
                let mut lines = vec![format!("      {} {path}:", "~".yellow())];
                lines.extend(diff);
                lines
            }
            None => vec![format!(
                "      {} {path}: {} → {}",
                "~".yellow(),
                change.before.to_string().dimmed(),
                change.after
            )],
        },
    }
}

fn change_symbol(kind: ChangeKind) -> colored::ColoredString {
    match kind {
        ChangeKind::Added => "+".green(),
        ChangeKind::Removed => "-".red(),
        ChangeKind::Modified => "~".yellow(),
    }
}

fn is_sensitive(path: &AttributePath) -> bool {
    path.steps()
        .iter()
        .any(|step| matches!(step, PathStep::Attr(name) if SENSITIVE.contains(&name.as_str())))
}

/// Line diff for JSON documents and multi-line strings; `None` for values
/// that read fine on one line.
fn text_diff(before: &Value, after: &Value) -> Option<Vec<String>> {
    let (Value::String(before), Value::String(after)) = (before, after) else {
        return None;
    };
    let (before, after) = match (pretty_json(before), pretty_json(after)) {
        (Some(b), Some(a)) => (b, a),
        _ if before.contains('\n') || after.contains('\n') => (before.clone(), after.clone()),
        _ => return None,
    };

    let diff = TextDiff::from_lines(&before, &after);
    let lines = diff
        .iter_all_changes()
        .filter_map(|change| {
            let text = change.value().trim_end_matches('\n');
            match change.tag() {
                ChangeTag::Delete => Some(format!("          {}", format!("- {text}").red())),
                ChangeTag::Insert => Some(format!("          {}", format!("+ {text}").green())),
                ChangeTag::Equal => None,
            }
        })
        .collect();
    Some(lines)
}

/// Pretty-print a JSON object or array so that a line diff is readable.
fn pretty_json(text: &str) -> Option<String> {
    let trimmed = text.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let mut pretty = serde_json::to_string_pretty(&value).ok()?;
    pretty.push('\n');
    Some(pretty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Address, AttributeTree, PlannedChange, SharedResource};
    use std::sync::Arc;

    fn plain() {
        colored::control::set_override(false);
    }

    fn change(path: &str, kind: ChangeKind, before: Value, after: Value) -> FieldChange {
        FieldChange {
            path: AttributePath::root().attr(path),
            kind,
            before,
            after,
        }
    }

    #[test]
    fn test_scalar_change_on_one_line() {
        plain();
        let lines = render_change(&change(
            "tier",
            ChangeKind::Modified,
            Value::string("standard"),
            Value::string("critical"),
        ));
        assert_eq!(lines, vec![r#"      ~ tier: "standard" → "critical""#]);
    }

    #[test]
    fn test_json_documents_diff_by_line() {
        plain();
        let lines = render_change(&change(
            "metadata",
            ChangeKind::Modified,
            Value::string(r#"{"oncall":true,"runbook":"a"}"#),
            Value::string(r#"{"oncall":true,"runbook":"b"}"#),
        ));
        assert_eq!(lines[0], "      ~ metadata:");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].trim_start().starts_with('-'));
        assert!(lines[1].ends_with(r#""runbook": "a""#));
        assert!(lines[2].trim_start().starts_with('+'));
        assert!(lines[2].ends_with(r#""runbook": "b""#));
    }

    #[test]
    fn test_secret_is_masked() {
        plain();
        let lines = render_change(&change(
            "secret",
            ChangeKind::Modified,
            Value::string("old"),
            Value::string("new"),
        ));
        assert_eq!(lines, vec!["      ~ secret = (sensitive)"]);
    }

    #[test]
    fn test_summary_line() {
        plain();
        assert!(summary_line(&DiffSummary::default()).contains("No changes"));
        let summary = DiffSummary::from_actions([Action::Create, Action::Delete]);
        assert_eq!(
            summary_line(&summary),
            "  Plan: 1 to create, 0 to update, 0 to replace, 1 to destroy."
        );
    }

    #[test]
    fn test_render_plan_lists_changes_only() {
        plain();
        let mock = beaconapi::MockBackend::new();
        let registry = crate::resource::Registry::new(&crate::resource::testing::mock_client(&mock));
        let team: SharedResource = Arc::clone(registry.resource("team").unwrap());

        let mut desired = AttributeTree::new();
        desired.set("name", Value::string("Platform"));
        let mut plan = ExecutionPlan::new();
        plan.add(Address::new("team", "platform"), team.clone(), None, Some(desired));
        plan.instances.push(PlannedInstance {
            address: Address::new("team", "quiet"),
            resource: team,
            prior: None,
            desired: None,
            change: PlannedChange::no_op(),
        });

        let lines = render_plan(&plan);
        assert!(lines.contains(&"  + team.platform (create)".to_string()));
        assert!(lines.contains(&r#"      + name = "Platform""#.to_string()));
        assert!(!lines.iter().any(|l| l.contains("team.quiet")));
        assert_eq!(
            lines.last().unwrap(),
            "  Plan: 1 to create, 0 to update, 0 to replace, 0 to destroy."
        );
    }
}
