//! Confirmation and result reporting around `declarative::execute`

use anyhow::Result;
use colored::Colorize;
use declarative::{ConfirmCallback, ExecuteReport, ExecuteSummary};

/// Asks on the terminal unless `--yes` was given.
pub struct PromptConfirm {
    pub yes: bool,
}

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.yes {
            return Ok(true);
        }

        use dialoguer::Confirm;

        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;

        Ok(confirmed)
    }
}

/// Print failures and warnings for every instance that reported any
pub fn print_diagnostics(report: &ExecuteReport) {
    for outcome in &report.outcomes {
        if outcome.diagnostics.is_empty() {
            continue;
        }
        println!();
        println!("  {} {}", "●".yellow(), outcome.address.to_string().bold());
        for diagnostic in outcome.diagnostics.iter() {
            if diagnostic.is_error() {
                println!("      {}", diagnostic.to_string().red());
            } else {
                println!("      {}", diagnostic.to_string().yellow());
            }
        }
    }
}

/// Print final summary
pub fn print_summary(verb: &str, summary: &ExecuteSummary) {
    println!();
    for line in summary_lines(verb, summary) {
        println!("{line}");
    }
}

fn summary_lines(verb: &str, summary: &ExecuteSummary) -> Vec<String> {
    let mut lines = Vec::new();
    if summary.is_success() {
        lines.push(format!("  {} {verb} complete", "✓".green().bold()));
    } else {
        lines.push(format!("  {} {verb} finished with errors", "⚠".yellow().bold()));
    }

    let counts = [
        (summary.created, "created"),
        (summary.updated, "updated"),
        (summary.replaced, "replaced"),
        (summary.deleted, "destroyed"),
        (summary.dropped, "gone upstream"),
        (summary.imported, "imported"),
        (summary.skipped, "skipped"),
    ];
    for (count, what) in counts {
        if count > 0 {
            lines.push(format!("    • {count} {what}"));
        }
    }
    if summary.failed > 0 {
        lines.push(format!("    • {} {}", summary.failed, "failed".red()));
    }
    lines
}
