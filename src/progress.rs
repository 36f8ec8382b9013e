//! Progress bar for batch execution

use crate::ui;
use declarative::{Address, ApplyResult, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const TEMPLATE: &str = "{spinner:.green} {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}";

/// Reports executor progress on an indicatif bar.
///
/// Failures are printed above the bar as they arrive; everything else only
/// moves the bar.
pub struct BarProgress {
    label: &'static str,
    hidden: bool,
    bar: Option<ProgressBar>,
}

impl BarProgress {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            hidden: false,
            bar: None,
        }
    }

    /// Never draw; used for `--quiet`
    pub fn hidden(label: &'static str) -> Self {
        Self {
            hidden: true,
            ..Self::new(label)
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }
}

impl ProgressCallback for BarProgress {
    fn on_batch_start(&mut self, count: usize) {
        let bar = ProgressBar::new(count as u64);
        if self.hidden {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        bar.set_style(Self::style());
        bar.set_prefix(self.label);
        self.bar = Some(bar);
    }

    fn on_instance_start(&mut self, address: &Address) {
        if let Some(bar) = &self.bar {
            bar.set_message(address.to_string());
        }
    }

    fn on_instance_complete(&mut self, address: &Address, result: &ApplyResult) {
        let Some(bar) = &self.bar else {
            return;
        };
        if let ApplyResult::Failed { error } = result {
            bar.println(format!("  {} {address}: {error}", ui::result_symbol(result)));
        }
        bar.set_message(format!("{} {address}", ui::result_symbol(result)));
        bar.inc(1);
    }

    fn on_batch_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar_counts_instances() {
        let mut progress = BarProgress::hidden("Applying");
        progress.on_batch_start(2);
        let address = Address::new("team", "platform");
        progress.on_instance_start(&address);
        progress.on_instance_complete(&address, &ApplyResult::Created);
        progress.on_instance_complete(&address, &ApplyResult::Failed { error: "boom".into() });
        assert_eq!(progress.bar.as_ref().unwrap().position(), 2);

        progress.on_batch_complete();
        assert!(progress.bar.is_none());
    }

    #[test]
    fn test_completion_without_start_is_ignored() {
        let mut progress = BarProgress::hidden("Refreshing");
        progress.on_instance_complete(&Address::new("sla", "api"), &ApplyResult::NoChange);
        progress.on_batch_complete();
    }
}
