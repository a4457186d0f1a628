use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use issue_scout::RequestEvent;

use super::describe;

/// Interactive progress reporter using an indicatif spinner.
pub(crate) struct InteractiveReporter {
    spinner: Mutex<Option<ProgressBar>>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
        }
    }

    pub fn handle(&self, event: RequestEvent) {
        let mut spinner = self.spinner.lock().unwrap_or_else(|e| e.into_inner());

        match describe(&event) {
            Some(message) => {
                let bar = spinner.get_or_insert_with(|| {
                    let bar = ProgressBar::new_spinner();
                    bar.set_style(Self::spinner_style());
                    bar.enable_steady_tick(Duration::from_millis(100));
                    bar
                });
                let is_wait = matches!(
                    event,
                    RequestEvent::Throttling { .. }
                        | RequestEvent::RateLimited { .. }
                        | RequestEvent::Retrying { .. }
                );
                bar.set_style(if is_wait {
                    Self::wait_style()
                } else {
                    Self::spinner_style()
                });
                bar.set_message(message);
            }
            None => {
                if let Some(bar) = spinner.take() {
                    bar.finish_and_clear();
                }
            }
        }
    }

    pub fn finish(&self) {
        let mut spinner = self.spinner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = spinner.take() {
            bar.finish_and_clear();
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("Invalid template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn wait_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.yellow} {msg} {elapsed:.dim}")
            .expect("Invalid template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}
