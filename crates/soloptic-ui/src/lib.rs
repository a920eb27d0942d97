// SPDX-License-Identifier: AGPL-3.0

//! Status line and styled output for the command line

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Failure,
    Warning,
    Info,
    Plain,
}

/// Spinner on stderr plus stdout printing that does not tear it
#[derive(Clone)]
pub struct UI {
    progress: Arc<Mutex<Option<ProgressBar>>>,
    term: Term,
    enabled: bool,
}

impl UI {
    /// `enabled = false` never draws a spinner (`--no-status`, JSON logs)
    pub fn new(enabled: bool) -> Self {
        Self {
            progress: Arc::new(Mutex::new(None)),
            term: Term::stderr(),
            enabled,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.term.is_term()
    }

    fn spinner_allowed(&self) -> bool {
        self.enabled && self.is_interactive()
    }

    pub fn start_status(&self, message: &str) {
        self.stop_status();

        if !self.spinner_allowed() {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(TICK_INTERVAL);

        if let Ok(mut guard) = self.progress.lock() {
            *guard = Some(pb);
        }
    }

    pub fn stop_status(&self) {
        if let Ok(mut guard) = self.progress.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    /// Print to stdout above the spinner
    pub fn print(&self, message: &str) {
        self.with_suspended(|| println!("{}", message));
    }

    pub fn print_styled(&self, message: &str, tone: Tone) {
        self.print(&styled(message, tone));
    }

    fn with_suspended<F: FnOnce()>(&self, f: F) {
        match self.progress.lock() {
            Ok(guard) => match *guard {
                Some(ref pb) => pb.suspend(f),
                None => f(),
            },
            Err(_) => f(),
        }
    }
}

impl Default for UI {
    fn default() -> Self {
        Self::new(true)
    }
}

pub fn styled(message: &str, tone: Tone) -> String {
    let styled = match tone {
        Tone::Success => style(message).green(),
        Tone::Failure => style(message).red().bold(),
        Tone::Warning => style(message).yellow(),
        Tone::Info => style(message).cyan(),
        Tone::Plain => style(message),
    };
    styled.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_never_spins() {
        let ui = UI::new(false);
        ui.start_status("Compiling");
        assert!(ui.progress.lock().unwrap().is_none());
        ui.print("still prints");
        ui.stop_status();
    }

    #[test]
    fn test_status_operations() {
        let ui = UI::new(true);
        ui.start_status("Step 1");
        ui.print("between steps");
        ui.start_status("Step 2");
        ui.stop_status();
        assert!(ui.progress.lock().unwrap().is_none());
    }

    #[test]
    fn test_print_without_status() {
        let ui = UI::default();
        ui.print("plain");
        ui.print_styled("ok", Tone::Success);
    }

    #[test]
    fn test_styled_plain_keeps_text() {
        console::set_colors_enabled(false);
        assert_eq!(styled("done", Tone::Success), "done");
        assert_eq!(styled("fail", Tone::Failure), "fail");
    }

    #[test]
    fn test_clone_shares_spinner() {
        let ui1 = UI::new(false);
        let ui2 = ui1.clone();
        ui1.stop_status();
        assert!(ui2.progress.lock().unwrap().is_none());
    }
}
