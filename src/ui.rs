//! Sinks the controller uses to talk to the UI layer: toasts and route
//! changes. Both are fire-and-forget.

use console::style;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Info,
    Error,
}

/// Toast/notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: ToastLevel, message: &str);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
    /// Notice shown on the destination page (e.g. "session expired").
    pub notice: Option<String>,
}

/// `goTo(path, options)`.
pub trait Navigator: Send + Sync {
    fn go_to(&self, path: &str, options: NavigateOptions);
}

/// Prints toasts to stderr for the CLI.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, level: ToastLevel, message: &str) {
        let line = match level {
            ToastLevel::Success => style(format!("✓ {message}")).green(),
            ToastLevel::Info => style(format!("• {message}")).cyan(),
            ToastLevel::Error => style(format!("✗ {message}")).red(),
        };
        eprintln!("{line}");
    }
}

/// Records the last requested route. The CLI has no router, so it prints
/// the redirect and remembers it for the exit summary.
#[derive(Default)]
pub struct ConsoleNavigator {
    last: Mutex<Option<String>>,
}

impl ConsoleNavigator {
    pub fn last_path(&self) -> Option<String> {
        self.last.lock().clone()
    }
}

impl Navigator for ConsoleNavigator {
    fn go_to(&self, path: &str, options: NavigateOptions) {
        if let Some(notice) = &options.notice {
            eprintln!("{}", style(notice).yellow());
        }
        eprintln!("{} {}", style("→").dim(), style(path).bold());
        *self.last.lock() = Some(path.to_string());
    }
}

/// In-memory sinks that record every call. Used by tests and by embedders
/// that want to poll instead of being called back.
#[derive(Default)]
pub struct RecordingUi {
    toasts: Mutex<Vec<(ToastLevel, String)>>,
    redirects: Mutex<Vec<(String, NavigateOptions)>>,
}

impl RecordingUi {
    pub fn toasts(&self) -> Vec<(ToastLevel, String)> {
        self.toasts.lock().clone()
    }

    pub fn redirects(&self) -> Vec<(String, NavigateOptions)> {
        self.redirects.lock().clone()
    }

    pub fn last_redirect(&self) -> Option<(String, NavigateOptions)> {
        self.redirects.lock().last().cloned()
    }
}

impl Notifier for RecordingUi {
    fn notify(&self, level: ToastLevel, message: &str) {
        self.toasts.lock().push((level, message.to_string()));
    }
}

impl Navigator for RecordingUi {
    fn go_to(&self, path: &str, options: NavigateOptions) {
        self.redirects.lock().push((path.to_string(), options));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_ui_keeps_order() {
        let ui = RecordingUi::default();
        ui.notify(ToastLevel::Info, "one");
        ui.go_to("/a", NavigateOptions::default());
        ui.go_to(
            "/b",
            NavigateOptions {
                replace: true,
                notice: Some("hi".into()),
            },
        );
        assert_eq!(ui.toasts(), vec![(ToastLevel::Info, "one".to_string())]);
        assert_eq!(ui.redirects().len(), 2);
        let (path, opts) = ui.last_redirect().unwrap();
        assert_eq!(path, "/b");
        assert!(opts.replace);
    }

    #[test]
    fn console_navigator_remembers_last_path() {
        let nav = ConsoleNavigator::default();
        assert!(nav.last_path().is_none());
        nav.go_to("/dashboard", NavigateOptions::default());
        assert_eq!(nav.last_path().as_deref(), Some("/dashboard"));
    }
}
