use log::{error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

/// Sink for user-facing messages, the toast of a terminal app.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, title: &str, message: &str);
}

/// Logs every notification and echoes it to stderr so it is visible without `RUST_LOG`.
pub struct LogNotifier {
    echo: bool,
}

impl LogNotifier {
    pub fn new(echo: bool) -> Self {
        Self { echo }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, severity: Severity, title: &str, message: &str) {
        match severity {
            Severity::Error => error!("{}: {}", title, message),
            Severity::Success => info!("{}: {}", title, message),
        }
        if self.echo {
            let marker = match severity {
                Severity::Success => "*",
                Severity::Error => "!",
            };
            eprintln!("[{}] {} {}", marker, title, message);
        }
    }
}
