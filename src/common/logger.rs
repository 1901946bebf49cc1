use chrono::Local;
use colored::Colorize;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Prefixed console logger.
///
/// Each line goes to stdout with color and, uncolored, to `tracing` so the
/// file subscriber installed by `main` keeps a plain copy.
#[derive(Clone, Debug)]
pub struct Logger {
    prefix: String,
}

impl Logger {
    pub fn new(prefix: impl Into<String>) -> Self {
        Logger {
            prefix: prefix.into(),
        }
    }

    pub fn log(&self, message: String) -> String {
        let line = self.line(&message);
        println!("{} {}", self.stamp(), message);
        tracing::info!("{}", line);
        line
    }

    pub fn success(&self, message: String) -> String {
        let line = self.line(&message);
        println!("{} {}", self.stamp(), message.green());
        tracing::info!("{}", line);
        line
    }

    pub fn warn(&self, message: String) -> String {
        let line = self.line(&message);
        println!("{} {}", self.stamp(), message.yellow());
        tracing::warn!("{}", line);
        line
    }

    pub fn error(&self, message: String) -> String {
        let line = self.line(&message);
        eprintln!("{} {}", self.stamp(), message.red().italic());
        tracing::error!("{}", line);
        line
    }

    fn line(&self, message: &str) -> String {
        format!("{}{}", self.prefix, message)
    }

    fn stamp(&self) -> String {
        format!(
            "[{}] {}",
            Local::now().format(DATE_FORMAT),
            self.prefix.blue().bold()
        )
    }
}
