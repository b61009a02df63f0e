//! In-memory log sink for the HTTP server.
//!
//! Keeps the most recent lines for `GET /api/logs` and fans every new line
//! out to live subscribers.

use log::{LevelFilter, Metadata, Record, SetLoggerError};
use once_cell::sync::OnceCell;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::broadcast;

const LOG_CAPACITY: usize = 1000;

pub struct WebLogger {
    buffer: Mutex<VecDeque<String>>,
    sender: broadcast::Sender<String>,
}

impl WebLogger {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(LOG_CAPACITY);
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(LOG_CAPACITY)),
            sender,
        }
    }

    fn record(&self, line: String) {
        if let Ok(mut buffer) = self.buffer.lock() {
            if buffer.len() == LOG_CAPACITY {
                buffer.pop_front();
            }
            buffer.push_back(line.clone());
        }
        // No subscribers is fine
        let _ = self.sender.send(line);
    }
}

static LOGGER: OnceCell<WebLogger> = OnceCell::new();

impl log::Log for WebLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let line = format!(
                "{} {} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.target(),
                record.args()
            );
            eprintln!("{}", line);
            self.record(line);
        }
    }

    fn flush(&self) {}
}

/// Installs the web logger as the global logger.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    let logger = LOGGER.get_or_init(WebLogger::new);
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Buffered lines, oldest first. Empty when the web logger is not installed.
pub fn get_logs() -> Vec<String> {
    LOGGER
        .get()
        .and_then(|logger| {
            logger
                .buffer
                .lock()
                .ok()
                .map(|buffer| buffer.iter().cloned().collect())
        })
        .unwrap_or_default()
}

pub fn subscribe() -> Option<broadcast::Receiver<String>> {
    LOGGER.get().map(|logger| logger.sender.subscribe())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_keeps_most_recent_lines() {
        let logger = WebLogger::new();
        let mut receiver = logger.sender.subscribe();
        for i in 0..LOG_CAPACITY + 5 {
            logger.record(format!("line {}", i));
        }
        let buffer = logger.buffer.lock().unwrap();
        assert_eq!(buffer.len(), LOG_CAPACITY);
        assert_eq!(buffer.front().map(String::as_str), Some("line 5"));
        assert!(matches!(
            receiver.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(5))
        ));
        assert_eq!(receiver.try_recv().unwrap(), "line 5");
    }
}
