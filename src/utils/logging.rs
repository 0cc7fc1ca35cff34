use crate::core::message::{Message, TranscriptRole};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

pub const LOG_FILTER_ENV_VAR: &str = "STREAMCHAT_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

/// Installs the stderr diagnostics subscriber.
///
/// `STREAMCHAT_LOG` takes `RUST_LOG`-style directives. Calling this twice is
/// harmless; the second call leaves the first subscriber in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Optional plain-text transcript of a session (`--log <file>`).
pub struct LoggingState {
    file_path: Option<String>,
}

impl LoggingState {
    pub fn new(log_file: Option<String>) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(path) = &log_file {
            Self::test_file_access(path)?;
        }
        Ok(LoggingState {
            file_path: log_file,
        })
    }

    pub fn get_status_string(&self) -> String {
        match &self.file_path {
            None => "disabled".to_string(),
            Some(path) => format!(
                "active ({})",
                Path::new(path)
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
            ),
        }
    }

    pub fn log_message(&self, message: &Message) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = &self.file_path else {
            return Ok(());
        };
        let Some(text) = format_entry(message) else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);
        write_entry(&mut writer, &text)?;
        writer.flush()?;
        Ok(())
    }

    /// Replaces the log with `messages`, e.g. after loading a chat's history.
    pub fn rewrite_transcript(&self, messages: &[Message]) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = &self.file_path else {
            return Ok(());
        };

        let target_path = Path::new(file_path);
        let parent = target_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp_file = NamedTempFile::new_in(parent)?;
        for text in messages.iter().filter_map(format_entry) {
            write_entry(&mut temp_file, &text)?;
        }
        temp_file.flush()?;
        temp_file.as_file().sync_all()?;
        temp_file.persist(file_path)?;
        Ok(())
    }

    fn test_file_access(path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.flush()?;
        Ok(())
    }
}

// Info notes stay on screen only.
fn format_entry(message: &Message) -> Option<String> {
    match message.role {
        TranscriptRole::User => Some(format!("You: {}", message.content)),
        TranscriptRole::Assistant if !message.content.is_empty() => Some(message.content.clone()),
        TranscriptRole::System => Some(format!("System: {}", message.content)),
        TranscriptRole::AppError => Some(format!("## {}", message.content)),
        _ => None,
    }
}

fn write_entry<W: Write>(writer: &mut W, text: &str) -> std::io::Result<()> {
    for line in text.lines() {
        writeln!(writer, "{line}")?;
    }
    writeln!(writer)
}
