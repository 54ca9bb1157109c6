use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events for the refinement loop and publishing.
/// Iteration numbers are 1-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    RunStarted {
        run: usize,
        max_iterations: usize,
    },
    GenerationStarted {
        iteration: usize,
        topic: String,
        style: String,
        revision: bool,
    },
    DraftGenerated {
        iteration: usize,
        characters: usize,
        preview: String,
    },
    CritiqueStarted {
        iteration: usize,
    },
    CritiqueCompleted {
        iteration: usize,
        overall_score: f64,
        approved: bool,
        verdict: String,
        issues: usize,
    },
    RevisionRequested {
        iteration: usize,
        rewrite_direction: String,
    },
    RunCompleted {
        iterations: usize,
        approved: bool,
        overall_score: f64,
        duration_secs: f64,
    },
    IterationCeilingReached {
        iterations: usize,
    },
    RunFailed {
        iteration: usize,
        error: String,
    },
    PostPublished {
        post_id: String,
        characters: usize,
    },
    PublishFailed {
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for postloop events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::RunStarted {
                run,
                max_iterations,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let title = format!("postloop run {}", run);
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    title.bold().bright_white(),
                    Self::pad_to_border(title.len() + 2)
                );
                let limit = format!("Up to {} iterations", max_iterations);
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    limit.dimmed(),
                    Self::pad_to_border(limit.len() + 2)
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::GenerationStarted {
                iteration,
                topic,
                style,
                revision,
            } => {
                let iter_text = format!("─ Iteration {} ", iteration);
                let padding = "─".repeat(67usize.saturating_sub(iter_text.chars().count()));
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    iter_text.bright_blue().bold(),
                    padding.bright_blue()
                );
                let _ = writeln!(stderr);
                let label = if *revision { "REVISE" } else { "GENERATE" };
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_cyan(),
                    label.bright_cyan().bold()
                );
                let _ = writeln!(
                    stderr,
                    "    {} {} / {}",
                    "Topic:".dimmed(),
                    topic,
                    style.dimmed()
                );
            }
            LogEvent::DraftGenerated {
                characters,
                preview,
                ..
            } => {
                for line in preview.lines() {
                    let _ = writeln!(stderr, "{} {}", "    │".dimmed(), line);
                }
                let _ = writeln!(
                    stderr,
                    "    {} Draft ready ({} chars)",
                    "✓".bright_green(),
                    characters
                );
                let _ = writeln!(stderr);
            }
            LogEvent::CritiqueStarted { .. } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_magenta(),
                    "CRITIQUE".bright_magenta().bold()
                );
            }
            LogEvent::CritiqueCompleted {
                overall_score,
                approved,
                verdict,
                issues,
                ..
            } => {
                let summary = format!(
                    "Verdict: {} ({:.1}/10, {} issues)",
                    verdict, overall_score, issues
                );
                let styled = if *approved {
                    format!("✓ {}", summary).bright_green().to_string()
                } else {
                    format!("→ {}", summary).bright_yellow().to_string()
                };
                let _ = writeln!(stderr, "    {}", styled);
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "└─────────────────────────────────────────────────────────────────────┘"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::RevisionRequested {
                rewrite_direction,
                ..
            } => {
                if !rewrite_direction.is_empty() {
                    let _ = writeln!(
                        stderr,
                        "  {} {}",
                        "↻".bright_yellow(),
                        rewrite_direction.dimmed()
                    );
                    let _ = writeln!(stderr);
                }
            }
            LogEvent::RunCompleted { .. } => {
                // Final outcome is printed by the caller
            }
            LogEvent::IterationCeilingReached { iterations } => {
                let _ = writeln!(
                    stderr,
                    "{} Iteration ceiling reached ({}) without approval",
                    "⚠".bright_yellow(),
                    iterations
                );
            }
            LogEvent::RunFailed { iteration, error } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Run failed in iteration {}: {}",
                    "✗".bright_red(),
                    iteration,
                    error.bright_red()
                );
            }
            LogEvent::PostPublished { post_id, .. } => {
                let _ = writeln!(
                    stderr,
                    "{} Published post {}",
                    "✓".bright_green(),
                    post_id.bold()
                );
            }
            LogEvent::PublishFailed { error } => {
                let _ = writeln!(
                    stderr,
                    "{} Publish failed: {}",
                    "✗".bright_red(),
                    error.bright_red()
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::RunStarted { run, .. } => format!("[{}] run:start:{}", timestamp, run),
            LogEvent::GenerationStarted {
                iteration, topic, ..
            } => format!("[{}] gen:start:{} {}", timestamp, iteration, topic),
            LogEvent::DraftGenerated {
                iteration,
                characters,
                ..
            } => format!("[{}] gen:done:{} {}c", timestamp, iteration, characters),
            LogEvent::CritiqueStarted { iteration } => {
                format!("[{}] critic:start:{}", timestamp, iteration)
            }
            LogEvent::CritiqueCompleted {
                iteration,
                overall_score,
                verdict,
                ..
            } => format!(
                "[{}] critic:done:{} {} {:.1}",
                timestamp, iteration, verdict, overall_score
            ),
            LogEvent::RevisionRequested { .. } => return,
            LogEvent::RunCompleted {
                iterations,
                approved,
                duration_secs,
                ..
            } => format!(
                "[{}] run:done:{} approved={} {:.1}s",
                timestamp, iterations, approved, duration_secs
            ),
            LogEvent::IterationCeilingReached { iterations } => {
                format!("[{}] run:limit:{}", timestamp, iterations)
            }
            LogEvent::RunFailed { iteration, error } => {
                format!("[{}] error:{}:{}", timestamp, iteration, error)
            }
            LogEvent::PostPublished { post_id, .. } => {
                format!("[{}] publish:ok {}", timestamp, post_id)
            }
            LogEvent::PublishFailed { error } => {
                format!("[{}] publish:error {}", timestamp, error)
            }
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// Spaces plus the closing border for a banner line whose content is `used` wide
    fn pad_to_border(used: usize) -> String {
        format!(
            "{}{}",
            " ".repeat(68usize.saturating_sub(used + 1)),
            "│".bright_blue()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_with_tag() {
        let event = LogEvent::CritiqueCompleted {
            iteration: 2,
            overall_score: 7.25,
            approved: true,
            verdict: "APPROVE".into(),
            issues: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "critique_completed");
        assert_eq!(json["iteration"], 2);
        assert_eq!(json["verdict"], "APPROVE");
    }

    #[test]
    fn test_file_logger_appends_timestamped_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");
        let logger = Logger::with_file(LogFormat::Compact, &path).unwrap();

        logger.log(&LogEvent::RunStarted {
            run: 1,
            max_iterations: 3,
        });
        logger.log(&LogEvent::IterationCeilingReached { iterations: 3 });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "run_started");
        assert!(lines[1]["timestamp"].is_string());
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
