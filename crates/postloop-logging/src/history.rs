use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Oldest entries are dropped beyond this many
pub const MAX_HISTORY_ENTRIES: usize = 100;

/// One post attempt inside a history entry. Takes plain fields so this
/// crate does not depend on the loop types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub text: Option<String>,
    pub topic: Option<String>,
    pub style: Option<String>,
    pub character_count: Option<usize>,
    pub iterations: usize,
    pub approved: bool,
    pub overall_score: Option<f64>,
    pub posted: bool,
    pub post_id: Option<String>,
    pub error: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
}

/// A batch of post attempts recorded together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub posts: Vec<PostRecord>,
    pub posted: bool,
    pub success_count: usize,
    pub failed_count: usize,
}

impl HistoryEntry {
    pub fn new(posts: Vec<PostRecord>, posted: bool) -> Self {
        let success_count = posts.iter().filter(|p| p.text.is_some()).count();
        let failed_count = posts.len() - success_count;
        Self {
            timestamp: Utc::now(),
            posts,
            posted,
            success_count,
            failed_count,
        }
    }
}

/// Bounded JSON history of generated posts, by default at
/// `~/.local/share/postloop/generated_posts.json`.
pub struct PostHistory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PostHistory {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn default_path() -> io::Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine data directory",
            )
        })?;
        Ok(data_dir.join("postloop").join("generated_posts.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded entries, oldest first. A missing or corrupt file reads as empty.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_entries()
    }

    /// Append an entry, keeping only the newest [`MAX_HISTORY_ENTRIES`]
    pub fn append(&self, entry: HistoryEntry) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut entries = self.read_entries();
        entries.push(entry);
        if entries.len() > MAX_HISTORY_ENTRIES {
            let excess = entries.len() - MAX_HISTORY_ENTRIES;
            entries.drain(..excess);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, json)?;

        debug!(path = %self.path.display(), entries = entries.len(), "History updated");
        Ok(())
    }

    fn read_entries(&self) -> Vec<HistoryEntry> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Ignoring corrupt history file");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn published(text: &str) -> PostRecord {
        PostRecord {
            text: Some(text.to_string()),
            topic: Some("Caching".into()),
            style: Some("Quick List".into()),
            character_count: Some(text.chars().count()),
            iterations: 2,
            approved: true,
            overall_score: Some(7.5),
            posted: true,
            post_id: Some("1790".into()),
            error: None,
            generated_at: Some(Utc::now()),
        }
    }

    fn failed(error: &str) -> PostRecord {
        PostRecord {
            text: None,
            topic: None,
            style: None,
            character_count: None,
            iterations: 1,
            approved: false,
            overall_score: None,
            posted: false,
            post_id: None,
            error: Some(error.to_string()),
            generated_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let history = PostHistory::new(dir.path().join("nested").join("posts.json"));

        history
            .append(HistoryEntry::new(
                vec![published("first"), failed("model down")],
                true,
            ))
            .unwrap();

        let entries = history.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].success_count, 1);
        assert_eq!(entries[0].failed_count, 1);
        assert_eq!(entries[0].posts[0].text.as_deref(), Some("first"));
        assert_eq!(entries[0].posts[1].error.as_deref(), Some("model down"));
    }

    #[test]
    fn test_history_keeps_newest_entries() {
        let dir = TempDir::new().unwrap();
        let history = PostHistory::new(dir.path().join("posts.json"));

        for i in 0..(MAX_HISTORY_ENTRIES + 5) {
            history
                .append(HistoryEntry::new(vec![published(&format!("post {i}"))], false))
                .unwrap();
        }

        let entries = history.entries();
        assert_eq!(entries.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(entries[0].posts[0].text.as_deref(), Some("post 5"));
        assert_eq!(
            entries.last().unwrap().posts[0].text.as_deref(),
            Some("post 104")
        );
    }

    #[test]
    fn test_corrupt_file_treated_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("posts.json");
        fs::write(&path, "not json [").unwrap();
        let history = PostHistory::new(path);

        assert!(history.entries().is_empty());
        history.append(HistoryEntry::new(vec![], false)).unwrap();
        assert_eq!(history.entries().len(), 1);
    }
}
