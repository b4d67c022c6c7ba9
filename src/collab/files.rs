//! Filesystem search over configured roots
//!
//! Recursive filename-contains matching, capped at a configured number of
//! results. Unreadable directories are skipped.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use super::FileIndex;

/// One file matched by the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHit {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Coarse category derived from the extension
    pub kind: &'static str,
}

/// [`FileIndex`] walking a fixed set of directory roots.
pub struct FsFileIndex {
    roots: Vec<PathBuf>,
    max_results: usize,
}

impl FsFileIndex {
    pub fn new(roots: Vec<PathBuf>, max_results: usize) -> Self {
        Self { roots, max_results }
    }
}

#[async_trait]
impl FileIndex for FsFileIndex {
    async fn search(&self, query: &str) -> Vec<FileHit> {
        let roots = self.roots.clone();
        let max = self.max_results;
        let query = query.to_lowercase();

        // Directory walking is blocking work; keep it off the async threads.
        tokio::task::spawn_blocking(move || {
            let mut results = Vec::new();
            for root in &roots {
                if results.len() >= max {
                    break;
                }
                walk(root, &query, max, &mut results);
            }
            results
        })
        .await
        .unwrap_or_else(|e| {
            warn!(?e, "file search task failed");
            Vec::new()
        })
    }
}

fn walk(dir: &Path, query: &str, max: usize, results: &mut Vec<FileHit>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        if results.len() >= max {
            return;
        }

        let path = entry.path();
        if path.is_dir() {
            walk(&path, query, max, results);
            continue;
        }

        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        if !name.to_lowercase().contains(query) {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(_) => continue,
        };

        results.push(FileHit {
            kind: file_kind(&path),
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::from),
            name,
            path,
        });
    }
}

fn file_kind(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "md" => "text",
        "pdf" | "doc" | "docx" => "document",
        "jpg" | "jpeg" | "png" | "gif" => "image",
        "mp3" | "wav" | "ogg" | "oga" => "audio",
        "mp4" | "avi" | "mov" => "video",
        "zip" | "tar" | "gz" => "archive",
        "py" | "js" | "rs" | "html" | "css" => "code",
        "json" | "csv" => "data",
        "xlsx" | "xls" => "spreadsheet",
        _ => "unknown",
    }
}

/// Human-readable size, one decimal.
pub fn format_file_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0B".to_string();
    }

    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size_bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < units.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1}{}", units[unit])
}

/// Numbered result list for replies.
pub fn format_search_results(results: &[FileHit]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "{}. {} ({}) - {}",
                i + 1,
                hit.name,
                format_file_size(hit.size),
                hit.path.display()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str, contents: &[u8]) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn test_search_matches_filename_substring() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "quarterly-report.pdf", b"x");
        touch(dir.path(), "notes.txt", b"x");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested"), "old-report.doc", b"x");

        let index = FsFileIndex::new(vec![dir.path().to_path_buf()], 10);
        let mut hits = index.search("report").await;
        hits.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "old-report.doc");
        assert_eq!(hits[0].kind, "document");
        assert_eq!(hits[1].name, "quarterly-report.pdf");
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_capped() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            touch(dir.path(), &format!("Invoice-{i}.pdf"), b"x");
        }

        let index = FsFileIndex::new(vec![dir.path().to_path_buf()], 3);
        let hits = index.search("invoice").await;
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_root_contributes_nothing() {
        let index = FsFileIndex::new(vec![PathBuf::from("/does/not/exist")], 10);
        assert!(index.search("anything").await.is_empty());
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0B");
        assert_eq!(format_file_size(512), "512.0B");
        assert_eq!(format_file_size(2048), "2.0KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0MB");
    }

    #[test]
    fn test_format_search_results() {
        let hits = vec![FileHit {
            name: "a.txt".into(),
            path: PathBuf::from("/tmp/a.txt"),
            size: 1024,
            modified: None,
            kind: "text",
        }];
        assert_eq!(format_search_results(&hits), "1. a.txt (1.0KB) - /tmp/a.txt");
    }
}
