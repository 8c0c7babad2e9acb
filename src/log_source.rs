use chrono::NaiveDateTime;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use serde::Serialize;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::notifier::NotificationSink;
use crate::session::LogSession;

const LOG_TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %Y";
const LOGS_DIRECTORY_NAME: &str = "Logs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub file_path: String,
    pub total_lines: u64,
    pub framed_lines: u64,
    pub notifications: u64,
}

/// Splits `[Fri Dec 23 14:35:32 2022] text` into its timestamp and text.
pub fn split_log_line(line: &str) -> Option<(NaiveDateTime, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (header, text) = line.strip_prefix('[')?.split_once("] ")?;
    let timestamp = NaiveDateTime::parse_from_str(header.trim(), LOG_TIMESTAMP_FORMAT).ok()?;

    Some((timestamp, text))
}

/// Resolves a configured location to a log file.
///
/// A file is used as-is; a directory is searched (its `Logs` subdirectory
/// first) for the most recently modified `eqlog_*.txt`.
pub fn resolve_log_path(location: &Path) -> Result<PathBuf> {
    if location.is_file() {
        return Ok(location.to_path_buf());
    }

    if !location.is_dir() {
        return Err(Error::LogNotFound(location.display().to_string()));
    }

    for directory in [location.join(LOGS_DIRECTORY_NAME), location.to_path_buf()] {
        if let Some(log_path) = find_latest_game_log_path(&directory)? {
            return Ok(log_path);
        }
    }

    Err(Error::LogNotFound(format!(
        "no eqlog_*.txt file under '{}'",
        location.display()
    )))
}

fn is_game_log_file_name(file_name: &str) -> bool {
    let lower_file_name = file_name.to_ascii_lowercase();
    lower_file_name.starts_with("eqlog_") && lower_file_name.ends_with(".txt")
}

/// Newest `eqlog_*.txt` in `logs_directory` by modification time, if any.
fn find_latest_game_log_path(logs_directory: &Path) -> Result<Option<PathBuf>> {
    if !logs_directory.is_dir() {
        return Ok(None);
    }

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(logs_directory)? {
        let entry = entry?;
        let path = entry.path();

        let is_game_log = path.is_file()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(is_game_log_file_name);
        if !is_game_log {
            continue;
        }

        let modified_time = entry
            .metadata()
            .and_then(|metadata| metadata.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        candidates.push((modified_time, path));
    }

    Ok(candidates
        .into_iter()
        .max_by_key(|(modified_time, _)| *modified_time)
        .map(|(_, path)| path))
}

/// Chat lines can carry Latin-1 bytes; invalid UTF-8 is replaced, never rejected.
fn decode_line(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Feeds every line of an existing log file through `session`, oldest first.
pub fn replay_log_file<S: NotificationSink>(
    log_path: &Path,
    session: &mut LogSession<S>,
) -> Result<ReplaySummary> {
    let reader = BufReader::new(File::open(log_path)?);

    let mut summary = ReplaySummary {
        file_path: log_path.display().to_string(),
        total_lines: 0,
        framed_lines: 0,
        notifications: 0,
    };

    for line_bytes in reader.split(b'\n') {
        let line_bytes = line_bytes?;
        summary.total_lines += 1;

        let line = decode_line(&line_bytes);
        let Some((timestamp, text)) = split_log_line(&line) else {
            continue;
        };
        summary.framed_lines += 1;

        if session.handle_line(timestamp, text) {
            summary.notifications += 1;
        }
    }

    Ok(summary)
}

/// Read position in a log file that is still being appended to.
#[derive(Debug)]
struct LogTail {
    path: PathBuf,
    offset: u64,
}

impl LogTail {
    fn at_end(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            offset: std::fs::metadata(path)?.len(),
        })
    }

    /// Whether a watcher event touched this file with new or changed content.
    fn is_touched_by(&self, event: &Event) -> bool {
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return false;
        }

        let log_file_name = self.path.file_name();
        event.paths.iter().any(|path| {
            *path == self.path || (log_file_name.is_some() && path.file_name() == log_file_name)
        })
    }

    /// Feeds complete lines appended since the last call to `session`.
    ///
    /// A trailing partial line is left for the next call. A file shorter than
    /// the saved offset was truncated and is read again from the start.
    fn read_appended<S: NotificationSink>(&mut self, session: &mut LogSession<S>) -> Result<()> {
        let mut file = File::open(&self.path)?;
        if file.metadata()?.len() < self.offset {
            tracing::info!(log_path = %self.path.display(), "Game log truncated, reading from the start");
            self.offset = 0;
        }
        file.seek(SeekFrom::Start(self.offset))?;

        let mut reader = BufReader::new(file);
        let mut line_bytes = Vec::new();

        loop {
            line_bytes.clear();
            let bytes_read = reader.read_until(b'\n', &mut line_bytes)?;
            if bytes_read == 0 || line_bytes.last() != Some(&b'\n') {
                break;
            }

            self.offset = self.offset.saturating_add(bytes_read as u64);
            session.handle_raw_line(&decode_line(&line_bytes));
        }

        Ok(())
    }
}

/// Tails `log_path` from its current end, feeding each appended line to `session`.
///
/// Runs until the watcher's event stream closes.
pub async fn watch_game_log<S: NotificationSink>(
    log_path: &Path,
    session: &mut LogSession<S>,
) -> Result<()> {
    let watch_directory = log_path
        .parent()
        .ok_or_else(|| Error::LogNotFound(log_path.display().to_string()))?;
    let mut tail = LogTail::at_end(log_path)?;

    let (event_sender, mut event_receiver) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        if event_sender.send(result).is_err() {
            tracing::debug!("Game log event receiver dropped");
        }
    })?;
    watcher.watch(watch_directory, RecursiveMode::NonRecursive)?;

    tracing::info!(
        log_path = %log_path.display(),
        start_offset = tail.offset,
        "Watching game log"
    );

    while let Some(event_result) = event_receiver.recv().await {
        let event = match event_result {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(watch_error = %error, "Game log watcher reported an error");
                continue;
            }
        };

        if !tail.is_touched_by(&event) {
            continue;
        }

        if let Err(error) = tail.read_appended(session) {
            tracing::warn!(
                read_error = %error,
                offset = tail.offset,
                "Failed to read game log update"
            );
        }
    }

    Ok(())
}
