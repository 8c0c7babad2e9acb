use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::Path;

use crate::duration::convert_to_seconds;
use crate::error::{Error, Result};

const COMMENT_MARKER: char = '#';
const FIELD_SEPARATOR: char = ';';

/// Known respawn delay for one creature, kept in both raw and parsed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RespawnEntry {
    pub creature_name: String,
    pub respawn_text: String,
    pub variance_text: String,
    pub respawn_seconds: u64,
    pub variance_seconds: u64,
}

impl RespawnEntry {
    pub fn new(creature_name: &str, respawn_text: &str, variance_text: &str) -> Self {
        Self {
            creature_name: creature_name.to_string(),
            respawn_text: respawn_text.to_string(),
            variance_text: variance_text.to_string(),
            respawn_seconds: convert_to_seconds(respawn_text),
            variance_seconds: convert_to_seconds(variance_text),
        }
    }
}

/// Creature name to respawn data, keyed by the exact name used in the log.
#[derive(Debug, Clone, Default)]
pub struct RespawnTable {
    entries: HashMap<String, RespawnEntry>,
}

impl RespawnTable {
    /// Loads `name;respawn_time;variance` lines from `path`.
    ///
    /// A missing file is reported as [`Error::RespawnTableMissing`] so callers
    /// can tell it apart from a file that exists but lists nothing.
    pub fn load(path: &Path) -> Result<Self> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(Error::RespawnTableMissing(path.to_path_buf()));
            }
            Err(error) => return Err(error.into()),
        };

        let table = Self::from_reader(file)?;
        tracing::info!(
            table_path = %path.display(),
            entry_count = table.len(),
            "Loaded respawn timers"
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut table = Self::default();

        for (index, line_result) in BufReader::new(reader).lines().enumerate() {
            let line = line_result?;
            let line_number = index + 1;

            let trimmed_line = line.trim();
            if trimmed_line.is_empty() || trimmed_line.starts_with(COMMENT_MARKER) {
                continue;
            }

            let Some(entry) = parse_table_line(trimmed_line) else {
                tracing::warn!(
                    line_number,
                    line = %trimmed_line,
                    "Skipping respawn timer line without name;respawn;variance fields"
                );
                continue;
            };

            table.insert(entry);
        }

        Ok(table)
    }

    pub fn insert(&mut self, entry: RespawnEntry) {
        self.entries.insert(entry.creature_name.clone(), entry);
    }

    pub fn get(&self, creature_name: &str) -> Option<&RespawnEntry> {
        self.entries.get(creature_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_table_line(line: &str) -> Option<RespawnEntry> {
    let mut fields = line.split(FIELD_SEPARATOR).map(str::trim);
    let name = fields.next().filter(|value| !value.is_empty())?;
    let respawn_text = fields.next()?;
    let variance_text = fields.next()?;

    Some(RespawnEntry::new(name, respawn_text, variance_text))
}
