use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::dictionary::{self, DictionaryError, WordlistSource};
use crate::utils;

const FILE_SUFFIX: &str = "_blacklist.txt";

/// Known-noisy paths per status, suppressed even when the status is interesting.
#[derive(Clone, Debug, Default)]
pub struct Blacklist {
    by_status: HashMap<u16, HashSet<String>>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `<status>_blacklist.txt` file found in `dir`.
    ///
    /// Lines go through the same cleanup and `%EXT%` expansion as wordlists,
    /// and are lowercased when the dictionary is.
    pub fn load_dir(
        dir: &Path,
        extensions: &[String],
        lowercase: bool,
    ) -> Result<Self, DictionaryError> {
        let load_err = |e: std::io::Error| DictionaryError::Load {
            path: dir.display().to_string(),
            source: e,
        };

        let mut blacklist = Self::new();
        for entry in fs::read_dir(dir).map_err(load_err)? {
            let entry = entry.map_err(load_err)?;
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(status) = name
                .strip_suffix(FILE_SUFFIX)
                .and_then(|s| s.parse::<u16>().ok())
            else {
                continue;
            };
            let source = WordlistSource::FilePath(entry.path().to_string_lossy().to_string());
            let lines = dictionary::clean_lines(dictionary::read_lines(&source)?);
            let paths = utils::apply_wordlist_extensions(lines, extensions, false);
            debug!(status, paths = paths.len(), "blacklist loaded");
            for path in paths {
                if lowercase {
                    blacklist.insert(status, path.to_lowercase());
                } else {
                    blacklist.insert(status, path);
                }
            }
        }
        Ok(blacklist)
    }

    pub fn insert(&mut self, status: u16, path: impl Into<String>) {
        self.by_status.entry(status).or_default().insert(path.into());
    }

    pub fn contains(&self, status: u16, path: &str) -> bool {
        self.by_status
            .get(&status)
            .is_some_and(|paths| paths.contains(path))
    }

    pub fn is_empty(&self) -> bool {
        self.by_status.values().all(HashSet::is_empty)
    }
}
