//! Shared work queue of request paths.
//!
//! The entry list is built once before a run starts and is read-only while
//! workers consume it. The only mutable state is the cursor, which lives
//! behind a single mutex together with the entries so that a claim is one
//! short critical section.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::{Arc, Mutex, MutexGuard};

use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, info};

use crate::utils;

#[derive(Clone, Debug)]
pub enum WordlistSource {
    FilePath(String),
    Inline(Vec<String>),
}

#[derive(Clone, Debug)]
pub struct DictionaryConfig {
    pub source: WordlistSource,
    pub extensions: Vec<String>,
    pub force_extensions: bool,
    pub lowercase: bool,
    pub prefixes: Vec<String>,
    pub suffixes: Vec<String>,
}

impl DictionaryConfig {
    pub fn new(source: WordlistSource) -> Self {
        Self {
            source,
            extensions: Vec::new(),
            force_extensions: false,
            lowercase: false,
            prefixes: Vec::new(),
            suffixes: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("failed to read wordlist: {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result of asking the dictionary for work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Claim {
    Entry { index: usize, path: Arc<str> },
    Exhausted,
}

#[derive(Debug)]
struct Queue {
    entries: Vec<Arc<str>>,
    cursor: usize,
}

#[derive(Debug)]
pub struct Dictionary {
    config: Option<DictionaryConfig>,
    queue: Mutex<Queue>,
}

impl Dictionary {
    pub fn load(config: DictionaryConfig) -> Result<Self, DictionaryError> {
        let entries = build_entries(&config)?;
        info!(entries = entries.len(), "dictionary loaded");
        Ok(Self {
            config: Some(config),
            queue: Mutex::new(Queue { entries, cursor: 0 }),
        })
    }

    /// Builds a dictionary from already expanded paths. Duplicates are dropped.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<Arc<str>> = entries
            .into_iter()
            .map(Into::<String>::into)
            .unique()
            .map(Arc::from)
            .collect();
        Self {
            config: None,
            queue: Mutex::new(Queue { entries, cursor: 0 }),
        }
    }

    fn queue(&self) -> MutexGuard<'_, Queue> {
        // A poisoned queue still holds a valid cursor; no invariant spans the panic.
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn claim_next(&self) -> Claim {
        let mut queue = self.queue();
        let index = queue.cursor;
        match queue.entries.get(index).cloned() {
            Some(path) => {
                queue.cursor += 1;
                Claim::Entry { index, path }
            }
            None => Claim::Exhausted,
        }
    }

    /// Rewinds the cursor. Must not race with workers still claiming.
    pub fn reset(&self) {
        self.queue().cursor = 0;
    }

    /// Re-reads the configured wordlist and starts over from the first entry.
    ///
    /// Dictionaries built with [`Dictionary::from_entries`] only rewind.
    pub fn regenerate(&self) -> Result<(), DictionaryError> {
        let Some(config) = self.config.as_ref() else {
            self.reset();
            return Ok(());
        };
        let entries = build_entries(config)?;
        debug!(entries = entries.len(), "dictionary regenerated");
        let mut queue = self.queue();
        queue.entries = entries;
        queue.cursor = 0;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.queue().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries handed out since the last reset.
    pub fn claimed(&self) -> usize {
        let queue = self.queue();
        queue.cursor.min(queue.entries.len())
    }

    pub fn entries(&self) -> Vec<Arc<str>> {
        self.queue().entries.clone()
    }
}

pub(crate) fn read_lines(source: &WordlistSource) -> Result<Vec<String>, DictionaryError> {
    match source {
        WordlistSource::Inline(lines) => Ok(lines.clone()),
        WordlistSource::FilePath(path) => {
            let file = File::open(path).map_err(|e| DictionaryError::Load {
                path: path.clone(),
                source: e,
            })?;
            BufReader::new(file)
                .lines()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| DictionaryError::Load {
                    path: path.clone(),
                    source: e,
                })
        }
    }
}

/// Strips terminators and drops blank and `#` comment lines.
pub(crate) fn clean_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect()
}

fn build_entries(config: &DictionaryConfig) -> Result<Vec<Arc<str>>, DictionaryError> {
    let words = clean_lines(read_lines(&config.source)?);
    let expanded =
        utils::apply_wordlist_extensions(words, &config.extensions, config.force_extensions);

    let mut affixed: Vec<String> = Vec::with_capacity(expanded.len());
    for word in expanded {
        affixed.push(word.clone());
        for prefix in &config.prefixes {
            affixed.push(format!("{prefix}{word}"));
        }
        if word.ends_with('/') {
            continue;
        }
        for suffix in &config.suffixes {
            affixed.push(format!("{word}{suffix}"));
        }
    }

    let entries = affixed
        .into_iter()
        .map(|w| if config.lowercase { w.to_lowercase() } else { w })
        .unique()
        .map(Arc::from)
        .collect();
    Ok(entries)
}
