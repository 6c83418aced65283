use crate::model::FaqEntry;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("open corpus {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse corpus {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("corpus record {position}: {reason}")]
    InvalidEntry { position: usize, reason: String },
}

/// Load the FAQ corpus. `.jsonl` files are read one record per line, anything
/// else is parsed as a single JSON array.
pub fn load_corpus(path: &Path) -> Result<Vec<FaqEntry>, CorpusError> {
    let entries = match path.extension().and_then(|e| e.to_str()) {
        Some("jsonl") => load_corpus_jsonl(path)?,
        _ => load_corpus_json(path)?,
    };
    validate_entries(&entries)?;
    Ok(entries)
}

fn open(path: &Path) -> Result<File, CorpusError> {
    File::open(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_corpus_json(path: &Path) -> Result<Vec<FaqEntry>, CorpusError> {
    let reader = BufReader::new(open(path)?);
    serde_json::from_reader(reader).map_err(|source| CorpusError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn load_corpus_jsonl(path: &Path) -> Result<Vec<FaqEntry>, CorpusError> {
    let reader = BufReader::new(open(path)?);
    let mut entries = Vec::new();

    for line in reader.lines() {
        let line = line.map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line).map_err(|source| CorpusError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        entries.push(entry);
    }

    Ok(entries)
}

/// Reject records that would produce an unusable answer: blank text or a
/// citation that is not an http(s) URL.
pub fn validate_entries(entries: &[FaqEntry]) -> Result<(), CorpusError> {
    for (position, entry) in entries.iter().enumerate() {
        let invalid = |reason: &str| CorpusError::InvalidEntry {
            position,
            reason: reason.to_string(),
        };

        if entry.question.trim().is_empty() {
            return Err(invalid("question is blank"));
        }
        if entry.answer.trim().is_empty() {
            return Err(invalid("answer is blank"));
        }
        let source = entry.source.trim();
        let is_url = ["https://", "http://"]
            .iter()
            .any(|scheme| source.len() > scheme.len() && source.starts_with(scheme));
        if !is_url {
            return Err(invalid("source must be an http(s) URL"));
        }
    }
    Ok(())
}
