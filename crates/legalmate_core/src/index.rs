use crate::embed::EmbeddingProvider;
use crate::model::FaqEntry;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embed question of corpus record {position}: {source:#}")]
    Embedding {
        position: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("corpus record {position}: embedding has {actual} components, expected {expected}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },
}

/// FAQ entries with their question embeddings, positionally aligned.
///
/// Built once at startup and read-only afterwards, so it can be shared across
/// sessions behind an `Arc` without locking.
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    entries: Vec<FaqEntry>,
    embeddings: Vec<Vec<f32>>,
    dimension: usize,
}

impl CorpusIndex {
    pub fn build<E>(entries: Vec<FaqEntry>, embedder: &E) -> Result<Self, IndexError>
    where
        E: EmbeddingProvider + ?Sized,
    {
        let dimension = embedder.dimension();
        let mut embeddings = Vec::with_capacity(entries.len());

        for (position, entry) in entries.iter().enumerate() {
            let v = embedder
                .embed(&entry.question)
                .map_err(|source| IndexError::Embedding { position, source })?;
            if v.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    position,
                    expected: dimension,
                    actual: v.len(),
                });
            }
            embeddings.push(v);
        }

        info!(entries = entries.len(), dimension, "built corpus index");
        Ok(Self {
            entries,
            embeddings,
            dimension,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn entries(&self) -> &[FaqEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&FaqEntry> {
        self.entries.get(index)
    }

    pub(crate) fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }
}
