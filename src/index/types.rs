//! Index type, dataset descriptor and scored results.

use crate::document::Document;
use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which index processor a dataset uses. Fixed for the dataset's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
    /// `text_model`
    Paragraph,
    /// `qa_model`
    QuestionAnswer,
    /// `hierarchical_model`
    ParentChild,
    /// `external`
    External,
}

impl IndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::Paragraph => "text_model",
            IndexType::QuestionAnswer => "qa_model",
            IndexType::ParentChild => "hierarchical_model",
            IndexType::External => "external",
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexType {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "text_model" | "paragraph" => Ok(IndexType::Paragraph),
            "qa_model" | "qa" => Ok(IndexType::QuestionAnswer),
            "hierarchical_model" | "parent_child" => Ok(IndexType::ParentChild),
            "external" => Ok(IndexType::External),
            other => Err(IngestError::Validation(format!(
                "Index type {} is not supported",
                other
            ))),
        }
    }
}

/// How a dataset is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingTechnique {
    /// Dense vectors plus keywords.
    #[default]
    HighQuality,
    /// Keywords only.
    Economy,
}

/// The slice of a dataset the processors need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub indexing_technique: IndexingTechnique,
}

impl Dataset {
    pub fn new(id: impl Into<String>, indexing_technique: IndexingTechnique) -> Self {
        Self {
            id: id.into(),
            indexing_technique,
        }
    }

    pub fn uses_vectors(&self) -> bool {
        self.indexing_technique == IndexingTechnique::HighQuality
    }
}

/// A store or retrieval hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f64,
}
