use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod enrich;
pub mod merge;
pub mod metadata;
pub mod normalize;
pub mod segment;

// Re-export for convenience
pub use enrich::enrich_reference;
pub use merge::merge;
pub use metadata::{extract_article_metadata, extract_journal_metadata};
pub use normalize::{NormalizedContent, normalize};

/// Article types accepted by the publisher schema. The synthesizer and the
/// validator must agree on this set.
pub const ARTICLE_TYPES: [&str; 10] = [
    "research-article",
    "review-article",
    "case-report",
    "letter",
    "editorial",
    "abstract",
    "review",
    "brief-report",
    "correction",
    "retraction",
];

/// Accepted values for the `journal-id-type` attribute.
pub const JOURNAL_ID_TYPES: [&str; 5] = ["publisher-id", "nlm-ta", "doi", "hwp", "pmc"];

/// The structured output of a single extraction pass (primary or fallback).
///
/// The primary extractor is schema-aware and fills the structured fields;
/// the fallback extractor only produces `raw_text`, `pages`, and a
/// best-effort `title`. Absent data is represented as empty fields, never
/// as an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionRecord {
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub authors: Vec<AuthorRecord>,
    #[serde(default)]
    pub references: Vec<ReferenceRecord>,
    #[serde(default)]
    pub figures: Vec<FigureBlock>,
    #[serde(default)]
    pub tables: Vec<TableBlock>,
    #[serde(default)]
    pub journal_fields: BTreeMap<String, String>,
}

/// A titled or untitled ordered group of paragraphs within the body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub paragraphs: Vec<String>,
}

impl Section {
    /// A section with neither a title nor paragraphs carries no information
    /// and must not be handed downstream.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.paragraphs.is_empty()
    }
}

/// A document author as produced by the primary extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorRecord {
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub given_names: String,
    /// Degrees/credentials string, e.g. "MD, PhD".
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub affiliations: Vec<String>,
    #[serde(default)]
    pub is_corresponding: bool,
}

/// A single bibliography entry. `raw_text` is always present; the structured
/// fields are best-effort and backfilled by [`enrich::enrich_reference`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub raw_text: String,
    #[serde(default)]
    pub ref_id: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub pages: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    /// Drives the citation node's publication-type attribute.
    #[serde(default = "default_publication_type")]
    pub publication_type: String,
}

fn default_publication_type() -> String {
    "journal".to_string()
}

impl ReferenceRecord {
    /// A reference built from raw text alone.
    pub fn from_raw(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            publication_type: default_publication_type(),
            ..Self::default()
        }
    }

    /// True if any structured field beyond the raw text is populated.
    pub fn has_structured_fields(&self) -> bool {
        !self.authors.is_empty()
            || self.year.is_some()
            || self.title.is_some()
            || self.journal.is_some()
            || self.volume.is_some()
            || self.issue.is_some()
            || self.pages.is_some()
            || self.doi.is_some()
    }
}

/// A figure block captured by the primary extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FigureBlock {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// A table block captured by the primary extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableBlock {
    pub id: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Fixed-identity descriptor of the publication target. This is
/// configuration, not a per-document fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalIdentity {
    pub journal_id: String,
    pub journal_title: String,
    pub issn: Option<String>,
    pub publisher: Option<String>,
}

impl JournalIdentity {
    /// The canonical journal identity for this deployment.
    pub fn canonical() -> Self {
        Self {
            journal_id: "JCAD".to_string(),
            journal_title: "The Journal of Clinical and Aesthetic Dermatology".to_string(),
            issn: Some("1941-2789".to_string()),
            publisher: Some("Matrix Medical Communications".to_string()),
        }
    }
}

/// Publication date parts as extracted from the document. Any part may be
/// missing; the synthesizer defaults the year to the current year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubDate {
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub month: Option<String>,
    #[serde(default)]
    pub day: Option<String>,
}

impl PubDate {
    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.month.is_none() && self.day.is_none()
    }
}

/// Article descriptor consumed by the synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub article_type: String,
    #[serde(default)]
    pub article_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub authors: Vec<AuthorRecord>,
    #[serde(default)]
    pub corresponding_author: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub publication_date: PubDate,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub fpage: Option<String>,
    #[serde(default)]
    pub lpage: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub funding_statement: Option<String>,
    #[serde(default)]
    pub conflict_statement: Option<String>,
}

impl Default for ArticleMetadata {
    fn default() -> Self {
        Self {
            article_type: "research-article".to_string(),
            article_id: None,
            title: String::new(),
            authors: Vec::new(),
            corresponding_author: None,
            abstract_text: None,
            keywords: Vec::new(),
            publication_date: PubDate::default(),
            volume: None,
            issue: None,
            fpage: None,
            lpage: None,
            doi: None,
            funding_statement: None,
            conflict_statement: None,
        }
    }
}
