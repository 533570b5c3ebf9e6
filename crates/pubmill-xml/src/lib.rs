//! Document synthesis, schema validation, and XML serialization.
//!
//! The crate turns a pair of extraction records into a schema-referenced
//! bibliographic XML document plus a validation report:
//!
//! merge -> normalize -> synthesize -> serialize -> validate
//!
//! Every stage before validation is total; missing data is defaulted, never
//! rejected. Validation findings are reported, not thrown, so a conversion
//! always yields either a document with its report or a single top-level
//! failure reason (schema unreadable, serialization failure).

use std::path::PathBuf;

use thiserror::Error;

pub mod citation;
pub mod dtd;
pub mod synth;
pub mod tree;
pub mod validator;
pub mod xref;

pub use citation::CitationBuilder;
pub use dtd::{DtdCatalog, DtdError};
pub use synth::{SynthesizerConfig, synthesize};
pub use tree::{Element, serialize_document};
pub use validator::{Severity, ValidationIssue, ValidationReport, Validator};
pub use xref::{has_citation_markers, paragraph_with_citations};

use pubmill_core::{ExtractionRecord, extract_article_metadata, extract_journal_metadata};

/// Serialization-layer failures.
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML write failed: {0}")]
    Write(#[from] quick_xml::Error),
    #[error("I/O failure during XML write: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialized document is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Options for a full conversion run.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Caller-selected article type; falls back to the default when unset.
    pub article_type: Option<String>,
    pub synthesizer: SynthesizerConfig,
    /// Schema directory for validation. When unset, validation reports the
    /// schema as unavailable (a single critical finding).
    pub dtd_dir: Option<PathBuf>,
}

/// Result of one conversion: the serialized document and its report.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub xml: String,
    pub report: ValidationReport,
}

/// Run the whole pipeline over a primary and a fallback extraction record.
///
/// The document is produced even when validation fails; callers inspect
/// `report.valid` to decide what to do with it.
pub fn convert(
    primary: ExtractionRecord,
    fallback: ExtractionRecord,
    options: &ConvertOptions,
) -> Result<Conversion, XmlError> {
    let merged = pubmill_core::merge(primary, fallback);

    let journal = extract_journal_metadata(&merged);
    let mut article = extract_article_metadata(&merged, options.article_type.as_deref());
    let content = pubmill_core::normalize(&merged);
    article.title = content.title.clone();

    let root = synthesize(&options.synthesizer, &journal, &article, &content);
    let xml = serialize_document(&root, &options.synthesizer.doctype())?;

    let validator = match &options.dtd_dir {
        Some(dir) => Validator::new(dir.clone()),
        None => Validator::new(PathBuf::new()),
    };
    let report = validator.validate(&root);

    tracing::info!(
        valid = report.valid,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        bytes = xml.len(),
        "conversion finished"
    );

    Ok(Conversion { xml, report })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str) -> ExtractionRecord {
        ExtractionRecord {
            raw_text: text.to_string(),
            pages: if text.is_empty() {
                vec![]
            } else {
                vec![text.to_string()]
            },
            ..ExtractionRecord::default()
        }
    }

    #[test]
    fn convert_empty_records_still_yields_document() {
        let conversion = convert(
            ExtractionRecord::default(),
            ExtractionRecord::default(),
            &ConvertOptions::default(),
        )
        .unwrap();
        assert!(conversion.xml.contains("<article"));
        assert!(conversion.xml.contains("Article content not available."));
        // No schema directory configured: single critical finding.
        assert!(!conversion.report.valid);
        assert_eq!(conversion.report.errors.len(), 1);
        assert_eq!(conversion.report.errors[0].severity, Severity::Critical);
    }

    #[test]
    fn convert_wires_sections_and_references_through() {
        let fallback = record(
            "A Study of Something Important\n\nINTRODUCTION\n\nEffects were seen [1].\n\nREFERENCES\n[1] Smith J. Title X. J Med. 2020;12(3):45-50.",
        );
        let conversion = convert(
            ExtractionRecord::default(),
            fallback,
            &ConvertOptions::default(),
        )
        .unwrap();
        assert!(conversion.xml.contains("<title>Introduction</title>"));
        assert!(conversion.xml.contains("rid=\"B1\""));
        assert!(conversion.xml.contains("<source>J Med</source>"));
        assert!(conversion.xml.contains("REFERENCES"));
    }

    #[test]
    fn doctype_embeds_public_id() {
        let conversion = convert(
            ExtractionRecord::default(),
            ExtractionRecord::default(),
            &ConvertOptions::default(),
        )
        .unwrap();
        assert!(
            conversion
                .xml
                .contains("-//NLM//DTD Journal Publishing DTD v2.3 20070202//EN")
        );
    }
}
