//! Schema and business-rule validation of the synthesized tree.
//!
//! Validation never throws for recoverable issues: every finding lands in
//! the report as an error or a warning. Only an unreadable schema aborts,
//! and even that surfaces as a single critical-severity entry.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;

use pubmill_core::{ARTICLE_TYPES, JOURNAL_ID_TYPES};

use crate::dtd::DtdCatalog;
use crate::tree::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

/// One validation finding.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub element: String,
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    fn new(element: &str, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            element: element.to_string(),
            message: message.into(),
            severity,
            line: None,
            suggestion: None,
        }
    }

    fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub timestamp: DateTime<Local>,
}

impl ValidationReport {
    fn from_issues(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
            timestamp: Local::now(),
        }
    }

    /// Plain-text rendering for logs and non-TTY output.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Validated at {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        if self.valid {
            let _ = writeln!(out, "Document is valid ({} warnings)", self.warnings.len());
        } else {
            let _ = writeln!(
                out,
                "Document is INVALID ({} errors, {} warnings)",
                self.errors.len(),
                self.warnings.len()
            );
        }
        for issue in self.errors.iter().chain(&self.warnings) {
            let tag = match issue.severity {
                Severity::Warning => "warning",
                Severity::Error => "error",
                Severity::Critical => "critical",
            };
            let _ = writeln!(out, "  [{tag}] {}: {}", issue.element, issue.message);
            if let Some(suggestion) = &issue.suggestion {
                let _ = writeln!(out, "          hint: {suggestion}");
            }
        }
        out
    }
}

/// Element paths that must exist, with the message reported when absent.
const REQUIRED_ELEMENTS: [(&str, &str); 6] = [
    ("front/journal-meta/journal-id", "Journal ID is required"),
    (
        "front/journal-meta/journal-title-group/journal-title",
        "Journal title is required",
    ),
    ("front/article-meta/article-id", "Article ID is required"),
    (
        "front/article-meta/title-group/article-title",
        "Article title is required",
    ),
    (
        "front/article-meta/contrib-group/contrib",
        "At least one author is required",
    ),
    (
        "front/article-meta/pub-date",
        "Publication date is required",
    ),
];

/// Element paths whose absence is only a warning.
const RECOMMENDED_ELEMENTS: [(&str, &str); 5] = [
    ("front/article-meta/abstract", "Abstract is recommended"),
    ("back/ref-list", "References section is recommended"),
    (
        "front/article-meta/volume",
        "Volume information is recommended",
    ),
    (
        "front/article-meta/issue",
        "Issue information is recommended",
    ),
    (
        "front/article-meta/fpage",
        "First page information is recommended",
    ),
];

/// Validator bound to one schema location.
pub struct Validator {
    catalog: Result<DtdCatalog, crate::dtd::DtdError>,
    dtd_dir: PathBuf,
}

impl Validator {
    pub fn new(dtd_dir: impl Into<PathBuf>) -> Self {
        let dtd_dir = dtd_dir.into();
        let catalog = DtdCatalog::load(&dtd_dir);
        if let Err(err) = &catalog {
            tracing::warn!(dir = %dtd_dir.display(), error = %err, "schema unavailable");
        }
        Self { catalog, dtd_dir }
    }

    /// Validator with a pre-parsed grammar, used by tests and embedders.
    pub fn with_catalog(catalog: DtdCatalog) -> Self {
        Self {
            catalog: Ok(catalog),
            dtd_dir: PathBuf::new(),
        }
    }

    pub fn validate(&self, root: &Element) -> ValidationReport {
        let catalog = match &self.catalog {
            Ok(catalog) => catalog,
            Err(err) => {
                let issue = ValidationIssue::new(
                    "dtd",
                    format!("schema definition unavailable: {err}"),
                    Severity::Critical,
                )
                .suggest(format!(
                    "check the schema directory at {}",
                    self.dtd_dir.display()
                ));
                return ValidationReport::from_issues(vec![issue], Vec::new());
            }
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        check_grammar(root, catalog, &mut errors);
        check_required_elements(root, &mut errors, &mut warnings);
        check_attribute_values(root, &mut errors);
        check_authors(root, &mut errors, &mut warnings);
        check_references(root, &mut errors, &mut warnings);

        ValidationReport::from_issues(errors, warnings)
    }
}

/// Walk the tree checking each element against its declared content model.
fn check_grammar(element: &Element, catalog: &DtdCatalog, errors: &mut Vec<ValidationIssue>) {
    match catalog.model(&element.name) {
        None => {
            errors.push(
                ValidationIssue::new(
                    &element.name,
                    format!("element '{}' is not declared in the schema", element.name),
                    Severity::Error,
                )
                .suggest("remove the element or correct its name"),
            );
        }
        Some(model) => {
            if model.is_empty
                && (!element.children.is_empty()
                    || element.text.as_deref().is_some_and(|t| !t.trim().is_empty()))
            {
                errors.push(ValidationIssue::new(
                    &element.name,
                    format!("element '{}' is declared EMPTY but has content", element.name),
                    Severity::Error,
                ));
            }
            if !model.allows_text
                && !model.is_any
                && element.text.as_deref().is_some_and(|t| !t.trim().is_empty())
            {
                errors.push(ValidationIssue::new(
                    &element.name,
                    format!("element '{}' does not allow character data", element.name),
                    Severity::Error,
                ));
            }
            for child in &element.children {
                if !model.permits_child(&child.name) {
                    errors.push(
                        ValidationIssue::new(
                            &child.name,
                            format!(
                                "element '{}' is not allowed inside '{}'",
                                child.name, element.name
                            ),
                            Severity::Error,
                        )
                        .suggest("check the content model of the parent element"),
                    );
                }
            }
        }
    }
    for child in &element.children {
        check_grammar(child, catalog, errors);
    }
}

fn check_required_elements(
    root: &Element,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    for (path, message) in REQUIRED_ELEMENTS {
        if root.find_all(path).is_empty() {
            let element = path.rsplit('/').next().unwrap_or(path);
            errors.push(
                ValidationIssue::new(element, message, Severity::Error)
                    .suggest("add the missing required element"),
            );
        }
    }
    for (path, message) in RECOMMENDED_ELEMENTS {
        if root.find_all(path).is_empty() {
            let element = path.rsplit('/').next().unwrap_or(path);
            warnings.push(
                ValidationIssue::new(element, message, Severity::Warning)
                    .suggest("consider adding this element for completeness"),
            );
        }
    }
}

fn check_attribute_values(root: &Element, errors: &mut Vec<ValidationIssue>) {
    if let Some(article_type) = root.attr("article-type") {
        if !ARTICLE_TYPES.contains(&article_type) {
            errors.push(
                ValidationIssue::new(
                    "article",
                    format!("invalid value '{article_type}' for attribute article-type"),
                    Severity::Error,
                )
                .suggest(format!("allowed values: {}", ARTICLE_TYPES.join(", "))),
            );
        }
    }
    for journal_id in root.descendants_named("journal-id") {
        if let Some(id_type) = journal_id.attr("journal-id-type") {
            if !JOURNAL_ID_TYPES.contains(&id_type) {
                errors.push(
                    ValidationIssue::new(
                        "journal-id",
                        format!("invalid value '{id_type}' for attribute journal-id-type"),
                        Severity::Error,
                    )
                    .suggest(format!("allowed values: {}", JOURNAL_ID_TYPES.join(", "))),
                );
            }
        }
    }
}

fn check_authors(
    root: &Element,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    let contribs: Vec<&Element> = root
        .descendants_named("contrib")
        .into_iter()
        .filter(|c| c.attr("contrib-type") == Some("author"))
        .collect();

    for (i, contrib) in contribs.iter().enumerate() {
        let ordinal = i + 1;
        let name = contrib.find("name");

        let has_surname = name
            .and_then(|n| n.find("surname"))
            .and_then(|s| s.text.as_deref())
            .is_some_and(|t| !t.trim().is_empty());
        if !has_surname {
            errors.push(
                ValidationIssue::new(
                    "author",
                    format!("Author {ordinal} missing surname"),
                    Severity::Error,
                )
                .suggest("add a surname for each author"),
            );
        }

        let has_given = name
            .and_then(|n| n.find("given-names"))
            .and_then(|g| g.text.as_deref())
            .is_some_and(|t| !t.trim().is_empty());
        if !has_given {
            warnings.push(ValidationIssue::new(
                "author",
                format!("Author {ordinal} missing given names"),
                Severity::Warning,
            ));
        }

        if contrib.attr("corresp") == Some("yes") {
            let has_contact = contrib.find("email").is_some()
                || contrib
                    .find_all("xref")
                    .iter()
                    .any(|x| x.attr("ref-type") == Some("corresp"));
            if !has_contact {
                warnings.push(ValidationIssue::new(
                    "author",
                    format!(
                        "Corresponding author {ordinal} should have an email or correspondence note"
                    ),
                    Severity::Warning,
                ));
            }
        }

        let has_affiliation = contrib.find("aff").is_some()
            || contrib
                .find_all("xref")
                .iter()
                .any(|x| x.attr("ref-type") == Some("aff"));
        if !has_affiliation {
            warnings.push(ValidationIssue::new(
                "author",
                format!("Author {ordinal} should have affiliation information"),
                Severity::Warning,
            ));
        }
    }
}

fn check_references(
    root: &Element,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    let refs = root.descendants_named("ref");
    let mut seen_ids = std::collections::HashSet::new();

    for (i, ref_elem) in refs.iter().enumerate() {
        let ordinal = i + 1;
        match ref_elem.attr("id") {
            None | Some("") => {
                errors.push(
                    ValidationIssue::new(
                        "reference",
                        format!("Reference {ordinal} missing id attribute"),
                        Severity::Error,
                    )
                    .suggest("assign a unique identifier to each reference"),
                );
            }
            Some(id) => {
                if !seen_ids.insert(id.to_string()) {
                    errors.push(ValidationIssue::new(
                        "reference",
                        format!("Reference {ordinal} reuses id '{id}'"),
                        Severity::Error,
                    ));
                }
            }
        }

        let citation = ref_elem
            .find("mixed-citation")
            .or_else(|| ref_elem.find("element-citation"));
        match citation {
            None => {
                errors.push(
                    ValidationIssue::new(
                        "reference",
                        format!("Reference {ordinal} missing citation content"),
                        Severity::Error,
                    )
                    .suggest("add citation details in mixed-citation or element-citation"),
                );
            }
            Some(citation) => {
                if citation.name == "mixed-citation" && citation.attr("publication-type").is_none()
                {
                    warnings.push(ValidationIssue::new(
                        "reference",
                        format!("Reference {ordinal} missing publication-type"),
                        Severity::Warning,
                    ));
                }
                if citation.is_content_empty() {
                    errors.push(ValidationIssue::new(
                        "reference",
                        format!("Reference {ordinal} has an empty citation"),
                        Severity::Error,
                    ));
                }
            }
        }
    }
}
