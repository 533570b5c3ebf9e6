//! Regex fallbacks for metadata the structured extractor did not provide.
//!
//! The primary extractor usually fills titles, authors, and journal fields
//! directly; these helpers scan the raw text for what it missed.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{ArticleMetadata, ExtractionRecord, JournalIdentity, PubDate};

/// Only the head of the document can plausibly carry journal identity lines.
const JOURNAL_SCAN_WINDOW: usize = 300;

static ISSN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)ISSN[:\s]*(\d{4}-\d{4})").unwrap());

static JOURNAL_TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(Journal|Annals|Archives|International Journal|British Journal|American Journal|BMC)\s+of\s+[A-Z][A-Za-z\s]+",
    )
    .unwrap()
});

static PUBLISHER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Publisher:\s*(.+)").unwrap());

static KEYWORDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)(?:Key\s*words?|Keywords?)[:\-]+\s*(.+?)(?:\n\n|\n[A-Z]|\.\s+[A-Z])")
        .unwrap()
});

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:Published|Received|Accepted)[:\s]+(\d{4})-(\d{2})-(\d{2})").unwrap()
});
static LONG_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:Published|Received|Accepted)\s+(?:on\s+)?([A-Za-z]+)\s+(\d{1,2}),?\s+(\d{4})")
        .unwrap()
});
static COPYRIGHT_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\u{00A9}\s*(\d{4})").unwrap());
static BARE_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").unwrap());

static DOI_LABELED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)doi[:\s]*(10\.\d{4,9}/[-._;()/:A-Za-z0-9]+)").unwrap());
static DOI_BARE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(10\.\d{4,9}/[-._;()/:A-Za-z0-9]+)").unwrap());

/// Journal identity from the record's structured fields, with regex fallbacks
/// over the head of the raw text.
pub fn extract_journal_metadata(record: &ExtractionRecord) -> JournalIdentity {
    if let Some(title) = record.journal_fields.get("journal_title") {
        return JournalIdentity {
            journal_id: generate_journal_id(title),
            journal_title: title.clone(),
            issn: record.journal_fields.get("issn").cloned(),
            publisher: record.journal_fields.get("publisher").cloned(),
        };
    }

    let head: String = record.raw_text.chars().take(JOURNAL_SCAN_WINDOW).collect();
    let journal_title = find_journal_title(&head);
    JournalIdentity {
        journal_id: generate_journal_id(&journal_title),
        journal_title,
        issn: find_issn(&head),
        publisher: PUBLISHER_RE
            .captures(&head)
            .map(|c| c[1].trim().to_string()),
    }
}

/// Article descriptor from the record's structured fields, falling back to
/// raw-text scans for dates, DOIs, and keywords.
pub fn extract_article_metadata(
    record: &ExtractionRecord,
    article_type: Option<&str>,
) -> ArticleMetadata {
    let authors = record.authors.clone();

    let corresponding_author = authors
        .iter()
        .find(|a| a.is_corresponding)
        .map(|a| match &a.email {
            Some(email) => format!("{} {} ({})", a.given_names, a.surname, email),
            None => format!("{} {}", a.given_names, a.surname),
        });

    ArticleMetadata {
        article_type: article_type
            .filter(|t| !t.is_empty())
            .unwrap_or("research-article")
            .to_string(),
        article_id: None,
        title: record
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Untitled Article".to_string()),
        authors,
        corresponding_author,
        abstract_text: record.abstract_text.clone(),
        keywords: find_keywords(&record.raw_text),
        publication_date: find_publication_date(&record.raw_text),
        volume: record.journal_fields.get("volume").cloned(),
        issue: record.journal_fields.get("issue").cloned(),
        fpage: record.journal_fields.get("fpage").cloned(),
        lpage: record.journal_fields.get("lpage").cloned(),
        doi: find_doi(&record.raw_text),
        funding_statement: None,
        conflict_statement: None,
    }
}

/// Initialism from the journal title, e.g. "Journal of Biology" -> "JOB".
pub fn generate_journal_id(title: &str) -> String {
    let id: String = title
        .split_whitespace()
        .filter_map(|w| w.chars().next())
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_uppercase)
        .collect();
    if id.is_empty() { "UNKNOWN".to_string() } else { id }
}

pub fn find_issn(text: &str) -> Option<String> {
    ISSN_RE.captures(text).map(|c| c[1].to_string())
}

pub fn find_journal_title(text: &str) -> String {
    JOURNAL_TITLE_RE
        .find(text)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| "Unknown Journal".to_string())
}

/// Keywords from a `Keywords:`/`Key words:` line, split on commas or
/// semicolons. The capture stops at a blank line, a capitalized new line, or
/// a sentence boundary.
pub fn find_keywords(text: &str) -> Vec<String> {
    let Some(caps) = KEYWORDS_RE.captures(text) else {
        return Vec::new();
    };
    caps[1]
        .split([';', ','])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Publication date from `Published: YYYY-MM-DD`, `Published on Month DD,
/// YYYY`, or as a last resort a lone year near a copyright mark.
pub fn find_publication_date(text: &str) -> PubDate {
    if let Some(caps) = ISO_DATE_RE.captures(text) {
        return PubDate {
            year: Some(caps[1].to_string()),
            month: Some(caps[2].to_string()),
            day: Some(caps[3].to_string()),
        };
    }
    if let Some(caps) = LONG_DATE_RE.captures(text) {
        return PubDate {
            year: Some(caps[3].to_string()),
            month: Some(caps[1].to_string()),
            day: Some(caps[2].to_string()),
        };
    }
    let year = COPYRIGHT_YEAR_RE
        .captures(text)
        .or_else(|| BARE_YEAR_RE.captures(text))
        .map(|c| c[1].to_string());
    PubDate {
        year,
        month: None,
        day: None,
    }
}

pub fn find_doi(text: &str) -> Option<String> {
    DOI_LABELED_RE
        .captures(text)
        .or_else(|| DOI_BARE_RE.captures(text))
        .map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_id_from_title_initials() {
        assert_eq!(generate_journal_id("Journal of Biology"), "JOB");
        assert_eq!(
            generate_journal_id("The Journal of Clinical and Aesthetic Dermatology"),
            "TJOCAAD"
        );
        assert_eq!(generate_journal_id(""), "UNKNOWN");
        assert_eq!(generate_journal_id("123 456"), "UNKNOWN");
    }

    #[test]
    fn issn_found_case_insensitive() {
        assert_eq!(
            find_issn("issn: 1941-2789 something"),
            Some("1941-2789".to_string())
        );
        assert_eq!(find_issn("no identifier here"), None);
    }

    #[test]
    fn journal_title_pattern() {
        assert_eq!(
            find_journal_title("page header Annals of Internal Medicine vol 3"),
            "Annals of Internal Medicine vol"
        );
        assert_eq!(find_journal_title("nothing journal-like"), "Unknown Journal");
    }

    #[test]
    fn keywords_comma_and_semicolon_split() {
        let text = "Abstract text.\n\nKeywords: acne; rosacea, dermatitis\n\nINTRODUCTION";
        assert_eq!(find_keywords(text), vec!["acne", "rosacea", "dermatitis"]);
    }

    #[test]
    fn keywords_absent() {
        assert!(find_keywords("no keyword line at all").is_empty());
    }

    #[test]
    fn iso_publication_date() {
        let d = find_publication_date("Published: 2023-04-15 in print");
        assert_eq!(d.year.as_deref(), Some("2023"));
        assert_eq!(d.month.as_deref(), Some("04"));
        assert_eq!(d.day.as_deref(), Some("15"));
    }

    #[test]
    fn long_form_publication_date() {
        let d = find_publication_date("Accepted on March 3, 2022.");
        assert_eq!(d.year.as_deref(), Some("2022"));
        assert_eq!(d.month.as_deref(), Some("March"));
        assert_eq!(d.day.as_deref(), Some("3"));
    }

    #[test]
    fn copyright_year_fallback() {
        let d = find_publication_date("\u{00A9} 2021 Some Publisher");
        assert_eq!(d.year.as_deref(), Some("2021"));
        assert!(d.month.is_none());
    }

    #[test]
    fn no_date_at_all() {
        assert!(find_publication_date("undated text").is_empty());
    }

    #[test]
    fn doi_labeled_and_bare() {
        assert_eq!(
            find_doi("doi: 10.1234/abc.def"),
            Some("10.1234/abc.def".to_string())
        );
        assert_eq!(
            find_doi("see 10.5678/xyz-1 for details"),
            Some("10.5678/xyz-1".to_string())
        );
        assert_eq!(find_doi("nothing"), None);
    }

    #[test]
    fn article_metadata_defaults() {
        let meta = extract_article_metadata(&ExtractionRecord::default(), None);
        assert_eq!(meta.article_type, "research-article");
        assert_eq!(meta.title, "Untitled Article");
        assert!(meta.authors.is_empty());
    }

    #[test]
    fn corresponding_author_with_email() {
        let record = ExtractionRecord {
            authors: vec![crate::AuthorRecord {
                surname: "Smith".to_string(),
                given_names: "Jane".to_string(),
                email: Some("js@example.org".to_string()),
                is_corresponding: true,
                ..crate::AuthorRecord::default()
            }],
            ..ExtractionRecord::default()
        };
        let meta = extract_article_metadata(&record, Some("case-report"));
        assert_eq!(meta.article_type, "case-report");
        assert_eq!(
            meta.corresponding_author.as_deref(),
            Some("Jane Smith (js@example.org)")
        );
    }

    #[test]
    fn journal_metadata_prefers_structured_fields() {
        let mut record = ExtractionRecord::default();
        record
            .journal_fields
            .insert("journal_title".to_string(), "Journal of Testing".to_string());
        record
            .journal_fields
            .insert("issn".to_string(), "1234-5678".to_string());
        let journal = extract_journal_metadata(&record);
        assert_eq!(journal.journal_id, "JOT");
        assert_eq!(journal.issn.as_deref(), Some("1234-5678"));
    }
}
