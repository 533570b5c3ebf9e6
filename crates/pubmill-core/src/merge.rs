use once_cell::sync::Lazy;
use regex::Regex;

use crate::segment::{recover_references, segment_sections};
use crate::{ExtractionRecord, Section};

/// Primary raw text shorter than this is considered deficient and replaced
/// wholesale with the fallback's.
const MIN_RAW_TEXT_LEN: usize = 100;

/// Minimum total paragraph count for the primary's sections to be trusted.
const SECTION_COMPLETENESS_THRESHOLD: usize = 3;

/// Paragraphs shorter than this are suspect truncations.
const SHORT_PARAGRAPH_LEN: usize = 100;

static BLANK_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());
static WS_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Reconcile a primary (structured) and a fallback (raw-text) extraction
/// record into one authoritative record.
///
/// The primary extractor is schema-aware and usually more accurate, but can
/// silently miss sections or references; the fallback always has complete
/// text and acts as a safety net. Primary wins unless a field is deficient.
/// Never fails: absent data degrades to empty fields.
pub fn merge(primary: ExtractionRecord, fallback: ExtractionRecord) -> ExtractionRecord {
    let mut merged = primary;

    // The fallback extractor owns real page segmentation.
    if !fallback.pages.is_empty() {
        merged.pages = fallback.pages.clone();
    }

    // Title: primary wins; otherwise the fallback's first plausible line.
    if merged.title.as_deref().is_none_or(str::is_empty) {
        merged.title = candidate_title(&fallback.raw_text);
    }

    // Raw text: substitute wholesale when the primary's is missing or thin.
    if merged.raw_text.trim().is_empty() || merged.raw_text.len() < MIN_RAW_TEXT_LEN {
        if !fallback.raw_text.is_empty() {
            tracing::debug!(
                primary_len = merged.raw_text.len(),
                fallback_len = fallback.raw_text.len(),
                "primary raw text deficient, using fallback text"
            );
            merged.raw_text = fallback.raw_text.clone();
        }
    }

    merge_sections(&mut merged, &fallback);

    // References: recover from the fallback text when the primary has none.
    if merged.references.is_empty() && !fallback.raw_text.is_empty() {
        merged.references = recover_references(&fallback.raw_text);
        if !merged.references.is_empty() {
            tracing::debug!(count = merged.references.len(), "recovered references from fallback text");
        }
    }

    // Authors, figures, tables, and journal fields come from the primary
    // only; the fallback extractor does not produce them.

    // No empty section may leave the merge stage.
    merged.sections.retain(|s| !s.is_empty());

    // Uphold the pages/raw_text invariant for downstream consumers.
    if !merged.raw_text.is_empty() && merged.pages.is_empty() {
        merged.pages = vec![merged.raw_text.clone()];
    }

    merged
}

/// First fallback line with a plausible title length.
fn candidate_title(raw_text: &str) -> Option<String> {
    raw_text
        .lines()
        .map(str::trim)
        .find(|line| line.len() > 10 && line.len() < 200)
        .map(str::to_string)
}

fn merge_sections(merged: &mut ExtractionRecord, fallback: &ExtractionRecord) {
    let total_paragraphs: usize = merged.sections.iter().map(|s| s.paragraphs.len()).sum();

    if merged.sections.is_empty() || total_paragraphs < SECTION_COMPLETENESS_THRESHOLD {
        if !fallback.raw_text.is_empty() {
            let derived = segment_sections(&fallback.raw_text);
            if !derived.is_empty() {
                tracing::debug!(
                    primary_sections = merged.sections.len(),
                    derived_sections = derived.len(),
                    "primary sections deficient, derived from fallback text"
                );
                merged.sections = derived;
            }
        }
        return;
    }

    let fallback_paragraphs: Vec<&str> = BLANK_LINE_RE
        .split(&fallback.raw_text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if fallback_paragraphs.is_empty() {
        return;
    }

    for section in &mut merged.sections {
        if !section.title.is_empty() && section.paragraphs.is_empty() {
            if let Some(text) = backfill_from_title(&section.title, &fallback_paragraphs) {
                section.paragraphs = vec![text];
            }
        } else if !section.paragraphs.is_empty()
            && section.paragraphs.iter().all(|p| p.len() < SHORT_PARAGRAPH_LEN)
        {
            // All paragraphs suspiciously short: look for a longer fallback
            // paragraph containing the first one.
            let first = &section.paragraphs[0];
            if let Some(longer) = fallback_paragraphs.iter().find(|p| {
                p.contains(first.as_str()) && p.len() as f64 >= first.len() as f64 * 1.5
            }) {
                section.paragraphs = vec![flatten(longer)];
            }
        }
    }
}

/// Find the fallback paragraph mentioning the section title and adopt the
/// text that follows: the remainder of the matching paragraph when the title
/// sits mid-paragraph, otherwise the paragraph immediately after it.
fn backfill_from_title(title: &str, fallback_paragraphs: &[&str]) -> Option<String> {
    let needle = title.to_lowercase();
    for (i, para) in fallback_paragraphs.iter().enumerate() {
        let lower = para.to_lowercase();
        let Some(pos) = lower.find(&needle) else {
            continue;
        };
        let rest = para[pos + needle.len()..].trim();
        if !rest.is_empty() {
            return Some(flatten(rest));
        }
        if let Some(next) = fallback_paragraphs.get(i + 1) {
            return Some(flatten(next));
        }
        return None;
    }
    None
}

fn flatten(text: &str) -> String {
    WS_RUN_RE.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_text(text: &str) -> ExtractionRecord {
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
    fn merge_is_total_on_empty_inputs() {
        let merged = merge(ExtractionRecord::default(), ExtractionRecord::default());
        assert!(merged.raw_text.is_empty());
        assert!(merged.sections.is_empty());
        assert!(merged.references.is_empty());
    }

    #[test]
    fn merged_raw_text_never_shorter_than_either_nonempty_minimum() {
        let cases = [
            ("", "fallback text that is reasonably long for this check ok"),
            ("short primary", "a much longer fallback text with plenty of characters to spare here"),
            (
                "a primary text that is definitely longer than one hundred characters so it is kept as-is by the merge engine policy",
                "short fallback",
            ),
        ];
        for (p, f) in cases {
            let merged = merge(record_with_text(p), record_with_text(f));
            let floor = p.len().min(f.len());
            assert!(merged.raw_text.len() >= floor, "case ({p:?}, {f:?})");
        }
    }

    #[test]
    fn title_candidate_from_fallback_first_plausible_line() {
        let mut fallback = record_with_text("x\nEffects of Topical Agents on Healing\nmore text");
        fallback.title = None;
        let merged = merge(ExtractionRecord::default(), fallback);
        assert_eq!(
            merged.title.as_deref(),
            Some("Effects of Topical Agents on Healing")
        );
    }

    #[test]
    fn primary_title_wins_over_fallback() {
        let primary = ExtractionRecord {
            title: Some("Primary Title Kept".to_string()),
            ..ExtractionRecord::default()
        };
        let fallback = record_with_text("A different first line that is long enough");
        let merged = merge(primary, fallback);
        assert_eq!(merged.title.as_deref(), Some("Primary Title Kept"));
    }

    #[test]
    fn thin_primary_text_replaced_by_fallback() {
        let primary = record_with_text("too short");
        let long = "l".repeat(300);
        let merged = merge(primary, record_with_text(&long));
        assert_eq!(merged.raw_text, long);
    }

    #[test]
    fn sections_derived_from_fallback_when_primary_has_none() {
        let fallback = record_with_text(
            "INTRODUCTION\n\nIntro paragraph.\n\nMETHODS\n\nMethod paragraph.\n\nRESULTS\n\nResult paragraph.",
        );
        let merged = merge(ExtractionRecord::default(), fallback);
        assert_eq!(merged.sections.len(), 3);
        assert_eq!(merged.sections[1].title, "METHODS");
    }

    #[test]
    fn empty_titled_section_backfilled_from_fallback() {
        let primary = ExtractionRecord {
            raw_text: "p".repeat(200),
            sections: vec![
                Section {
                    title: "Methods".to_string(),
                    paragraphs: vec![],
                },
                Section {
                    title: "Results".to_string(),
                    paragraphs: vec![
                        "r".repeat(120),
                        "s".repeat(120),
                        "t".repeat(120),
                    ],
                },
            ],
            ..ExtractionRecord::default()
        };
        let fallback = record_with_text(
            "Intro text before.\n\nThe study Methods\nWe performed a retrospective chart review.\n\nOther paragraph.",
        );
        let merged = merge(primary, fallback);
        assert_eq!(
            merged.sections[0].paragraphs,
            vec!["We performed a retrospective chart review."]
        );
    }

    #[test]
    fn short_section_paragraph_replaced_by_longer_fallback_match() {
        let primary = ExtractionRecord {
            raw_text: "p".repeat(200),
            sections: vec![
                Section {
                    title: "Discussion".to_string(),
                    paragraphs: vec!["The drug worked".to_string()],
                },
                Section {
                    title: "Filler".to_string(),
                    paragraphs: vec!["x".repeat(150), "y".repeat(150)],
                },
            ],
            ..ExtractionRecord::default()
        };
        let fallback = record_with_text(
            "The drug worked well in the majority of enrolled patients over twelve weeks.\n\nUnrelated.",
        );
        let merged = merge(primary, fallback);
        assert_eq!(
            merged.sections[0].paragraphs,
            vec!["The drug worked well in the majority of enrolled patients over twelve weeks."]
        );
    }

    #[test]
    fn references_recovered_from_fallback_heading() {
        let fallback = record_with_text(
            "Body text here.\n\nREFERENCES\n[1] Smith J. A paper. 2020.\n[2] Jones K. Another. 2021.",
        );
        let merged = merge(ExtractionRecord::default(), fallback);
        assert_eq!(merged.references.len(), 2);
        assert_eq!(merged.references[0].ref_id.as_deref(), Some("1"));
    }

    #[test]
    fn primary_references_not_overwritten() {
        let mut primary = ExtractionRecord::default();
        primary.references.push(crate::ReferenceRecord::from_raw("Kept ref"));
        let fallback = record_with_text("REFERENCES\n[1] Dropped ref.");
        let merged = merge(primary, fallback);
        assert_eq!(merged.references.len(), 1);
        assert_eq!(merged.references[0].raw_text, "Kept ref");
    }

    #[test]
    fn no_empty_sections_leave_merge() {
        let primary = ExtractionRecord {
            sections: vec![Section::default()],
            ..ExtractionRecord::default()
        };
        let merged = merge(primary, ExtractionRecord::default());
        assert!(merged.sections.iter().all(|s| !s.is_empty()));
    }
}
