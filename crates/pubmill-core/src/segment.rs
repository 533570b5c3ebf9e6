use once_cell::sync::Lazy;
use regex::Regex;

use crate::{ReferenceRecord, Section};

/// Canonical section headings recognized in scholarly body text, longest
/// variants first so the alternation prefers them.
static HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:\d+\.?[ \t]*)?(MATERIALS\s+AND\s+METHODS|RESULTS\s+AND\s+DISCUSSION|ABSTRACT|INTRODUCTION|BACKGROUND|METHODOLOGY|METHODS|RESULTS|FINDINGS|DISCUSSION|CONCLUSIONS?|ACKNOWLEDGE?MENTS?|REFERENCES?|BIBLIOGRAPHY)[ \t:]*$",
    )
    .unwrap()
});

/// References/bibliography heading, anchored at line start.
static REFS_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*(?:REFERENCES?|BIBLIOGRAPHY)[ \t:]*$").unwrap());

/// Numbered reference markers: `[1]`, `1.`, `(1)`.
static REF_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*(?:\[\d+\]|\d+\.|\(\d+\))[ \t]+").unwrap());

static BLANK_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());
static WS_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Split text into paragraphs on blank-line boundaries. Single line breaks
/// inside a paragraph become spaces and whitespace runs collapse.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    BLANK_LINE_RE
        .split(text)
        .map(|p| WS_RUN_RE.replace_all(p.trim(), " ").into_owned())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Derive sections from raw text using the canonical heading patterns.
///
/// Each heading match begins a new section whose body runs to the next match
/// or end of text. When no heading is found the whole text becomes a single
/// untitled section so no content is dropped.
pub fn segment_sections(text: &str) -> Vec<Section> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let matches: Vec<_> = HEADING_RE.find_iter(text).collect();
    if matches.is_empty() {
        let paragraphs = split_paragraphs(text);
        if paragraphs.is_empty() {
            return Vec::new();
        }
        return vec![Section {
            title: String::new(),
            paragraphs,
        }];
    }

    let mut sections = Vec::new();
    for (i, m) in matches.iter().enumerate() {
        let title = m.as_str().trim().trim_end_matches(':').trim().to_string();
        let start = m.end();
        let end = if i + 1 < matches.len() {
            matches[i + 1].start()
        } else {
            text.len()
        };
        let paragraphs = split_paragraphs(&text[start..end]);
        if !title.is_empty() || !paragraphs.is_empty() {
            sections.push(Section { title, paragraphs });
        }
    }
    sections
}

/// Recover references from raw text when the primary extractor produced none.
///
/// Locates a references/bibliography heading and splits the following block
/// on numbered-marker patterns. Each chunk becomes a reference with a
/// positionally assigned id.
pub fn recover_references(text: &str) -> Vec<ReferenceRecord> {
    let Some(heading) = REFS_HEADING_RE.find(text) else {
        return Vec::new();
    };

    let block = &text[heading.end()..];
    // Prefix with a newline so a marker on the first line still splits.
    let prefixed = format!("\n{}", block.trim_start_matches(['\r', '\n']));

    let Some(first) = REF_MARKER_RE.find(&prefixed) else {
        // No numbered markers at all: fall back to blank-line entries.
        return BLANK_LINE_RE
            .split(block)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .enumerate()
            .map(|(i, c)| numbered_reference(c, i + 1))
            .collect();
    };

    // Anything before the first marker is stray front matter, not a reference.
    REF_MARKER_RE
        .split(&prefixed[first.start()..])
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .enumerate()
        .map(|(i, c)| numbered_reference(c, i + 1))
        .collect()
}

fn numbered_reference(raw: &str, position: usize) -> ReferenceRecord {
    let mut record = ReferenceRecord::from_raw(WS_RUN_RE.replace_all(raw, " ").into_owned());
    record.ref_id = Some(position.to_string());
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_paragraphs_on_blank_lines() {
        let text = "First paragraph\ncontinues here.\n\nSecond paragraph.\n\n\nThird.";
        let paras = split_paragraphs(text);
        assert_eq!(
            paras,
            vec![
                "First paragraph continues here.",
                "Second paragraph.",
                "Third.",
            ]
        );
    }

    #[test]
    fn segment_basic_headings() {
        let text = "INTRODUCTION\n\nSome intro text here.\n\nMETHODS\n\nWe did things.\n\nRESULTS\n\nIt worked.";
        let sections = segment_sections(text);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].title, "INTRODUCTION");
        assert_eq!(sections[0].paragraphs, vec!["Some intro text here."]);
        assert_eq!(sections[1].title, "METHODS");
        assert_eq!(sections[2].paragraphs, vec!["It worked."]);
    }

    #[test]
    fn segment_compound_heading() {
        let text = "MATERIALS AND METHODS\n\nProtocol details.\n\nCONCLUSION\n\nDone.";
        let sections = segment_sections(text);
        assert_eq!(sections[0].title, "MATERIALS AND METHODS");
        assert_eq!(sections[1].title, "CONCLUSION");
    }

    #[test]
    fn segment_heading_with_colon_and_case() {
        let text = "Introduction:\n\nLowercase heading still matches.";
        let sections = segment_sections(text);
        assert_eq!(sections[0].title, "Introduction");
    }

    #[test]
    fn segment_no_headings_gives_single_untitled_section() {
        let text = "Just a blob of text.\n\nAnother paragraph.";
        let sections = segment_sections(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "");
        assert_eq!(sections[0].paragraphs.len(), 2);
    }

    #[test]
    fn segment_empty_text() {
        assert!(segment_sections("").is_empty());
        assert!(segment_sections("   \n  ").is_empty());
    }

    #[test]
    fn heading_inside_sentence_is_not_a_section() {
        let text = "We give an introduction to the topic here and never break.";
        let sections = segment_sections(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "");
    }

    #[test]
    fn recover_bracket_numbered_references() {
        let text = "Body text.\n\nREFERENCES\n[1] Smith J. First paper. 2020.\n[2] Jones K. Second paper. 2021.\n[3] Lee M. Third paper. 2022.";
        let refs = recover_references(text);
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].ref_id.as_deref(), Some("1"));
        assert!(refs[0].raw_text.starts_with("Smith J."));
        assert_eq!(refs[2].ref_id.as_deref(), Some("3"));
    }

    #[test]
    fn recover_dot_numbered_references() {
        let text = "BIBLIOGRAPHY\n1. Alpha ref text.\n2. Beta ref text.";
        let refs = recover_references(text);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].raw_text, "Beta ref text.");
    }

    #[test]
    fn recover_without_heading_returns_empty() {
        assert!(recover_references("No bibliography here at all.").is_empty());
    }

    #[test]
    fn recover_unnumbered_falls_back_to_blank_lines() {
        let text = "References\nSmith J. One paper. 2019.\n\nJones K. Another paper. 2020.";
        let refs = recover_references(text);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].ref_id.as_deref(), Some("1"));
    }
}
