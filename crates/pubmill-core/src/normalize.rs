use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::enrich::enrich_reference;
use crate::metadata::find_keywords;
use crate::segment::segment_sections;
use crate::{ExtractionRecord, ReferenceRecord, Section};

/// Canonical content shape consumed by the document synthesizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedContent {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub sections: Vec<Section>,
    pub references: Vec<ReferenceRecord>,
    pub keywords: Vec<String>,
}

static HYPHEN_BREAK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w)-\s+(\w)").unwrap());
static WS_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Header/footer noise: page markers, copyright lines, bare URLs.
static HEADER_FOOTER_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^Page \d+( of \d+)?$",
        r"^\d+$",
        r"(?i)^Copyright \u{00A9}?\s*\d{4}",
        r"(?i)^All rights reserved",
        r"www\..+\.\w+",
        r"https?://",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Clean, deduplicate, and reclassify a merged record's content into the
/// canonical shape. Idempotent: normalizing already-normalized content
/// yields the same result.
pub fn normalize(record: &ExtractionRecord) -> NormalizedContent {
    let title = repair_case(
        record
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(|t| WS_RUN_RE.replace_all(t.trim(), " ").into_owned())
            .unwrap_or_else(|| "Untitled Article".to_string()),
    );

    let mut sections = if record.sections.is_empty() && !record.raw_text.is_empty() {
        segment_sections(&record.raw_text)
    } else {
        record.sections.clone()
    };
    sections = normalize_sections(sections);

    let references = normalize_references(record.references.clone());

    let keywords = find_keywords(&record.raw_text);

    NormalizedContent {
        title,
        abstract_text: record
            .abstract_text
            .as_deref()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty()),
        sections,
        references,
        keywords,
    }
}

/// Clean a paragraph: collapse whitespace runs, rejoin hyphen-broken words,
/// and collapse runs of four or more repeated characters to two.
pub fn clean_paragraph(text: &str) -> String {
    let collapsed = WS_RUN_RE.replace_all(text.trim(), " ");
    let rejoined = HYPHEN_BREAK_RE.replace_all(&collapsed, "$1$2");
    collapse_repeats(&rejoined)
}

/// Runs of four or more identical characters are OCR artifacts; keep two.
/// The regex crate has no backreferences, so this is a run-length scan.
fn collapse_repeats(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let mut j = i;
        while j < chars.len() && chars[j] == c {
            j += 1;
        }
        let run = j - i;
        let keep = if run >= 4 { 2 } else { run };
        for _ in 0..keep {
            out.push(c);
        }
        i = j;
    }
    out
}

/// True when a paragraph looks like a running header or footer.
pub fn is_header_footer(text: &str) -> bool {
    HEADER_FOOTER_RES.iter().any(|re| re.is_match(text))
}

fn is_page_number(text: &str) -> bool {
    text.len() < 10 && !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

fn normalize_sections(sections: Vec<Section>) -> Vec<Section> {
    let mut out = Vec::with_capacity(sections.len());
    for section in sections {
        let title = repair_case(WS_RUN_RE.replace_all(section.title.trim(), " ").into_owned());

        let mut seen: HashSet<String> = HashSet::new();
        let mut paragraphs = Vec::with_capacity(section.paragraphs.len());
        for p in &section.paragraphs {
            let cleaned = clean_paragraph(p);
            if cleaned.is_empty() || is_page_number(&cleaned) || is_header_footer(&cleaned) {
                continue;
            }
            if !seen.insert(cleaned.clone()) {
                continue;
            }
            paragraphs.push(cleaned);
        }

        if !title.is_empty() || !paragraphs.is_empty() {
            out.push(Section { title, paragraphs });
        }
    }
    out
}

/// All-caps (or all-lowercase) titles are extractor artifacts; rewrite them
/// in title case.
fn repair_case(title: String) -> String {
    let has_alpha = title.chars().any(|c| c.is_alphabetic());
    if !has_alpha {
        return title;
    }
    let all_upper = title.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase());
    let all_lower = title.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_lowercase());
    if !all_upper && !all_lower {
        return title;
    }
    title
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_references(references: Vec<ReferenceRecord>) -> Vec<ReferenceRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<ReferenceRecord> = Vec::with_capacity(references.len());

    for mut r in references {
        if r.raw_text.trim().is_empty() {
            continue;
        }
        r.raw_text = WS_RUN_RE.replace_all(r.raw_text.trim(), " ").into_owned();
        if let Some(t) = r.title.take() {
            let t = WS_RUN_RE.replace_all(t.trim(), " ").into_owned();
            let t = t.trim_end_matches('.').to_string();
            if !t.is_empty() {
                r.title = Some(t);
            }
        }
        if let Some(j) = r.journal.take() {
            let j = WS_RUN_RE.replace_all(j.trim(), " ").into_owned();
            if !j.is_empty() {
                r.journal = Some(j);
            }
        }

        enrich_reference(&mut r);

        if !seen.insert(r.raw_text.clone()) {
            continue;
        }
        out.push(r);
    }

    reassign_ids(&mut out);
    out
}

/// Ensure every surviving reference carries a non-empty, document-unique
/// id. Ids are kept as-is when they are already complete and unique;
/// otherwise the whole sequence is renumbered positionally.
fn reassign_ids(references: &mut [ReferenceRecord]) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut complete = true;
    for r in references.iter() {
        match r.ref_id.as_deref() {
            Some(id) if !id.is_empty() => *counts.entry(id).or_insert(0) += 1,
            _ => complete = false,
        }
    }
    let unique = counts.values().all(|&c| c == 1);
    if complete && unique {
        return;
    }
    for (i, r) in references.iter_mut().enumerate() {
        r.ref_id = Some((i + 1).to_string());
    }
}
