use once_cell::sync::Lazy;
use regex::Regex;

use crate::ReferenceRecord;

/// One step of the enrichment chain. Each extractor owns a single target
/// field and must only write it when it is still empty, so precedence stays
/// explicit and each step is testable in isolation.
type FieldExtractor = fn(&str, &mut ReferenceRecord);

/// The fixed extraction order: year, authors, title, journal, volume/issue,
/// pages, DOI. Later steps may depend on fields produced by earlier ones.
const EXTRACTORS: [FieldExtractor; 7] = [
    extract_year,
    extract_authors,
    extract_title,
    extract_journal,
    extract_volume_issue,
    extract_pages,
    extract_doi,
];

/// Backfill missing structured fields of a reference from its raw text.
/// Already-populated fields are never overwritten.
pub fn enrich_reference(reference: &mut ReferenceRecord) {
    if reference.raw_text.is_empty() {
        return;
    }
    let raw = reference.raw_text.clone();
    for extract in EXTRACTORS {
        extract(&raw, reference);
    }
}

static PAREN_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d{4})\)").unwrap());
static BARE_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").unwrap());

fn extract_year(raw: &str, reference: &mut ReferenceRecord) {
    if reference.year.is_some() {
        return;
    }
    if let Some(caps) = PAREN_YEAR_RE.captures(raw) {
        reference.year = Some(caps[1].to_string());
    } else if let Some(caps) = BARE_YEAR_RE.captures(raw) {
        reference.year = Some(caps[1].to_string());
    }
}

/// Leading author list: `Surname A, Surname B, et al.`
static AUTHOR_LIST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([A-Z][a-z]+\s+[A-Z](?:\.|\b)(?:,\s*[A-Z][a-z]+\s+[A-Z](?:\.|\b))*(?:,?\s*et\s+al\.?)?)",
    )
    .unwrap()
});

fn extract_authors(raw: &str, reference: &mut ReferenceRecord) {
    if !reference.authors.is_empty() {
        return;
    }
    let Some(caps) = AUTHOR_LIST_RE.captures(raw) else {
        return;
    };
    reference.authors = caps[1]
        .split(',')
        .map(|a| a.trim().trim_end_matches('.').trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
}

fn extract_title(raw: &str, reference: &mut ReferenceRecord) {
    if reference.title.is_some() {
        return;
    }
    let Some(first_author) = reference.authors.first() else {
        return;
    };
    // Title follows the author block's closing period and runs to the next
    // period.
    let pattern = format!(r"{}[^.]*\.\s+([^.]+?)[.]", regex::escape(first_author));
    let Ok(re) = Regex::new(&pattern) else {
        return;
    };
    if let Some(caps) = re.captures(raw) {
        let title = caps[1].trim();
        if !title.is_empty() {
            reference.title = Some(title.to_string());
        }
    }
}

fn extract_journal(raw: &str, reference: &mut ReferenceRecord) {
    if reference.journal.is_some() {
        return;
    }
    let Some(title) = reference.title.as_deref() else {
        return;
    };
    // Journal name follows the title and ends at a period, digit, or volume
    // parenthetical.
    let pattern = format!(r"{}\.?\s+([^.\d(]+?)(?:[.]|\d|\(|$)", regex::escape(title));
    let Ok(re) = Regex::new(&pattern) else {
        return;
    };
    if let Some(caps) = re.captures(raw) {
        let journal = caps[1].trim().trim_end_matches(',').trim();
        if !journal.is_empty() {
            reference.journal = Some(journal.to_string());
        }
    }
}

/// `12(3)` style volume/issue pair.
static VOL_ISSUE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*\((\d+)\)").unwrap());
/// Vancouver `;12:` volume before the page colon.
static SEMI_VOL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r";\s*(\d+)\s*:").unwrap());
static LABELED_VOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Vol(?:\.|ume)?\s*(\d+)").unwrap());

fn extract_volume_issue(raw: &str, reference: &mut ReferenceRecord) {
    if reference.volume.is_none() {
        if let Some(caps) = VOL_ISSUE_RE.captures(raw) {
            reference.volume = Some(caps[1].to_string());
            if reference.issue.is_none() {
                reference.issue = Some(caps[2].to_string());
            }
            return;
        }
        if let Some(caps) = SEMI_VOL_RE.captures(raw) {
            reference.volume = Some(caps[1].to_string());
        } else if let Some(caps) = LABELED_VOL_RE.captures(raw) {
            reference.volume = Some(caps[1].to_string());
        }
    } else if reference.issue.is_none() {
        if let Some(caps) = VOL_ISSUE_RE.captures(raw) {
            if caps[1].to_string() == *reference.volume.as_deref().unwrap_or_default() {
                reference.issue = Some(caps[2].to_string());
            }
        }
    }
}

static PAGES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[:,]\s*(?:p(?:p|ages?)?\.?\s*)?(\d+(?:\s*[-\u{2013}]\s*\d+)?)").unwrap()
});

fn extract_pages(raw: &str, reference: &mut ReferenceRecord) {
    if reference.pages.is_some() {
        return;
    }
    if let Some(caps) = PAGES_RE.captures(raw) {
        let pages: String = caps[1].chars().filter(|c| !c.is_whitespace()).collect();
        reference.pages = Some(pages.replace('\u{2013}', "-"));
    }
}

static DOI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:doi:?\s*|https?://(?:dx\.)?doi\.org/)(10\.\d+(?:\.\d+)*/\S+)").unwrap()
});

fn extract_doi(raw: &str, reference: &mut ReferenceRecord) {
    if reference.doi.is_some() {
        return;
    }
    if let Some(caps) = DOI_RE.captures(raw) {
        let doi = caps[1].trim_end_matches(['.', ',', ';', ':']);
        reference.doi = Some(doi.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vancouver_reference_fully_enriched() {
        let mut r =
            ReferenceRecord::from_raw("Smith J. Title X. J Med. 2020;12(3):45-50. doi:10.1/abc");
        enrich_reference(&mut r);
        assert_eq!(r.year.as_deref(), Some("2020"));
        assert_eq!(r.journal.as_deref(), Some("J Med"));
        assert_eq!(r.volume.as_deref(), Some("12"));
        assert_eq!(r.issue.as_deref(), Some("3"));
        assert_eq!(r.pages.as_deref(), Some("45-50"));
        assert_eq!(r.doi.as_deref(), Some("10.1/abc"));
    }

    #[test]
    fn parenthesized_year_preferred() {
        let mut r = ReferenceRecord::from_raw("Brown T. (2018) Some study. In 2020 we learned.");
        enrich_reference(&mut r);
        assert_eq!(r.year.as_deref(), Some("2018"));
    }

    #[test]
    fn populated_fields_never_overwritten() {
        let mut r = ReferenceRecord::from_raw("Smith J. Title X. J Med. 2020;12(3):45-50.");
        r.year = Some("1999".to_string());
        r.journal = Some("Kept Journal".to_string());
        enrich_reference(&mut r);
        assert_eq!(r.year.as_deref(), Some("1999"));
        assert_eq!(r.journal.as_deref(), Some("Kept Journal"));
    }

    #[test]
    fn author_list_with_et_al() {
        let mut r = ReferenceRecord::from_raw("Garcia M, Lopez R, et al. Outcomes study. 2021.");
        enrich_reference(&mut r);
        assert_eq!(r.authors, vec!["Garcia M", "Lopez R", "et al"]);
    }

    #[test]
    fn doi_url_form() {
        let mut r = ReferenceRecord::from_raw("Anon. https://doi.org/10.1016/j.jaad.2019.01.002.");
        enrich_reference(&mut r);
        assert_eq!(r.doi.as_deref(), Some("10.1016/j.jaad.2019.01.002"));
    }

    #[test]
    fn no_panic_on_unstructured_text() {
        let mut r = ReferenceRecord::from_raw("an unparseable scribble");
        enrich_reference(&mut r);
        assert!(r.title.is_none());
        assert!(r.doi.is_none());
    }

    #[test]
    fn empty_raw_text_is_a_no_op() {
        let mut r = ReferenceRecord::default();
        enrich_reference(&mut r);
        assert!(!r.has_structured_fields());
    }
}
