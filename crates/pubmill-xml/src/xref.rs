//! Inline citation-marker cross-referencing.
//!
//! Bracketed numeric markers in body text (`[1]`, `[1,2]`, `[1-3]`) become
//! `xref` elements pointing at the bibliography, while every byte of the
//! surrounding text is preserved in the paragraph's text/tail runs.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::tree::Element;

/// `[n]`, `[n,m,...]`, `[n-m]` and mixtures thereof.
static CITATION_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+(?:[-,]\d+)*)\]").unwrap());

pub fn has_citation_markers(text: &str) -> bool {
    CITATION_MARKER_RE.is_match(text)
}

/// Build a `p` element from paragraph text, rewriting each citation marker
/// into an `xref` whose label is the original bracket text.
///
/// A range (`[1-3]`) or list (`[1,2]`) marker targets the first number; the
/// `rid` carries the bibliography `B` prefix so it lands in the reference
/// identifier namespace.
pub fn paragraph_with_citations(text: &str) -> Element {
    let mut p = Element::new("p");

    let matches: Vec<_> = CITATION_MARKER_RE.captures_iter(text).collect();
    if matches.is_empty() {
        p.text = Some(text.to_string());
        return p;
    }

    let mut cursor = 0;
    for caps in &matches {
        let whole = caps.get(0).unwrap_or_else(|| unreachable!("group 0 always matches"));
        let numbers = &caps[1];
        let primary = primary_target(numbers);

        p.append_text(&text[cursor..whole.start()]);

        let mut xref = Element::with_text("xref", whole.as_str());
        xref.set_attr("ref-type", "bibr");
        xref.set_attr("rid", format!("B{primary}"));
        p.push(xref);

        cursor = whole.end();
    }
    p.append_text(&text[cursor..]);

    if p.text.is_none() {
        // A marker at position zero leaves no leading text run.
        p.text = Some(String::new());
    }
    p
}

/// First number of a marker body: `1-3` and `1,2` both resolve to `1`.
fn primary_target(numbers: &str) -> &str {
    numbers
        .split(['-', ','])
        .next()
        .unwrap_or(numbers)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Concatenate all text runs minus the xref labels.
    fn surrounding_text(p: &Element) -> String {
        let mut out = String::new();
        if let Some(text) = &p.text {
            out.push_str(text);
        }
        for child in &p.children {
            if let Some(tail) = &child.tail {
                out.push_str(tail);
            }
        }
        out
    }

    #[test]
    fn detects_markers() {
        assert!(has_citation_markers("seen [1] here"));
        assert!(has_citation_markers("range [2-4]"));
        assert!(!has_citation_markers("no markers [a] here"));
    }

    #[test]
    fn single_and_list_markers_become_xrefs() {
        let p = paragraph_with_citations("Effects were seen [1,2] and confirmed [3].");
        assert_eq!(p.children.len(), 2);
        assert_eq!(p.children[0].attr("rid"), Some("B1"));
        assert_eq!(p.children[0].text.as_deref(), Some("[1,2]"));
        assert_eq!(p.children[1].attr("rid"), Some("B3"));
        assert_eq!(p.text.as_deref(), Some("Effects were seen "));
        assert_eq!(p.children[0].tail.as_deref(), Some(" and confirmed "));
        assert_eq!(p.children[1].tail.as_deref(), Some("."));
    }

    #[test]
    fn range_marker_targets_first_number() {
        let p = paragraph_with_citations("Reviewed in [4-7].");
        assert_eq!(p.children[0].attr("rid"), Some("B4"));
        assert_eq!(p.children[0].text.as_deref(), Some("[4-7]"));
    }

    #[test]
    fn marker_at_start_leaves_empty_leading_text() {
        let p = paragraph_with_citations("[1] opened the field.");
        assert_eq!(p.text.as_deref(), Some(""));
        assert_eq!(p.children[0].tail.as_deref(), Some(" opened the field."));
    }

    #[test]
    fn surrounding_text_preserved_byte_for_byte() {
        let original = "A [1] B [2,3] C [4-6] D.";
        let p = paragraph_with_citations(original);
        let mut stripped = original.to_string();
        for marker in ["[1]", "[2,3]", "[4-6]"] {
            stripped = stripped.replacen(marker, "", 1);
        }
        assert_eq!(surrounding_text(&p), stripped);
    }

    #[test]
    fn adjacent_markers() {
        let p = paragraph_with_citations("x[1][2]y");
        assert_eq!(p.children.len(), 2);
        assert!(p.children[0].tail.is_none());
        assert_eq!(p.children[1].tail.as_deref(), Some("y"));
    }
}
