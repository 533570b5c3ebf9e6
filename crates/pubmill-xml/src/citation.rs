//! Mixed-content citation assembly.
//!
//! A `mixed-citation` interleaves typed sub-elements (names, title, source,
//! volume, pages, DOI) with connecting punctuation that must land in the
//! correct text run. The builder tracks where the trailing text run is, so
//! separators attach to the last written unit instead of being lost.

use pubmill_core::ReferenceRecord;

use crate::tree::Element;

/// Builds one `mixed-citation` element field by field.
///
/// Fields are processed in a fixed order (authors, year, title, journal,
/// volume/issue, pages, DOI); before each unit the builder decides from what
/// has already been written whether a separator belongs in front of it.
pub struct CitationBuilder {
    node: Element,
}

impl CitationBuilder {
    pub fn new(publication_type: &str) -> Self {
        let mut node = Element::new("mixed-citation");
        node.set_attr(
            "publication-type",
            if publication_type.is_empty() {
                "journal"
            } else {
                publication_type
            },
        );
        Self { node }
    }

    /// Append a separator, but only once something precedes it.
    fn separator(&mut self, sep: &str) {
        if !self.node.is_content_empty() {
            self.node.append_text(sep);
        }
    }

    fn append_unit(&mut self, element: Element) {
        self.node.push(element);
    }

    /// Render the whole reference. Falls back to the raw text verbatim when
    /// no structured fields exist at all.
    pub fn build(reference: &ReferenceRecord) -> Element {
        let mut builder = Self::new(&reference.publication_type);

        if !reference.has_structured_fields() {
            builder.node.text = Some(reference.raw_text.clone());
            return builder.node;
        }

        builder.write_authors(&reference.authors);
        if let Some(year) = &reference.year {
            builder.write_year(year);
        }
        if let Some(title) = &reference.title {
            builder.separator(". ");
            builder.append_unit(Element::with_text("article-title", title.trim()));
        }
        if let Some(journal) = &reference.journal {
            builder.separator(". ");
            builder.append_unit(Element::with_text("source", journal.trim()));
        }
        let vol_issue_written = builder.write_volume_issue(reference);
        if let Some(pages) = &reference.pages {
            builder.write_pages(pages, vol_issue_written);
        }
        if let Some(doi) = &reference.doi {
            builder.separator(". ");
            let mut pub_id = Element::with_text("pub-id", doi.trim());
            pub_id.set_attr("pub-id-type", "doi");
            builder.append_unit(pub_id);
        }

        builder.finish()
    }

    /// Authors as `string-name` elements, comma-separated with "and" before
    /// the final name.
    fn write_authors(&mut self, authors: &[String]) {
        for (i, author) in authors.iter().enumerate() {
            if i > 0 {
                if i == authors.len() - 1 {
                    self.node.append_text(" and ");
                } else {
                    self.node.append_text(", ");
                }
            }
            self.append_unit(string_name(author));
        }
    }

    /// Year as a plain-text parenthetical, attached to the trailing run.
    fn write_year(&mut self, year: &str) {
        if self.node.is_content_empty() {
            self.node.append_text(&format!("({year})"));
        } else {
            self.node.append_text(&format!(" ({year})"));
        }
    }

    /// Returns true when a volume or issue unit was written.
    fn write_volume_issue(&mut self, reference: &ReferenceRecord) -> bool {
        let Some(volume) = &reference.volume else {
            return false;
        };
        self.separator(" ");
        self.append_unit(Element::with_text("volume", volume.trim()));
        if let Some(issue) = &reference.issue {
            self.node.append_text("(");
            self.append_unit(Element::with_text("issue", issue.trim()));
            self.node.append_text(")");
        }
        true
    }

    fn write_pages(&mut self, pages: &str, after_vol_issue: bool) {
        if after_vol_issue {
            self.node.append_text(":");
        } else {
            self.separator(" ");
        }
        match pages.split_once('-') {
            Some((first, last)) => {
                self.append_unit(Element::with_text("fpage", first.trim()));
                self.node.append_text("-");
                self.append_unit(Element::with_text("lpage", last.trim()));
            }
            None => {
                self.append_unit(Element::with_text("fpage", pages.trim()));
            }
        }
    }

    /// Ensure the citation ends with a period.
    fn finish(mut self) -> Element {
        let trailing_period = match self.node.children.last() {
            Some(last) => last
                .tail
                .as_deref()
                .is_some_and(|t| t.trim_end().ends_with('.')),
            None => self
                .node
                .text
                .as_deref()
                .is_some_and(|t| t.trim_end().ends_with('.')),
        };
        if !self.node.is_content_empty() && !trailing_period {
            self.node.append_text(".");
        }
        self.node
    }
}

/// `string-name` with surname/given-names split. `Surname, Given` splits on
/// the comma; otherwise the last word is taken as the surname.
fn string_name(author: &str) -> Element {
    let (surname, given_names) = match author.split_once(',') {
        Some((s, g)) => (s.trim().to_string(), g.trim().to_string()),
        None => {
            let words: Vec<&str> = author.split_whitespace().collect();
            match words.split_last() {
                Some((last, rest)) if !rest.is_empty() => {
                    // "Smith J" style: initial last, surname first.
                    if last.len() <= 2 && last.chars().all(|c| c.is_ascii_uppercase()) {
                        (rest.join(" "), (*last).to_string())
                    } else {
                        ((*last).to_string(), rest.join(" "))
                    }
                }
                _ => (author.trim().to_string(), String::new()),
            }
        }
    };
    let mut name = Element::new("string-name");
    let surname_elem = name.push(Element::with_text("surname", surname));
    if !given_names.is_empty() {
        surname_elem.tail = Some(" ".to_string());
        name.push(Element::with_text("given-names", given_names));
    }
    name
}
