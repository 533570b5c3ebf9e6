//! Document tree synthesis.
//!
//! Builds the full `article` tree (front, body, back) from the normalized
//! content and metadata. Synthesis always succeeds; missing data is defaulted
//! rather than rejected, and a final invariant pass guarantees the minimum
//! shape the validator requires.

use chrono::{Datelike, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use pubmill_core::{ArticleMetadata, AuthorRecord, JournalIdentity, NormalizedContent};

use crate::citation::CitationBuilder;
use crate::tree::Element;
use crate::xref::{has_citation_markers, paragraph_with_citations};

const MONTH_CODES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

static SLUG_STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]").unwrap());
static SLUG_SQUEEZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());

/// Synthesizer configuration: the publication target and schema identity
/// embedded in the serialized document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizerConfig {
    pub journal: JournalIdentity,
    /// When set, the configured journal identity overrides whatever the
    /// extractors found. This deployment publishes into a single journal, so
    /// extracted journal metadata is treated as noise by default.
    pub force_canonical_journal: bool,
    pub dtd_version: String,
    pub dtd_public_id: String,
    /// System identifier written into the DOCTYPE declaration.
    pub dtd_system_id: String,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            journal: JournalIdentity::canonical(),
            force_canonical_journal: true,
            dtd_version: "2.3".to_string(),
            dtd_public_id: "-//NLM//DTD Journal Publishing DTD v2.3 20070202//EN".to_string(),
            dtd_system_id: "journalpublishing.dtd".to_string(),
        }
    }
}

impl SynthesizerConfig {
    pub fn doctype(&self) -> String {
        format!(
            "article PUBLIC \"{}\" \"{}\"",
            self.dtd_public_id, self.dtd_system_id
        )
    }
}

/// Build the complete document tree. Never fails.
pub fn synthesize(
    config: &SynthesizerConfig,
    journal: &JournalIdentity,
    article: &ArticleMetadata,
    content: &NormalizedContent,
) -> Element {
    let journal = if config.force_canonical_journal {
        &config.journal
    } else {
        journal
    };

    let mut root = Element::new("article");
    root.set_attr("xmlns:xlink", "http://www.w3.org/1999/xlink");
    root.set_attr("dtd-version", config.dtd_version.clone());
    root.set_attr(
        "article-type",
        if article.article_type.is_empty() {
            "research-article"
        } else {
            &article.article_type
        },
    );
    root.set_attr("xml:lang", "en");

    let front = root.push(Element::new("front"));
    build_journal_meta(front, journal);
    build_article_meta(front, journal, article, content);

    let body = root.push(Element::new("body"));
    build_body(body, content);

    let back = root.push(Element::new("back"));
    build_references(back, content);

    ensure_required_elements(&mut root, journal, article);
    root
}

fn build_journal_meta(front: &mut Element, journal: &JournalIdentity) {
    let meta = front.push(Element::new("journal-meta"));

    let id = meta.push(Element::with_text("journal-id", journal.journal_id.clone()));
    id.set_attr("journal-id-type", "publisher-id");

    let title_group = meta.push(Element::new("journal-title-group"));
    title_group.push(Element::with_text(
        "journal-title",
        journal.journal_title.clone(),
    ));

    if let Some(issn) = &journal.issn {
        let issn_elem = meta.push(Element::with_text("issn", issn.clone()));
        issn_elem.set_attr("pub-type", "ppub");
    }

    if let Some(publisher) = &journal.publisher {
        let publisher_elem = meta.push(Element::new("publisher"));
        publisher_elem.push(Element::with_text("publisher-name", publisher.clone()));
    }
}

fn build_article_meta(
    front: &mut Element,
    journal: &JournalIdentity,
    article: &ArticleMetadata,
    content: &NormalizedContent,
) {
    let meta = front.push(Element::new("article-meta"));
    build_article_ids(meta, article);
    build_categories(meta, article);

    let title_group = meta.push(Element::new("title-group"));
    title_group.push(Element::with_text("article-title", display_title(article)));

    build_contrib_group(meta, article);
    build_author_notes(meta, article);
    build_pub_date(meta, article);
    build_issue_data(meta, article);
    build_abstract_block(meta, content);
    build_permissions(meta, journal, article);
}

fn display_title(article: &ArticleMetadata) -> String {
    if article.title.trim().is_empty() {
        "Untitled Article".to_string()
    } else {
        article.title.clone()
    }
}

fn build_article_ids(meta: &mut Element, article: &ArticleMetadata) {
    let article_id = article
        .article_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| generate_article_id(&article.title));

    let id_elem = meta.push(Element::with_text("article-id", article_id));
    id_elem.set_attr("pub-id-type", "publisher-id");

    if let Some(doi) = &article.doi {
        let doi_elem = meta.push(Element::with_text("article-id", doi.clone()));
        doi_elem.set_attr("pub-id-type", "doi");
    }
}

/// Slug from the title (lowercase, underscore-separated, capped at 50
/// characters), or a timestamp id when there is no usable title.
fn generate_article_id(title: &str) -> String {
    if !title.trim().is_empty() && title != "Untitled Article" {
        let lowered = title.to_lowercase();
        let slug = SLUG_STRIP_RE.replace_all(&lowered, "_");
        let slug = SLUG_SQUEEZE_RE.replace_all(&slug, "_");
        return slug.chars().take(50).collect();
    }
    format!("article-{}", Local::now().format("%Y%m%d%H%M%S"))
}

/// Category subject from the article type, via a fixed lookup. Unknown types
/// fall back to the first keyword, then to a titleized form of the type.
fn build_categories(meta: &mut Element, article: &ArticleMetadata) {
    let subject = match article.article_type.as_str() {
        "research-article" => "Original Research".to_string(),
        "review-article" | "review" => "Review Article".to_string(),
        "case-report" => "Case Report".to_string(),
        "letter" => "Letter to the Editor".to_string(),
        "editorial" => "Editorial".to_string(),
        "abstract" => "Abstract".to_string(),
        other => match article.keywords.first() {
            Some(keyword) => keyword.clone(),
            None => titleize(other),
        },
    };

    let categories = meta.push(Element::new("article-categories"));
    let group = categories.push(Element::new("subj-group"));
    group.push(Element::with_text("subject", subject));
}

fn titleize(kind: &str) -> String {
    kind.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Contributors with deduplicated affiliation cross-references. Each unique
/// affiliation gets a stable 1-based index shared across authors, and the
/// `aff` elements trail the group.
fn build_contrib_group(meta: &mut Element, article: &ArticleMetadata) {
    if article.authors.is_empty() {
        return;
    }

    let mut affiliations: Vec<String> = Vec::new();
    for author in &article.authors {
        for aff in &author.affiliations {
            if !aff.is_empty() && !affiliations.contains(aff) {
                affiliations.push(aff.clone());
            }
        }
    }

    let group = meta.push(Element::new("contrib-group"));
    for author in &article.authors {
        build_contrib(group, author, article, &affiliations);
    }

    for (i, aff_text) in affiliations.iter().enumerate() {
        let index = i + 1;
        let aff = group.push(Element::new("aff"));
        aff.set_attr("id", format!("aff{index}"));
        aff.push(Element::with_text("label", index.to_string()));
        aff.append_text(aff_text);
    }
}

fn build_contrib(
    group: &mut Element,
    author: &AuthorRecord,
    article: &ArticleMetadata,
    affiliations: &[String],
) {
    let contrib = group.push(Element::new("contrib"));
    contrib.set_attr("contrib-type", "author");
    if is_corresponding(author, article) {
        contrib.set_attr("corresp", "yes");
    }

    let name = contrib.push(Element::new("name"));
    name.push(Element::with_text("surname", author.surname.clone()));
    name.push(Element::with_text("given-names", author.given_names.clone()));

    if let Some(credentials) = &author.credentials {
        contrib.push(Element::with_text("degrees", credentials.clone()));
    }
    if let Some(email) = &author.email {
        contrib.push(Element::with_text("email", email.clone()));
    }

    for aff_text in &author.affiliations {
        if let Some(pos) = affiliations.iter().position(|a| a == aff_text) {
            let index = pos + 1;
            let xref = contrib.push(Element::with_text("xref", index.to_string()));
            xref.set_attr("ref-type", "aff");
            xref.set_attr("rid", format!("aff{index}"));
        }
    }
}

fn is_corresponding(author: &AuthorRecord, article: &ArticleMetadata) -> bool {
    if author.is_corresponding {
        return true;
    }
    let Some(corresponding) = &article.corresponding_author else {
        return false;
    };
    let full_name = format!("{} {}", author.given_names, author.surname);
    corresponding.contains(&full_name)
        || author
            .email
            .as_deref()
            .is_some_and(|email| corresponding.contains(email))
}

/// Correspondence, funding, and conflict footnotes, each emitted only when
/// the underlying statement is non-empty.
fn build_author_notes(meta: &mut Element, article: &ArticleMetadata) {
    if article.corresponding_author.is_none()
        && article.funding_statement.is_none()
        && article.conflict_statement.is_none()
    {
        return;
    }

    let notes = meta.push(Element::new("author-notes"));

    if let Some(corresponding) = &article.corresponding_author {
        let fn_elem = notes.push(Element::new("fn"));
        fn_elem.set_attr("fn-type", "corresp");
        let p = fn_elem.push(Element::new("p"));
        let bold = p.push(Element::with_text("bold", "CORRESPONDENCE:"));
        bold.tail = Some(format!(" {corresponding}"));
    }
    if let Some(funding) = &article.funding_statement {
        let fn_elem = notes.push(Element::new("fn"));
        fn_elem.set_attr("fn-type", "financial-disclosure");
        fn_elem.push(Element::with_text("label", "FUNDING:"));
        fn_elem.push(Element::with_text("p", funding.clone()));
    }
    if let Some(conflict) = &article.conflict_statement {
        let fn_elem = notes.push(Element::new("fn"));
        fn_elem.set_attr("fn-type", "conflict");
        fn_elem.push(Element::with_text("label", "DISCLOSURES:"));
        fn_elem.push(Element::with_text("p", conflict.clone()));
    }
}

/// `pub-date` with a 3-letter season code for the month and the current year
/// as the default when none was extracted.
fn build_pub_date(meta: &mut Element, article: &ArticleMetadata) {
    let pub_date = meta.push(Element::new("pub-date"));
    pub_date.set_attr("pub-type", "ppub");

    let date = &article.publication_date;
    if let Some(month) = &date.month {
        match month.parse::<usize>() {
            Ok(n) if (1..=12).contains(&n) => {
                pub_date.push(Element::with_text("season", MONTH_CODES[n - 1]));
            }
            Ok(_) => {}
            Err(_) => {
                pub_date.push(Element::with_text("season", month.clone()));
            }
        }
    }

    let year = date
        .year
        .clone()
        .unwrap_or_else(|| Local::now().year().to_string());
    pub_date.push(Element::with_text("year", year));

    if let Some(day) = &date.day {
        pub_date.push(Element::with_text("day", day.clone()));
    }
}

fn build_issue_data(meta: &mut Element, article: &ArticleMetadata) {
    if let Some(volume) = &article.volume {
        meta.push(Element::with_text("volume", volume.clone()));
    }
    if let Some(issue) = &article.issue {
        meta.push(Element::with_text("issue", issue.clone()));
    }
    if let Some(fpage) = &article.fpage {
        meta.push(Element::with_text("fpage", fpage.clone()));
        if let Some(lpage) = &article.lpage {
            meta.push(Element::with_text("lpage", lpage.clone()));
        }
    }
}

fn build_abstract_block(meta: &mut Element, content: &NormalizedContent) {
    if let Some(abstract_text) = &content.abstract_text {
        let abstract_elem = meta.push(Element::new("abstract"));
        for paragraph in abstract_text.split("\n\n") {
            let paragraph = paragraph.trim();
            if !paragraph.is_empty() {
                abstract_elem.push(Element::with_text("p", paragraph));
            }
        }
    }

    if !content.keywords.is_empty() {
        let kwd_group = meta.push(Element::new("kwd-group"));
        for keyword in &content.keywords {
            kwd_group.push(Element::with_text("kwd", keyword.trim()));
        }
    }
}

fn build_permissions(meta: &mut Element, journal: &JournalIdentity, article: &ArticleMetadata) {
    let year = article
        .publication_date
        .year
        .clone()
        .unwrap_or_else(|| Local::now().year().to_string());
    push_permissions(meta, journal, &year);
}

fn push_permissions(meta: &mut Element, journal: &JournalIdentity, year: &str) {
    let publisher = journal.publisher.clone().unwrap_or_default();
    let permissions = meta.push(Element::new("permissions"));
    permissions.push(Element::with_text(
        "copyright-statement",
        format!("Copyright \u{00A9} {year}. {publisher}. All rights reserved."),
    ));
    permissions.push(Element::with_text("copyright-year", year));
    permissions.push(Element::with_text("copyright-holder", publisher));
}

/// One `sec` per normalized section. Paragraphs carrying citation markers
/// are rewritten into mixed content with `xref` children.
fn build_body(body: &mut Element, content: &NormalizedContent) {
    for section in &content.sections {
        if section.is_empty() {
            continue;
        }
        let sec = body.push(Element::new("sec"));
        if !section.title.trim().is_empty() {
            sec.push(Element::with_text("title", section.title.trim()));
        }
        for paragraph in &section.paragraphs {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            if has_citation_markers(paragraph) {
                sec.push(paragraph_with_citations(paragraph));
            } else {
                sec.push(Element::with_text("p", paragraph));
            }
        }
    }
}

/// `ref-list` with a fixed title, one `ref` per reference, ids in the `B`
/// bibliography namespace.
fn build_references(back: &mut Element, content: &NormalizedContent) {
    if content.references.is_empty() {
        return;
    }

    let ref_list = back.push(Element::new("ref-list"));
    ref_list.push(Element::with_text("title", "REFERENCES"));

    for (i, reference) in content.references.iter().enumerate() {
        let ref_id = reference
            .ref_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| (i + 1).to_string());
        let ref_elem = ref_list.push(Element::new("ref"));
        ref_elem.set_attr("id", format!("B{ref_id}"));
        ref_elem.push(CitationBuilder::build(reference));
    }
}

/// Final fix-up pass guaranteeing the non-negotiable minimum shape: journal
/// id/title, an article title, at least one author, a publication year, a
/// non-empty body, and a permissions block.
fn ensure_required_elements(
    root: &mut Element,
    journal: &JournalIdentity,
    article: &ArticleMetadata,
) {
    if let Some(id) = root.find_mut("front/journal-meta/journal-id") {
        id.text = Some(journal.journal_id.clone());
    }
    if let Some(title) = root.find_mut("front/journal-meta/journal-title-group/journal-title") {
        title.text = Some(journal.journal_title.clone());
    }
    if root.find("front/journal-meta/issn").is_none() {
        if let (Some(meta), Some(issn)) =
            (root.find_mut("front/journal-meta"), journal.issn.as_ref())
        {
            let issn_elem = meta.push(Element::with_text("issn", issn.clone()));
            issn_elem.set_attr("pub-type", "ppub");
        }
    }

    if root
        .find("front/article-meta/title-group/article-title")
        .is_none()
    {
        if let Some(title_group) = root.find_mut("front/article-meta/title-group") {
            title_group.push(Element::with_text("article-title", display_title(article)));
        }
    }

    // A contrib-group may be missing entirely (no authors) or present but
    // empty; either way a placeholder author is inserted.
    let needs_author = root
        .find("front/article-meta/contrib-group")
        .map(|g| g.find_all("contrib").is_empty())
        .unwrap_or(true);
    if needs_author {
        if let Some(meta) = root.find_mut("front/article-meta") {
            let group = match meta.children.iter().position(|c| c.name == "contrib-group") {
                Some(pos) => &mut meta.children[pos],
                None => {
                    // Insert after the title-group to keep schema order.
                    let pos = meta
                        .children
                        .iter()
                        .position(|c| c.name == "title-group")
                        .map(|p| p + 1)
                        .unwrap_or(meta.children.len());
                    meta.children.insert(pos, Element::new("contrib-group"));
                    &mut meta.children[pos]
                }
            };
            let contrib = group.push(Element::new("contrib"));
            contrib.set_attr("contrib-type", "author");
            let name = contrib.push(Element::new("name"));
            name.push(Element::with_text("surname", "Unknown"));
            name.push(Element::with_text("given-names", "Author"));
        }
    }

    if let Some(body) = root.find_mut("body") {
        if body.children.is_empty() {
            let sec = body.push(Element::new("sec"));
            sec.push(Element::with_text("p", "Article content not available."));
        }
    }

    if let Some(pub_date) = root.find_mut("front/article-meta/pub-date") {
        if pub_date.find("year").is_none() {
            pub_date.push(Element::with_text("year", Local::now().year().to_string()));
        }
    }

    if root.find("front/article-meta/permissions").is_none() {
        if let Some(meta) = root.find_mut("front/article-meta") {
            push_permissions(meta, journal, &Local::now().year().to_string());
        }
    }
}
