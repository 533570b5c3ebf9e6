//! External schema grammar loading.
//!
//! The publisher schema is a DTD split across a main file and a set of
//! entity modules. This parser expands parameter entities, then collects the
//! `<!ELEMENT ...>` declarations into a table of content models the
//! validator checks the synthesized tree against.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Files the schema directory must contain before validation can run.
pub const REQUIRED_DTD_FILES: [&str; 7] = [
    "journalpublishing.dtd",
    "annotation.ent",
    "articlemeta.ent",
    "backmatter.ent",
    "catalog.ent",
    "common.ent",
    "modules.ent",
];

/// Expansion passes before giving up on cyclic or runaway entities.
const MAX_EXPANSION_PASSES: usize = 50;

#[derive(Debug, Error)]
pub enum DtdError {
    #[error("schema directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("missing required schema files in {dir}: {missing}")]
    MissingFiles { dir: PathBuf, missing: String },
    #[error("failed to read schema file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("schema declares no elements after entity expansion")]
    NoDeclarations,
}

/// Content model of one declared element.
#[derive(Debug, Clone, Default)]
pub struct ContentModel {
    pub allowed_children: HashSet<String>,
    pub allows_text: bool,
    /// `ANY` declarations accept every declared element.
    pub is_any: bool,
    pub is_empty: bool,
}

impl ContentModel {
    pub fn permits_child(&self, name: &str) -> bool {
        self.is_any || self.allowed_children.contains(name)
    }
}

/// The declared-element table for one schema version.
#[derive(Debug, Clone)]
pub struct DtdCatalog {
    models: HashMap<String, ContentModel>,
}

static PARAM_ENTITY_VALUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<!ENTITY\s+%\s+([\w.-]+)\s+"([^"]*)"\s*>"#).unwrap()
});
static PARAM_ENTITY_SYSTEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<!ENTITY\s+%\s+([\w.-]+)\s+(?:PUBLIC\s+"[^"]*"\s+)?SYSTEM\s+"([^"]+)"\s*>"#)
        .unwrap()
});
static PARAM_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"%([\w.-]+);").unwrap());
static ELEMENT_DECL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!ELEMENT\s+([\w.-]+)\s+(.+?)>").unwrap());
static NAME_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z][\w.-]*").unwrap());
static CONDITIONAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!\[\s*(INCLUDE|IGNORE)\s*\[(.*?)\]\]>").unwrap());

impl DtdCatalog {
    /// Load and expand the schema rooted at `dir/journalpublishing.dtd`.
    pub fn load(dir: &Path) -> Result<Self, DtdError> {
        if !dir.is_dir() {
            return Err(DtdError::DirectoryNotFound(dir.to_path_buf()));
        }
        let missing: Vec<&str> = REQUIRED_DTD_FILES
            .iter()
            .copied()
            .filter(|f| !dir.join(f).exists())
            .collect();
        if !missing.is_empty() {
            return Err(DtdError::MissingFiles {
                dir: dir.to_path_buf(),
                missing: missing.join(", "),
            });
        }

        let main = read(dir, "journalpublishing.dtd")?;
        let expanded = expand_entities(&main, dir)?;
        Self::from_source(&expanded)
    }

    /// Parse element declarations from already-expanded DTD text.
    pub fn from_source(source: &str) -> Result<Self, DtdError> {
        let source = resolve_conditionals(source);
        let mut models = HashMap::new();
        for caps in ELEMENT_DECL_RE.captures_iter(&source) {
            let name = caps[1].to_string();
            let model = parse_content_model(&caps[2]);
            models.insert(name, model);
        }
        if models.is_empty() {
            return Err(DtdError::NoDeclarations);
        }
        tracing::debug!(elements = models.len(), "loaded schema element table");
        Ok(Self { models })
    }

    pub fn model(&self, element: &str) -> Option<&ContentModel> {
        self.models.get(element)
    }

    pub fn declares(&self, element: &str) -> bool {
        self.models.contains_key(element)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn read(dir: &Path, file: &str) -> Result<String, DtdError> {
    let path = dir.join(file);
    std::fs::read_to_string(&path).map_err(|source| DtdError::Unreadable { path, source })
}

/// Substitute `%name;` references, splicing in entity module files for
/// SYSTEM entities. Runs to a fixed point within a bounded pass count.
fn expand_entities(source: &str, dir: &Path) -> Result<String, DtdError> {
    let mut text = source.to_string();
    for _ in 0..MAX_EXPANSION_PASSES {
        let mut values: HashMap<String, String> = HashMap::new();
        for caps in PARAM_ENTITY_SYSTEM_RE.captures_iter(&text) {
            let content = read(dir, &caps[2])?;
            values.insert(caps[1].to_string(), content);
        }
        for caps in PARAM_ENTITY_VALUE_RE.captures_iter(&text) {
            // Value entities win over same-named SYSTEM entities, matching
            // declaration-order precedence closely enough for this schema.
            values
                .entry(caps[1].to_string())
                .or_insert_with(|| caps[2].to_string());
        }

        let mut changed = false;
        let replaced = PARAM_REF_RE
            .replace_all(&text, |caps: &regex::Captures<'_>| {
                match values.get(&caps[1]) {
                    Some(value) => {
                        changed = true;
                        value.clone()
                    }
                    None => caps[0].to_string(),
                }
            })
            .into_owned();
        text = replaced;
        if !changed {
            break;
        }
    }
    Ok(text)
}

/// Keep INCLUDE sections, drop IGNORE sections.
fn resolve_conditionals(source: &str) -> String {
    let mut text = source.to_string();
    for _ in 0..MAX_EXPANSION_PASSES {
        if !CONDITIONAL_RE.is_match(&text) {
            break;
        }
        text = CONDITIONAL_RE
            .replace_all(&text, |caps: &regex::Captures<'_>| {
                if &caps[1] == "INCLUDE" {
                    caps[2].to_string()
                } else {
                    String::new()
                }
            })
            .into_owned();
    }
    text
}

fn parse_content_model(model: &str) -> ContentModel {
    let model = model.trim();
    if model.eq_ignore_ascii_case("EMPTY") {
        return ContentModel {
            is_empty: true,
            ..ContentModel::default()
        };
    }
    if model.eq_ignore_ascii_case("ANY") {
        return ContentModel {
            is_any: true,
            allows_text: true,
            ..ContentModel::default()
        };
    }

    let allows_text = model.contains("#PCDATA");
    let allowed_children = NAME_TOKEN_RE
        .find_iter(model)
        .map(|m| m.as_str().to_string())
        .filter(|n| n != "EMPTY" && n != "ANY" && n != "PCDATA")
        .collect();
    ContentModel {
        allowed_children,
        allows_text,
        is_any: false,
        is_empty: false,
    }
}
