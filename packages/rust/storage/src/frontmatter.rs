//! YAML front-matter split/join for component files.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use pluqqy_shared::{PluqqyError, Result};

const DELIMITER: &str = "---";

/// Front-matter fields. Keys other than `tags` are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl FrontMatter {
    fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.extra.is_empty()
    }
}

/// A component file split into metadata and composable body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub front: FrontMatter,
    pub body: String,
}

/// Split `text` into front-matter and body.
///
/// Text without a leading `---` line is all body. An opening delimiter with no
/// closing one is also treated as body.
pub fn parse(text: &str, path: &Path) -> Result<Document> {
    let Some((yaml, body)) = split(text) else {
        return Ok(Document {
            front: FrontMatter::default(),
            body: text.to_string(),
        });
    };

    let front = if yaml.trim().is_empty() {
        FrontMatter::default()
    } else {
        serde_yaml::from_str(yaml).map_err(|e| PluqqyError::yaml(path, e))?
    };

    Ok(Document {
        front,
        body: body.to_string(),
    })
}

/// Strip front-matter without parsing it.
pub fn strip(text: &str) -> &str {
    split(text).map(|(_, body)| body).unwrap_or(text)
}

/// Serialize a document back to file text.
pub fn render(doc: &Document, path: &Path) -> Result<String> {
    if doc.front.is_empty() {
        return Ok(doc.body.clone());
    }
    let yaml = serde_yaml::to_string(&doc.front).map_err(|e| PluqqyError::yaml(path, e))?;
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{}", doc.body))
}

fn split(text: &str) -> Option<(&str, &str)> {
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}
