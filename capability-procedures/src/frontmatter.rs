//! `---`-delimited YAML header plus free-text body.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{CatalogError, CatalogResult};

const DELIMITER: &str = "---";

/// A document split into its structured header and body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    header: Map<String, Value>,
    body: String,
}

impl Document {
    /// Splits `text` into header and body.
    ///
    /// Text that does not open with a `---` line has an empty header and is
    /// returned whole as the body. The header must be a YAML mapping.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Header`] when the header is unterminated, is
    /// not valid YAML, or is not a mapping.
    pub fn parse(path: &Path, text: &str) -> CatalogResult<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let Some((yaml, body)) = split(text) else {
            return Ok(Self {
                header: Map::new(),
                body: text.to_owned(),
            });
        };
        let yaml = yaml.ok_or_else(|| CatalogError::header(path, "unterminated front matter"))?;

        let parsed: serde_yaml::Value = serde_yaml::from_str(yaml)
            .map_err(|err| CatalogError::header(path, err.to_string()))?;
        let header = match serde_json::to_value(parsed)
            .map_err(|err| CatalogError::header(path, err.to_string()))?
        {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => return Err(CatalogError::header(path, "front matter must be a mapping")),
        };

        Ok(Self {
            header,
            body: body.to_owned(),
        })
    }

    /// Header fields as JSON values.
    #[must_use]
    pub fn header(&self) -> &Map<String, Value> {
        &self.header
    }

    /// Body text following the header.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns a header field when it is a non-blank string.
    #[must_use]
    pub fn required_str(&self, key: &str) -> Option<&str> {
        self.header
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Consumes the document, returning header and body.
    #[must_use]
    pub fn into_parts(self) -> (Map<String, Value>, String) {
        (self.header, self.body)
    }
}

/// `None` when there is no front matter; `Some((None, _))` when the opening
/// delimiter is never closed.
fn split(text: &str) -> Option<(Option<&str>, &str)> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != DELIMITER {
        return None;
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            let yaml = &text[yaml_start..offset];
            let body = &text[offset + line.len()..];
            return Some((Some(yaml), body));
        }
        offset += line.len();
    }
    Some((None, text))
}
