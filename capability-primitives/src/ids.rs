//! Remote tool identifier.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

const SEPARATOR: char = ':';

/// Globally unique tool identity: `backendId:toolName`.
///
/// Two backends exposing a tool with the same bare name still produce two
/// distinct identifiers.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolId {
    backend_id: String,
    tool_name: String,
}

impl ToolId {
    /// Creates an identifier from the owning backend id and the bare tool name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToolId`] when either part is empty or the backend
    /// id contains the `:` separator.
    pub fn new(backend_id: impl Into<String>, tool_name: impl Into<String>) -> crate::Result<Self> {
        let backend_id = backend_id.into();
        let tool_name = tool_name.into();

        if backend_id.is_empty() || tool_name.is_empty() {
            return Err(Error::InvalidToolId {
                id: format!("{backend_id}{SEPARATOR}{tool_name}"),
                reason: "backend id and tool name must be non-empty".into(),
            });
        }
        if backend_id.contains(SEPARATOR) {
            return Err(Error::InvalidToolId {
                id: format!("{backend_id}{SEPARATOR}{tool_name}"),
                reason: format!("backend id cannot contain `{SEPARATOR}`"),
            });
        }

        Ok(Self {
            backend_id,
            tool_name,
        })
    }

    /// Returns the owning backend identifier.
    #[must_use]
    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    /// Returns the bare tool name.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }
}

impl Display for ToolId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.backend_id, self.tool_name)
    }
}

impl FromStr for ToolId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((backend_id, tool_name)) = s.split_once(SEPARATOR) else {
            return Err(Error::InvalidToolId {
                id: s.into(),
                reason: format!("expected `backend{SEPARATOR}tool`"),
            });
        };
        Self::new(backend_id, tool_name)
    }
}

impl TryFrom<String> for ToolId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ToolId> for String {
    fn from(value: ToolId) -> Self {
        value.to_string()
    }
}
