//! Capability names and the detail records exposed to callers.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

const MAX_NAME_LEN: usize = 256;

/// Name under which a capability is listed, described, and executed.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CapabilityName(String);

impl CapabilityName {
    /// Creates a capability name after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapabilityName`] if the name is blank, too long,
    /// or contains control characters.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CapabilityName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CapabilityName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CapabilityName> for String {
    fn from(value: CapabilityName) -> Self {
        value.0
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidCapabilityName {
            name: name.into(),
            reason: "name cannot be empty".into(),
        });
    }

    if name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidCapabilityName {
            name: name.into(),
            reason: format!("name length must be <= {MAX_NAME_LEN}"),
        });
    }

    if name.chars().any(char::is_control) {
        return Err(Error::InvalidCapabilityName {
            name: name.into(),
            reason: "name cannot contain control characters".into(),
        });
    }

    Ok(())
}

/// Closed set of implementation kinds behind a capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    /// Locally documented procedure.
    Skill,
    /// Tool hosted by a remote backend.
    Tool,
    /// Sandboxed code execution.
    Code,
}

impl Display for CapabilityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Skill => "skill",
            Self::Tool => "tool",
            Self::Code => "code",
        })
    }
}

/// Interpreted languages accepted by the code runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    /// Python 3 via `python3`.
    Python,
    /// JavaScript via `node`.
    Nodejs,
}

impl CodeLanguage {
    /// Every supported language, in resolution order.
    pub const ALL: [Self; 2] = [Self::Python, Self::Nodejs];

    /// Maps a pseudo-capability name (`execute-python`, `execute-nodejs`) to
    /// its language.
    #[must_use]
    pub fn from_capability_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|language| language.capability_name() == name)
    }

    /// Name of the pseudo-capability that runs this language.
    #[must_use]
    pub const fn capability_name(self) -> &'static str {
        match self {
            Self::Python => "execute-python",
            Self::Nodejs => "execute-nodejs",
        }
    }

    /// Description advertised for the pseudo-capability.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Python => "Execute Python code and return result",
            Self::Nodejs => "Execute Node.js code and return result",
        }
    }

    /// Default interpreter executable.
    #[must_use]
    pub const fn interpreter(self) -> &'static str {
        match self {
            Self::Python => "python3",
            Self::Nodejs => "node",
        }
    }

    /// File extension used for scratch source files, including the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Python => ".py",
            Self::Nodejs => ".js",
        }
    }

    /// Lower-case language label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Nodejs => "nodejs",
        }
    }
}

impl Display for CodeLanguage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full description of a local procedure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDetail {
    /// Procedure name from the document header.
    pub name: String,
    /// Procedure description from the document header.
    pub description: String,
    /// Body text following the header.
    pub content: String,
    /// Reference documents next to the procedure, if the directory exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<String>>,
    /// Helper scripts next to the procedure, if the directory exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts: Option<Vec<String>>,
    /// Asset files next to the procedure, if the directory exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<Vec<String>>,
}

/// Schema and ownership of a remote tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDetail {
    /// Bare tool name as reported by the backend.
    pub name: String,
    /// Tool description as reported by the backend.
    pub description: String,
    /// JSON schema of the tool arguments.
    pub input_schema: Value,
    /// Identifier of the backend that owns the tool.
    pub mcp_id: String,
}

/// Description of a code-execution pseudo-capability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDetail {
    /// Pseudo-capability name.
    pub name: String,
    /// Fixed description.
    pub description: String,
    /// Language executed by the capability.
    pub language: CodeLanguage,
}

impl From<CodeLanguage> for CodeDetail {
    fn from(language: CodeLanguage) -> Self {
        Self {
            name: language.capability_name().to_owned(),
            description: language.description().to_owned(),
            language,
        }
    }
}

/// Detail record returned by `describe`, tagged by implementation kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "implementation", rename_all = "lowercase")]
pub enum CapabilityDetail {
    /// Local procedure with its full content.
    Skill(SkillDetail),
    /// Remote tool with its schema.
    Tool(ToolDetail),
    /// Code-execution pseudo-capability.
    Code(CodeDetail),
}

impl CapabilityDetail {
    /// Returns the implementation kind.
    #[must_use]
    pub const fn kind(&self) -> CapabilityKind {
        match self {
            Self::Skill(_) => CapabilityKind::Skill,
            Self::Tool(_) => CapabilityKind::Tool,
            Self::Code(_) => CapabilityKind::Code,
        }
    }

    /// Returns the capability name carried by the record.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Skill(detail) => &detail.name,
            Self::Tool(detail) => &detail.name,
            Self::Code(detail) => &detail.name,
        }
    }
}
