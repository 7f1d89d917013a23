//! Locally documented procedures.
//!
//! Each procedure lives in `<root>/skills/<folder>/SKILL.md`: a YAML header
//! carrying at least `name` and `description`, followed by free text. The
//! [`ProcedureCatalog`] keeps only the headers in memory and reads bodies and
//! side files (`references/`, `scripts/`, `assets/`) on demand.

#![warn(missing_docs, clippy::pedantic)]

pub mod catalog;
pub mod error;
pub mod frontmatter;
pub mod scanner;

pub use catalog::{ProcedureCatalog, ProcedureContent, ProcedureMetadata};
pub use error::{CatalogError, CatalogResult};
pub use frontmatter::Document;
pub use scanner::SideFiles;
