//! Markdown catalog handed to agents by `list_capabilities`.

use std::collections::HashMap;
use std::fmt::Write as _;

use capability_procedures::ProcedureMetadata;
use capability_remote::ToolDescriptor;
use serde::Serialize;

const PREAMBLE: &str = "# Capability

## Usage

When users ask you to perform tasks, check whether any of the capabilities below can help complete the task more effectively. Capabilities provide specialized actions and domain knowledge.

How to use capabilities:
- Get details: POST /capability with { \"capabilities\": [\"code-reviewer\", \"amap-search\"] }
- Execute: POST /execute with { \"capabilities\": [{\"name\": \"code-reviewer\", \"input\": {...}}, {\"name\": \"amap-search\", \"input\": {...}}] }

Usage notes:
- Only use capabilities listed below
- Each capability invocation is stateless

## Available Capabilities

";

/// One line of the listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    /// Name a caller uses to describe or execute the capability.
    pub name: String,
    /// Human-readable description.
    pub description: String,
}

/// Listing name for every tool: the bare name when no other tool shares it
/// and it is not in `reserved`, the qualified `backendId:toolName`
/// otherwise.
#[must_use]
pub fn tool_entries(tools: &[ToolDescriptor], reserved: &[&str]) -> Vec<ListingEntry> {
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for tool in tools {
        *occurrences.entry(tool.name()).or_default() += 1;
    }

    tools
        .iter()
        .map(|tool| {
            let unique = occurrences.get(tool.name()).copied() == Some(1)
                && !reserved.iter().any(|name| *name == tool.name());
            let name = if unique {
                tool.name().to_owned()
            } else {
                tool.id().to_string()
            };
            ListingEntry {
                name,
                description: tool.description().to_owned(),
            }
        })
        .collect()
}

/// Procedure entries in catalog order.
#[must_use]
pub fn procedure_entries(procedures: &[ProcedureMetadata]) -> Vec<ListingEntry> {
    procedures
        .iter()
        .map(|procedure| ListingEntry {
            name: procedure.name().to_owned(),
            description: procedure.description().to_owned(),
        })
        .collect()
}

/// Renders the usage preamble followed by one `- name:` block per entry.
#[must_use]
pub fn render(entries: &[ListingEntry]) -> String {
    let mut markdown = String::from(PREAMBLE);
    for entry in entries {
        let _ = writeln!(markdown, "- name: {}", entry.name);
        let _ = writeln!(markdown, "  description: {}\n", entry.description);
    }
    markdown
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn tool(backend: &str, name: &str, description: &str) -> ToolDescriptor {
        ToolDescriptor::new(backend, name, description, json!({})).unwrap()
    }

    #[test]
    fn shared_tool_names_are_qualified() {
        let tools = [
            tool("docs", "search", "Docs search"),
            tool("web", "search", "Web search"),
            tool("web", "fetch", "Fetch a page"),
        ];
        let names: Vec<String> = tool_entries(&tools, &[]).into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["docs:search", "web:search", "fetch"]);
    }

    #[test]
    fn reserved_names_are_qualified() {
        let tools = [tool("web", "fetch", "Fetch a page")];
        let entries = tool_entries(&tools, &["fetch"]);
        assert_eq!(entries[0].name, "web:fetch");
    }

    #[test]
    fn render_lists_every_entry() {
        let entries = [
            ListingEntry {
                name: "code-reviewer".into(),
                description: "Reviews code".into(),
            },
            ListingEntry {
                name: "search".into(),
                description: "Web search".into(),
            },
        ];
        let markdown = render(&entries);
        assert!(markdown.starts_with("# Capability\n"));
        assert!(markdown.contains("- name: code-reviewer\n  description: Reviews code\n\n"));
        assert!(markdown.contains("- name: search\n  description: Web search\n\n"));
        assert_eq!(markdown.matches("- name:").count(), 2);
    }
}
