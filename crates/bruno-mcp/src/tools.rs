//! Bruno Tool Definitions
//!
//! The static catalogue returned by `tools/list`. Schemas are descriptive
//! only; the handlers do their own presence and type checks.

use serde_json::{json, Value};

use crate::protocol::{Schema, Tool};

pub const WORKSPACE_REGISTER: &str = "workspace.register";
pub const WORKSPACE_GET: &str = "workspace.get";
pub const WORKSPACE_LIST: &str = "workspace.list";
pub const COLLECTIONS_LIST: &str = "collections.list";
pub const COLLECTIONS_CREATE: &str = "collections.create";
pub const REQUESTS_LIST: &str = "requests.list";

fn schema(properties: Value, required: Vec<&str>) -> Schema {
    let props = properties.as_object().cloned().unwrap_or_default();
    Schema {
        schema_type: "object".to_string(),
        properties: props,
        required: required.into_iter().map(|s| s.to_string()).collect(),
    }
}

/// Create a tool definition with the given name, description, and schemas
fn tool(name: &str, description: &str, input: Schema, output: Schema) -> Tool {
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: input,
        output_schema: output,
    }
}

fn workspace_schema() -> Schema {
    schema(
        json!({
            "name": { "type": "string" },
            "path": { "type": "string" }
        }),
        vec![],
    )
}

/// Get all available tools
pub fn all_tools() -> Vec<Tool> {
    vec![
        tool(
            WORKSPACE_REGISTER,
            "Register a workspace: a named absolute directory that other tools refer to by name. Registering the same name and path again is a no-op; set createIfMissing to create the directory.",
            schema(
                json!({
                    "name": {
                        "type": "string",
                        "description": "Workspace name: letters, digits, '.', '_' or '-', starting with a letter or digit"
                    },
                    "path": {
                        "type": "string",
                        "description": "Absolute directory path"
                    },
                    "createIfMissing": {
                        "type": "boolean",
                        "description": "Create the directory (and parents) if it does not exist"
                    }
                }),
                vec!["name", "path"],
            ),
            workspace_schema(),
        ),
        tool(
            WORKSPACE_GET,
            "Look up a registered workspace by name.",
            schema(
                json!({
                    "name": { "type": "string", "description": "Workspace name" }
                }),
                vec!["name"],
            ),
            workspace_schema(),
        ),
        tool(
            WORKSPACE_LIST,
            "List all registered workspaces, sorted by name.",
            schema(json!({}), vec![]),
            schema(
                json!({
                    "workspaces": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "path": { "type": "string" }
                            }
                        }
                    }
                }),
                vec![],
            ),
        ),
        tool(
            COLLECTIONS_LIST,
            "List Bruno collections (directories with a bruno.json) in a workspace.",
            schema(
                json!({
                    "workspace": { "type": "string", "description": "Workspace name" }
                }),
                vec!["workspace"],
            ),
            schema(
                json!({
                    "workspace": { "type": "string" },
                    "collections": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                }),
                vec![],
            ),
        ),
        tool(
            COLLECTIONS_CREATE,
            "Create a Bruno collection in a workspace: a directory with a bruno.json descriptor and an empty collection.bru.",
            schema(
                json!({
                    "workspace": { "type": "string", "description": "Workspace name" },
                    "name": { "type": "string", "description": "Collection name (single path segment)" },
                    "overwrite": {
                        "type": "boolean",
                        "description": "Reuse an existing directory, replacing any bruno.json in it"
                    },
                    "ignore": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Entries for the descriptor's ignore list (default: .git, node_modules)"
                    }
                }),
                vec!["workspace", "name"],
            ),
            schema(
                json!({
                    "workspace": { "type": "string" },
                    "collection": { "type": "string" },
                    "path": { "type": "string" }
                }),
                vec![],
            ),
        ),
        tool(
            REQUESTS_LIST,
            "List request files (.bru) in a collection, relative to the collection root.",
            schema(
                json!({
                    "workspace": { "type": "string", "description": "Workspace name" },
                    "collection": { "type": "string", "description": "Collection name" }
                }),
                vec!["workspace", "collection"],
            ),
            schema(
                json!({
                    "workspace": { "type": "string" },
                    "collection": { "type": "string" },
                    "requests": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                }),
                vec![],
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalogue_names_unique() {
        let tools = all_tools();
        let names: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), tools.len());
        for name in [
            WORKSPACE_REGISTER,
            WORKSPACE_GET,
            WORKSPACE_LIST,
            COLLECTIONS_LIST,
            COLLECTIONS_CREATE,
            REQUESTS_LIST,
        ] {
            assert!(names.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_required_fields_are_declared() {
        for tool in all_tools() {
            for required in &tool.input_schema.required {
                assert!(
                    tool.input_schema.properties.contains_key(required),
                    "{} requires undeclared {}",
                    tool.name,
                    required
                );
            }
        }
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(&all_tools()[0]).unwrap();
        assert!(value.get("inputSchema").is_some());
        assert!(value.get("outputSchema").is_some());
        assert_eq!(value["inputSchema"]["type"], "object");
    }
}
