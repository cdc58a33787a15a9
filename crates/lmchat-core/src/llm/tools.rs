use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A function schema advertised to the model. Tools are never executed; a
/// model asking for one only changes how the turn is reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    pub fn to_openai(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Schemas sent when tool use is enabled.
pub fn builtin_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "get_current_time",
            "Get the current local date and time",
            serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        ),
        ToolDefinition::new(
            "list_attachments",
            "List the names of files and images attached to this conversation",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "kind": {
                        "type": "string",
                        "enum": ["files", "images", "all"],
                        "description": "Which attachments to list"
                    }
                },
                "required": []
            }),
        ),
    ]
}
