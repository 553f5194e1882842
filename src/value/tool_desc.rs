use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Describes a tool the chat model can invoke: its unique name, what it does,
/// and the JSON Schema of its expected parameters, following the schema
/// conventions used by the OpenAI-style tool-calling APIs.
///
/// Use [`ToolDescBuilder`] for fluent construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDesc {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema of the expected parameters, typically an object schema
    /// such as `{ "type": "object", "properties": ... }`.
    pub parameters: Value,

    /// Optional return-value schema. If omitted, the tool is assumed to
    /// return free-form text or JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<Value>,
}

impl fmt::Display for ToolDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "ToolDesc {}", s)
    }
}

/// Fluent builder for [`ToolDesc`]. Parameters default to `Value::Null`.
#[derive(Clone, Debug)]
pub struct ToolDescBuilder {
    name: String,
    description: Option<String>,
    parameters: Option<Value>,
    returns: Option<Value>,
}

impl ToolDescBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: None,
            returns: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn returns(mut self, returns: Value) -> Self {
        self.returns = Some(returns);
        self
    }

    pub fn build(self) -> ToolDesc {
        ToolDesc {
            name: self.name,
            description: self.description,
            parameters: self.parameters.unwrap_or(Value::Null),
            returns: self.returns,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn builder_produces_expected_desc() {
        let desc = ToolDescBuilder::new("bank_lookup")
            .description("Look up a bank by FDIC certificate number")
            .parameters(json!({
                "type": "object",
                "properties": {
                    "cert": { "type": "string", "description": "FDIC certificate number" }
                },
                "required": ["cert"]
            }))
            .build();
        assert_eq!(desc.name, "bank_lookup");
        assert!(desc.description.is_some());
        assert_eq!(desc.parameters["required"][0], "cert");
        assert!(desc.returns.is_none());
    }
}
