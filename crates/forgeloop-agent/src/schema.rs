use serde_json::{json, Map, Value};

/// Kind of a single response field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text
    String,
    /// One of a fixed set of labels
    Enum(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub kind: FieldKind,
    pub description: Option<String>,
}

/// Target shape for a structured generation call.
///
/// Every field is required and no other fields are allowed. Providers render
/// this into their own schema dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSchema {
    pub name: String,
    pub fields: Vec<SchemaField>,
}

impl ResponseSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn string_field(mut self, name: &str, description: &str) -> Self {
        self.fields.push(SchemaField {
            name: name.to_string(),
            kind: FieldKind::String,
            description: Some(description.to_string()),
        });
        self
    }

    pub fn enum_field(mut self, name: &str, variants: &[&str], description: &str) -> Self {
        self.fields.push(SchemaField {
            name: name.to_string(),
            kind: FieldKind::Enum(variants.iter().map(|v| v.to_string()).collect()),
            description: Some(description.to_string()),
        });
        self
    }

    fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Standard JSON Schema (used by OpenAI-compatible `json_schema` mode)
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = match &field.kind {
                FieldKind::String => json!({ "type": "string" }),
                FieldKind::Enum(variants) => json!({ "type": "string", "enum": variants }),
            };
            if let Some(desc) = &field.description {
                prop["description"] = json!(desc);
            }
            properties.insert(field.name.clone(), prop);
        }

        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": properties,
            "required": self.field_names(),
        })
    }

    /// OpenAPI-subset schema accepted by Gemini's `responseSchema`
    pub fn to_gemini_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = match &field.kind {
                FieldKind::String => json!({ "type": "STRING" }),
                FieldKind::Enum(variants) => {
                    json!({ "type": "STRING", "format": "enum", "enum": variants })
                }
            };
            if let Some(desc) = &field.description {
                prop["description"] = json!(desc);
            }
            properties.insert(field.name.clone(), prop);
        }

        json!({
            "type": "OBJECT",
            "properties": properties,
            "required": self.field_names(),
            "propertyOrdering": self.field_names(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict_schema() -> ResponseSchema {
        ResponseSchema::new("verdict")
            .enum_field("decision", &["WORKS", "RETHINK"], "The verdict")
            .string_field("explanation", "Why")
    }

    #[test]
    fn test_json_schema_is_closed_and_fully_required() {
        let schema = verdict_schema().to_json_schema();
        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(schema["required"], json!(["decision", "explanation"]));
        assert_eq!(
            schema["properties"]["decision"]["enum"],
            json!(["WORKS", "RETHINK"])
        );
    }

    #[test]
    fn test_gemini_schema_uses_enum_format() {
        let schema = verdict_schema().to_gemini_schema();
        assert_eq!(schema["type"], json!("OBJECT"));
        assert_eq!(schema["properties"]["decision"]["format"], json!("enum"));
        assert_eq!(schema["properties"]["explanation"]["type"], json!("STRING"));
        assert_eq!(schema["propertyOrdering"], json!(["decision", "explanation"]));
    }
}
