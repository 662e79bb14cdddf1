//! Props schema validation
//!
//! Each component declares the attributes it accepts. Validation coerces
//! string attribute values into the declared types, fills defaults and rejects
//! whatever does not fit. Attribute names match case-insensitively because the
//! HTML front end lowercases them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Props = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Boolean,
    Number,
    Integer,
    Object,
    Array,
    Any,
}

impl FieldType {
    fn describe(&self) -> &'static str {
        match self {
            FieldType::String => "a string",
            FieldType::Boolean => "a boolean",
            FieldType::Number => "a number",
            FieldType::Integer => "an integer",
            FieldType::Object => "an object",
            FieldType::Array => "an array",
            FieldType::Any => "any value",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub choices: Vec<String>,
}

impl FieldSchema {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            required: false,
            default: None,
            choices: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn choices(mut self, choices: &[&str]) -> Self {
        self.choices = choices.iter().map(|c| c.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropsSchema {
    pub fields: Vec<FieldSchema>,
    /// Pass unknown attributes through instead of rejecting them.
    #[serde(default)]
    pub permissive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub attribute: String,
    pub constraint: String,
}

impl SchemaViolation {
    fn new(attribute: &str, constraint: impl Into<String>) -> Self {
        Self {
            attribute: attribute.to_string(),
            constraint: constraint.into(),
        }
    }
}

impl PropsSchema {
    pub fn strict() -> Self {
        Self {
            fields: Vec::new(),
            permissive: false,
        }
    }

    pub fn permissive() -> Self {
        Self {
            fields: Vec::new(),
            permissive: true,
        }
    }

    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    pub fn find(&self, name: &str) -> Option<&FieldSchema> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Validate and coerce `props`. Keys come back under their declared names.
    pub fn validate(&self, props: Props) -> Result<Props, SchemaViolation> {
        let mut out = Props::new();

        for (key, value) in props {
            match self.find(&key) {
                Some(field) => {
                    let coerced = coerce(field, value)?;
                    out.insert(field.name.clone(), coerced);
                }
                None if self.permissive => {
                    out.insert(key, value);
                }
                None => {
                    return Err(SchemaViolation::new(&key, "is not a known attribute"));
                }
            }
        }

        for field in &self.fields {
            if out.contains_key(&field.name) {
                continue;
            }
            if let Some(default) = &field.default {
                out.insert(field.name.clone(), default.clone());
            } else if field.required {
                return Err(SchemaViolation::new(&field.name, "is required"));
            }
        }

        Ok(out)
    }
}

fn coerce(field: &FieldSchema, value: Value) -> Result<Value, SchemaViolation> {
    let mismatch = || {
        SchemaViolation::new(
            &field.name,
            format!("must be {}", field.field_type.describe()),
        )
    };

    let value = match (field.field_type, value) {
        (FieldType::Any, v) => v,
        (FieldType::String, Value::String(s)) => Value::String(s),
        (FieldType::String, v @ (Value::Number(_) | Value::Bool(_))) => {
            Value::String(v.to_string())
        }
        (FieldType::Boolean, Value::Bool(b)) => Value::Bool(b),
        (FieldType::Boolean, Value::String(s)) => match s.trim() {
            // Bare attribute (`<Reasoning show/>`) arrives as an empty string.
            "" | "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(mismatch()),
        },
        (FieldType::Number, Value::Number(n)) => Value::Number(n),
        (FieldType::Number, Value::String(s)) => parse_number(&s).ok_or_else(mismatch)?,
        (FieldType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Value::Number(n),
        (FieldType::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| mismatch())?,
        (FieldType::Object, v @ Value::Object(_)) => v,
        (FieldType::Array, v @ Value::Array(_)) => v,
        (FieldType::Object | FieldType::Array, Value::String(s)) => {
            let parsed: Value = serde_json::from_str(&s).map_err(|_| mismatch())?;
            match (field.field_type, &parsed) {
                (FieldType::Object, Value::Object(_)) | (FieldType::Array, Value::Array(_)) => {
                    parsed
                }
                _ => return Err(mismatch()),
            }
        }
        _ => return Err(mismatch()),
    };

    if !field.choices.is_empty() {
        let matches = value
            .as_str()
            .map(|s| field.choices.iter().any(|c| c == s))
            .unwrap_or(false);
        if !matches {
            return Err(SchemaViolation::new(
                &field.name,
                format!("must be one of: {}", field.choices.join(", ")),
            ));
        }
    }

    Ok(value)
}

fn parse_number(s: &str) -> Option<Value> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    let f = s.parse::<f64>().ok()?;
    serde_json::Number::from_f64(f).map(Value::Number)
}
