//! Parameter specifications and validation.
//!
//! A [`ParameterSpec`] list is derived once from a request model's JSON
//! schema (field order preserved) and is shared by methods and tools.
//! [`validate_parameters`] checks a raw JSON object against such a list.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use schemars::schema::{InstanceType, RootSchema, Schema, SchemaObject, SingleOrVec};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// No type constraint.
    Any,
}

impl ParameterType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        }
    }
}

/// Schema for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub param_type: ParameterType,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub description: Option<String>,

    /// Applied when the parameter is absent.
    #[serde(default)]
    pub default: Option<Value>,

    #[serde(default)]
    pub min_value: Option<f64>,

    #[serde(default)]
    pub max_value: Option<f64>,

    /// Minimum string length or array size.
    #[serde(default)]
    pub min_length: Option<usize>,

    /// Maximum string length or array size.
    #[serde(default)]
    pub max_length: Option<usize>,

    #[serde(rename = "enum", default)]
    pub enum_values: Option<Vec<Value>>,

    /// Regex the string value must match.
    #[serde(default)]
    pub pattern: Option<String>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            description: None,
            default: None,
            min_value: None,
            max_value: None,
            min_length: None,
            max_length: None,
            enum_values: None,
            pattern: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_value = min;
        self.max_value = max;
        self
    }

    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Check one present value, pushing every violation into `errors`.
    fn check(&self, value: &Value, errors: &mut ValidationError) {
        if value.is_null() {
            if self.required {
                errors.push(&self.name, "must not be null");
            }
            return;
        }

        if !self.param_type.matches(value) {
            errors.push(&self.name, format!("expected {}", self.param_type.as_str()));
            return;
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.min_value {
                if n < min {
                    errors.push(&self.name, format!("must be >= {}", min));
                }
            }
            if let Some(max) = self.max_value {
                if n > max {
                    errors.push(&self.name, format!("must be <= {}", max));
                }
            }
        }

        let length = match value {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            _ => None,
        };
        if let Some(len) = length {
            if let Some(min) = self.min_length {
                if len < min {
                    errors.push(&self.name, format!("length must be >= {}", min));
                }
            }
            if let Some(max) = self.max_length {
                if len > max {
                    errors.push(&self.name, format!("length must be <= {}", max));
                }
            }
        }

        if let Some(allowed) = &self.enum_values {
            if !allowed.contains(value) {
                errors.push(&self.name, format!("must be one of {}", Value::Array(allowed.clone())));
            }
        }

        if let (Some(pattern), Some(text)) = (&self.pattern, value.as_str()) {
            match compiled(pattern) {
                Some(re) if !re.is_match(text) => {
                    errors.push(&self.name, format!("must match pattern '{}'", pattern));
                }
                None => errors.push(&self.name, format!("invalid pattern '{}'", pattern)),
                _ => {}
            }
        }
    }
}

static PATTERN_CACHE: Lazy<Mutex<HashMap<String, Option<Regex>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn compiled(pattern: &str) -> Option<Regex> {
    let mut cache = PATTERN_CACHE.lock();
    cache
        .entry(pattern.to_string())
        .or_insert_with(|| Regex::new(pattern).ok())
        .clone()
}

/// Parameters that passed validation, with declared defaults applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidatedParams(Map<String, Value>);

impl ValidatedParams {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Validate a raw JSON object against `specs`.
///
/// Unknown parameter names are rejected. Absent optional parameters receive
/// their declared default.
pub fn validate_parameters(specs: &[ParameterSpec], raw: &Value) -> Result<ValidatedParams, ValidationError> {
    let input = match raw {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        Value::String(s) => match serde_json::from_str::<Map<String, Value>>(s) {
            Ok(map) => map,
            Err(e) => {
                return Err(ValidationError::single(
                    "$",
                    format!("failed to parse arguments as JSON: {}", e),
                ))
            }
        },
        _ => return Err(ValidationError::single("$", "arguments must be a JSON object")),
    };

    let mut errors = ValidationError::new();
    let mut output = Map::new();

    for spec in specs {
        match input.get(&spec.name) {
            Some(value) => {
                spec.check(value, &mut errors);
                output.insert(spec.name.clone(), value.clone());
            }
            None if spec.required => errors.push(&spec.name, "is required"),
            None => {
                if let Some(default) = &spec.default {
                    output.insert(spec.name.clone(), default.clone());
                }
            }
        }
    }

    for key in input.keys() {
        if !specs.iter().any(|s| &s.name == key) {
            errors.push(key, "unknown parameter");
        }
    }

    errors.into_result().map(|_| ValidatedParams(output))
}

/// Derive the parameter list of a request model from its JSON schema.
pub fn parameters_of<T: JsonSchema>() -> Vec<ParameterSpec> {
    let root = schemars::schema_for!(T);
    parameters_from_schema(&root)
}

/// Derive parameters from an already generated root schema.
pub fn parameters_from_schema(root: &RootSchema) -> Vec<ParameterSpec> {
    let Some(object) = root.schema.object.as_ref() else {
        return Vec::new();
    };

    object
        .properties
        .iter()
        .map(|(name, schema)| {
            let resolved = resolve(root, schema);
            let mut spec = ParameterSpec::new(name.clone(), instance_type(&resolved));
            spec.required = object.required.contains(name);

            if let Some(meta) = resolved.metadata.as_ref() {
                spec.description = meta.description.clone();
                spec.default = meta.default.clone();
            }
            if let Some(number) = resolved.number.as_ref() {
                spec.min_value = number.minimum;
                spec.max_value = number.maximum;
            }
            if let Some(string) = resolved.string.as_ref() {
                spec.min_length = string.min_length.map(|n| n as usize);
                spec.max_length = string.max_length.map(|n| n as usize);
                spec.pattern = string.pattern.clone();
            }
            if let Some(array) = resolved.array.as_ref() {
                spec.min_length = array.min_items.map(|n| n as usize);
                spec.max_length = array.max_items.map(|n| n as usize);
            }
            spec.enum_values = resolved.enum_values.clone();
            spec
        })
        .collect()
}

/// Follow `$ref` and single-member `anyOf`/`allOf` wrappers (Option<Enum>,
/// documented references) down to the schema carrying the constraints.
fn resolve(root: &RootSchema, schema: &Schema) -> SchemaObject {
    let Schema::Object(object) = schema else {
        return SchemaObject::default();
    };

    if let Some(reference) = &object.reference {
        let name = reference.trim_start_matches("#/definitions/");
        if let Some(target) = root.definitions.get(name) {
            let mut resolved = resolve(root, target);
            if object.metadata.is_some() {
                resolved.metadata = object.metadata.clone();
            }
            return resolved;
        }
    }

    if let Some(sub) = object.subschemas.as_ref() {
        let candidates = sub.any_of.as_ref().or(sub.all_of.as_ref()).or(sub.one_of.as_ref());
        if let Some(candidates) = candidates {
            let non_null: Vec<&Schema> = candidates.iter().filter(|s| !is_null_schema(s)).collect();
            if non_null.len() == 1 {
                let mut resolved = resolve(root, non_null[0]);
                if object.metadata.is_some() {
                    resolved.metadata = object.metadata.clone();
                }
                return resolved;
            }
        }
    }

    object.clone()
}

fn is_null_schema(schema: &Schema) -> bool {
    match schema {
        Schema::Object(o) => matches!(
            &o.instance_type,
            Some(SingleOrVec::Single(t)) if **t == InstanceType::Null
        ),
        Schema::Bool(_) => false,
    }
}

fn instance_type(schema: &SchemaObject) -> ParameterType {
    let primary = match &schema.instance_type {
        Some(SingleOrVec::Single(t)) => Some(**t),
        Some(SingleOrVec::Vec(types)) => types.iter().copied().find(|t| *t != InstanceType::Null),
        None => None,
    };
    match primary {
        Some(InstanceType::String) => ParameterType::String,
        Some(InstanceType::Integer) => ParameterType::Integer,
        Some(InstanceType::Number) => ParameterType::Number,
        Some(InstanceType::Boolean) => ParameterType::Boolean,
        Some(InstanceType::Array) => ParameterType::Array,
        Some(InstanceType::Object) => ParameterType::Object,
        Some(InstanceType::Null) | None => {
            // String enums carry only `enum` values.
            match schema.enum_values.as_ref().and_then(|v| v.first()) {
                Some(Value::String(_)) => ParameterType::String,
                _ => ParameterType::Any,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    enum Priority {
        Low,
        High,
    }

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct SampleRequest {
        /// Human readable title.
        #[schemars(length(min = 1, max = 10))]
        title: String,
        #[schemars(range(min = 1, max = 5))]
        level: u8,
        note: Option<String>,
        priority: Option<Priority>,
        #[schemars(length(max = 2))]
        tags: Vec<String>,
    }

    fn specs() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("title", ParameterType::String)
                .required()
                .with_length(Some(1), Some(10)),
            ParameterSpec::new("level", ParameterType::Integer).with_range(Some(1.0), Some(5.0)),
            ParameterSpec::new("mode", ParameterType::String)
                .with_enum(vec![json!("fast"), json!("slow")])
                .with_default(json!("fast")),
            ParameterSpec::new("code", ParameterType::String).with_pattern("^[A-Z]{3}$"),
        ]
    }

    #[test]
    fn test_derives_parameters_in_field_order() {
        let params = parameters_of::<SampleRequest>();
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["title", "level", "note", "priority", "tags"]);

        let title = &params[0];
        assert!(title.required);
        assert_eq!(title.param_type, ParameterType::String);
        assert_eq!(title.min_length, Some(1));
        assert_eq!(title.max_length, Some(10));
        assert_eq!(title.description.as_deref(), Some("Human readable title."));

        let level = &params[1];
        assert_eq!(level.param_type, ParameterType::Integer);
        assert_eq!(level.min_value, Some(1.0));
        assert_eq!(level.max_value, Some(5.0));

        let note = &params[2];
        assert!(!note.required);
        assert_eq!(note.param_type, ParameterType::String);

        let priority = &params[3];
        assert_eq!(priority.param_type, ParameterType::String);
        assert_eq!(priority.enum_values.as_ref().map(|v| v.len()), Some(2));

        assert_eq!(params[4].param_type, ParameterType::Array);
        assert_eq!(params[4].max_length, Some(2));
    }

    #[test]
    fn test_missing_required_field() {
        let err = validate_parameters(&specs(), &json!({"level": 2})).unwrap_err();
        assert!(err.has_field("title"));
    }

    #[test]
    fn test_applies_defaults() {
        let params = validate_parameters(&specs(), &json!({"title": "abc"})).unwrap();
        assert_eq!(params.get_str("mode"), Some("fast"));
        assert!(params.get("code").is_none());
    }

    #[test]
    fn test_collects_every_violation() {
        let err = validate_parameters(
            &specs(),
            &json!({"title": "", "level": 9, "mode": "warp", "code": "ab1", "extra": true}),
        )
        .unwrap_err();
        for field in ["title", "level", "mode", "code", "extra"] {
            assert!(err.has_field(field), "missing violation for {}", field);
        }
    }

    #[test]
    fn test_type_mismatch() {
        let err = validate_parameters(&specs(), &json!({"title": 42})).unwrap_err();
        assert_eq!(err.violations[0].reason, "expected string");
    }

    #[test]
    fn test_accepts_json_string_input() {
        let params = validate_parameters(&specs(), &json!("{\"title\": \"abc\", \"code\": \"ABC\"}")).unwrap();
        assert_eq!(params.get_str("code"), Some("ABC"));
    }

    #[test]
    fn test_rejects_non_object() {
        let err = validate_parameters(&specs(), &json!([1, 2])).unwrap_err();
        assert!(err.has_field("$"));
    }
}
