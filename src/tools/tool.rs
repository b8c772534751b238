//! Tool values and their builder
//!
//! A `Tool` is an explicitly registered callable carrying its own parameter
//! schema. Parameter types come from Rust types through `ParamType`:
//!
//! | Rust type | JSON schema type |
//! |---|---|
//! | integer primitives | `integer` |
//! | `f32`, `f64` | `number` |
//! | `bool` | `boolean` |
//! | `Vec<T>`, slices, sets | `array` (items from `T`) |
//! | maps, `serde_json::Map` | `object` |
//! | anything else | `string` |
//!
//! A parameter declared with [`ToolBuilder::param`] is required; one declared
//! with [`ToolBuilder::optional`] has a default on the handler side.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::{Result, ToolDefinition, TroupeError};

/// Maps a Rust type onto a JSON schema type name.
///
/// Implement it with an empty body for custom types to get `"string"`.
pub trait ParamType {
    fn json_type() -> &'static str {
        "string"
    }

    /// Item type for arrays; `None` for everything else
    fn items_type() -> Option<&'static str> {
        None
    }
}

/// Only one level of item inference: containers inside containers become strings.
fn item_type_of<T: ParamType + ?Sized>() -> &'static str {
    match T::json_type() {
        t @ ("integer" | "number" | "boolean" | "string") => t,
        _ => "string",
    }
}

macro_rules! param_type {
    ($json:literal => $($ty:ty),+) => {
        $(impl ParamType for $ty {
            fn json_type() -> &'static str {
                $json
            }
        })+
    };
}

param_type!("integer" => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
param_type!("number" => f32, f64);
param_type!("boolean" => bool);
param_type!("string" => String, str, char, PathBuf, Value);
param_type!("object" => Map<String, Value>);

impl<T: ParamType + ?Sized> ParamType for &T {
    fn json_type() -> &'static str {
        T::json_type()
    }

    fn items_type() -> Option<&'static str> {
        T::items_type()
    }
}

impl<T: ParamType> ParamType for Option<T> {
    fn json_type() -> &'static str {
        T::json_type()
    }

    fn items_type() -> Option<&'static str> {
        T::items_type()
    }
}

macro_rules! array_param_type {
    ($($container:ident),+) => {
        $(impl<T: ParamType> ParamType for $container<T> {
            fn json_type() -> &'static str {
                "array"
            }

            fn items_type() -> Option<&'static str> {
                Some(item_type_of::<T>())
            }
        })+
    };
}

array_param_type!(Vec, VecDeque, HashSet, BTreeSet);

impl<T: ParamType> ParamType for [T] {
    fn json_type() -> &'static str {
        "array"
    }

    fn items_type() -> Option<&'static str> {
        Some(item_type_of::<T>())
    }
}

impl<K, V> ParamType for HashMap<K, V> {
    fn json_type() -> &'static str {
        "object"
    }
}

impl<K, V> ParamType for BTreeMap<K, V> {
    fn json_type() -> &'static str {
        "object"
    }
}

/// Arguments handed to a tool handler
#[derive(Debug, Clone)]
pub struct ToolArgs {
    tool: String,
    values: Map<String, Value>,
}

impl ToolArgs {
    pub fn new(tool: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            tool: tool.into(),
            values,
        }
    }

    /// Required argument, decoded into `T`
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.values.get(name).ok_or_else(|| {
            TroupeError::Validation(format!("Required parameter '{}' missing", name))
        })?;
        self.decode(name, value)
    }

    /// Optional argument; `null` counts as absent
    pub fn get_opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.decode(name, value).map(Some),
        }
    }

    /// Optional argument with a default
    pub fn get_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T> {
        Ok(self.get_opt(name)?.unwrap_or(default))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }

    fn decode<T: DeserializeOwned>(&self, name: &str, value: &Value) -> Result<T> {
        T::deserialize(value).map_err(|e| {
            TroupeError::invalid_arguments(&self.tool, format!("parameter '{}': {}", name, e))
        })
    }
}

type Handler = Arc<dyn Fn(ToolArgs) -> anyhow::Result<Value> + Send + Sync>;

/// A named, schema-described callable the model can ask to invoke
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    parameters: Value,
    required: Vec<String>,
    validate_params: bool,
    handler: Handler,
}

impl Tool {
    /// Start describing a tool
    pub fn builder(name: impl Into<String>) -> ToolBuilder {
        ToolBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// JSON schema of the parameters object
    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    /// Names of required parameters, in declaration order
    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn validates_params(&self) -> bool {
        self.validate_params
    }

    /// Function-style definition sent to the model
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(&self.name, &self.description, self.parameters.clone())
    }

    /// Run the handler against an encoded-JSON or object argument bundle.
    pub fn invoke(&self, arguments: &Value) -> Result<Value> {
        let values = self.decode_arguments(arguments)?;

        if self.validate_params {
            if let Some(missing) = self.required.iter().find(|r| !values.contains_key(*r)) {
                return Err(TroupeError::Validation(format!(
                    "Required parameter '{}' missing",
                    missing
                )));
            }
        }

        (self.handler)(ToolArgs::new(&self.name, values)).map_err(|e| {
            match e.downcast::<TroupeError>() {
                Ok(err @ (TroupeError::InvalidArguments { .. } | TroupeError::Validation(_))) => {
                    err
                }
                Ok(err) => TroupeError::tool(&self.name, err.to_string()),
                Err(e) => TroupeError::tool(&self.name, format!("{:#}", e)),
            }
        })
    }

    fn decode_arguments(&self, arguments: &Value) -> Result<Map<String, Value>> {
        let decoded = match arguments {
            Value::String(text) if text.trim().is_empty() => return Ok(Map::new()),
            Value::String(text) => serde_json::from_str::<Value>(text)
                .map_err(|e| TroupeError::invalid_arguments(&self.name, e))?,
            Value::Null => return Ok(Map::new()),
            other => other.clone(),
        };

        match decoded {
            Value::Object(map) => Ok(map),
            other => Err(TroupeError::invalid_arguments(
                &self.name,
                format!("expected a JSON object, got {}", other),
            )),
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("required", &self.required)
            .field("validate_params", &self.validate_params)
            .finish()
    }
}

/// Builder for creating Tools
pub struct ToolBuilder {
    name: String,
    description: Option<String>,
    properties: Map<String, Value>,
    required: Vec<String>,
    validate_params: bool,
    handler: Option<Handler>,
}

impl ToolBuilder {
    /// Create a new builder with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            properties: Map::new(),
            required: Vec::new(),
            validate_params: true,
            handler: None,
        }
    }

    /// Set the description shown to the model
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a required parameter
    pub fn param<T: ParamType + ?Sized>(mut self, name: &str) -> Self {
        self.properties
            .insert(name.to_string(), Self::property_schema::<T>(name));
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
        self
    }

    /// Declare a parameter that has a default value
    pub fn optional<T: ParamType + ?Sized>(mut self, name: &str) -> Self {
        self.properties
            .insert(name.to_string(), Self::property_schema::<T>(name));
        self.required.retain(|r| r != name);
        self
    }

    /// Check required parameters before calling the handler (default: on)
    pub fn validate_params(mut self, validate: bool) -> Self {
        self.validate_params = validate;
        self
    }

    /// Handler working on raw `ToolArgs`
    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: Fn(ToolArgs) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }

    /// Handler taking a deserialized argument struct
    pub fn typed_handler<A, R, F>(mut self, f: F) -> Self
    where
        A: DeserializeOwned,
        R: Serialize,
        F: Fn(A) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        let name = self.name.clone();
        self.handler = Some(Arc::new(move |args: ToolArgs| {
            let parsed: A = serde_json::from_value(args.into_value())
                .map_err(|e| TroupeError::invalid_arguments(&name, e))?;
            let output = f(parsed)?;
            Ok(serde_json::to_value(output)?)
        }));
        self
    }

    /// Build the Tool
    pub fn build(self) -> Result<Tool> {
        let handler = self.handler.ok_or_else(|| {
            TroupeError::config(format!("Tool '{}' has no handler", self.name))
        })?;

        let parameters = if self.properties.is_empty() {
            json!({"type": "object", "properties": {}})
        } else {
            json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            })
        };

        Ok(Tool {
            description: self
                .description
                .unwrap_or_else(|| format!("Function: {}", self.name)),
            name: self.name,
            parameters,
            required: self.required,
            validate_params: self.validate_params,
            handler,
        })
    }

    fn property_schema<T: ParamType + ?Sized>(name: &str) -> Value {
        let mut schema = json!({
            "type": T::json_type(),
            "description": format!("Parameter: {}", name),
        });
        if let Some(items) = T::items_type() {
            schema["items"] = json!({ "type": items });
        }
        schema
    }
}
