//! Tool signatures, their validated descriptors, and the wire-format spec.
//!
//! A [`ToolSignature`] is what a tool declares about itself (usually
//! generated by `#[tool]`). [`describe`] validates it into a
//! [`ToolDescriptor`], and [`ToolDescriptor::emit`] renders the function-tool
//! entry attached to an assistant at creation time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::schema::{ToolSchema, TypeDescriptor, TypeShape, classify_parameter};

// ============================================================================
// SIGNATURES
// ============================================================================

/// Declared metadata of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub description: Option<String>,
    pub shape: TypeShape,
    /// Value used when the caller omits the argument.
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, shape: TypeShape) -> Self {
        Self {
            name: name.into(),
            description: None,
            shape,
            default: None,
        }
    }

    /// Parameter whose shape comes from `T`'s [`ToolSchema`] impl.
    pub fn of<T: ToolSchema + ?Sized>(name: impl Into<String>) -> Self {
        Self::new(name, T::shape())
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default_value(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Informational metadata about the return value. Never enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnSpec {
    pub type_name: String,
    pub description: Option<String>,
    pub required: bool,
}

/// Everything a tool declares about itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSignature {
    pub name: String,
    pub doc: Option<String>,
    pub params: Vec<ParamSpec>,
    pub returns: Option<ReturnSpec>,
}

impl ToolSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            params: Vec::new(),
            returns: None,
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, returns: ReturnSpec) -> Self {
        self.returns = Some(returns);
        self
    }
}

// ============================================================================
// DESCRIPTORS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ToolParameterDescriptor {
    pub name: String,
    pub type_descriptor: TypeDescriptor,
    pub description: String,
    pub is_required: bool,
    /// Present only for optional parameters with a known default.
    pub default_value: Option<Value>,
}

impl ToolParameterDescriptor {
    fn to_property(&self) -> Value {
        let mut property = Map::new();
        property.insert(
            "description".to_string(),
            Value::String(self.description.clone()),
        );
        property.extend(self.type_descriptor.to_json());
        if !self.is_required {
            property.insert("optional".to_string(), Value::Bool(true));
        }
        if let Some(default) = &self.default_value {
            property.insert("default".to_string(), default.clone());
        }
        Value::Object(property)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// Parameters in declaration order.
    pub parameters: Vec<ToolParameterDescriptor>,
    pub return_type: String,
    pub return_description: String,
    pub return_required: bool,
}

impl ToolDescriptor {
    pub fn parameter(&self, name: &str) -> Option<&ToolParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &ToolParameterDescriptor> {
        self.parameters.iter().filter(|p| p.is_required)
    }

    /// Render the function-tool entry for an assistant creation request.
    pub fn emit(&self) -> ToolSpec {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.to_property()))
            .collect();
        let required: Vec<Value> = self
            .required_parameters()
            .map(|p| Value::String(p.name.clone()))
            .collect();

        let mut parameters = Map::new();
        parameters.insert("type".to_string(), Value::String("object".to_string()));
        parameters.insert("properties".to_string(), Value::Object(properties));
        parameters.insert("required".to_string(), Value::Array(required));

        ToolSpec::new(
            self.name.clone(),
            self.description.clone(),
            Value::Object(parameters),
        )
    }
}

/// Validate a signature into a descriptor.
pub fn describe(signature: &ToolSignature) -> Result<ToolDescriptor, SchemaError> {
    let tool = signature.name.as_str();
    let description = signature
        .doc
        .as_deref()
        .map(str::trim)
        .filter(|doc| !doc.is_empty())
        .ok_or_else(|| SchemaError::MissingDocumentation {
            tool: tool.to_string(),
        })?;

    let mut parameters: Vec<ToolParameterDescriptor> = Vec::with_capacity(signature.params.len());
    for param in &signature.params {
        if parameters.iter().any(|p| p.name == param.name) {
            return Err(SchemaError::DuplicateParameter {
                tool: tool.to_string(),
                param: param.name.clone(),
            });
        }
        let param_description = param
            .description
            .clone()
            .ok_or_else(|| SchemaError::MissingDescription {
                tool: tool.to_string(),
                param: param.name.clone(),
            })?;
        let classified =
            classify_parameter(&param.shape).map_err(|err| SchemaError::UnsupportedType {
                tool: tool.to_string(),
                param: param.name.clone(),
                type_name: err.offending,
            })?;

        // An explicit default and an absence-accepting union are independent
        // routes to optional.
        let (is_required, default_value) = match (&param.default, classified.accepts_absence) {
            (Some(default), _) => (false, Some(default.clone())),
            (None, true) => (false, Some(Value::Null)),
            (None, false) => (true, None),
        };

        parameters.push(ToolParameterDescriptor {
            name: param.name.clone(),
            type_descriptor: classified.descriptor,
            description: param_description,
            is_required,
            default_value,
        });
    }

    let (return_type, return_description, return_required) = match &signature.returns {
        Some(ret) => (
            ret.type_name.clone(),
            ret.description.clone().unwrap_or_default(),
            ret.required,
        ),
        None => ("()".to_string(), String::new(), false),
    };

    Ok(ToolDescriptor {
        name: signature.name.clone(),
        description: description.to_string(),
        parameters,
        return_type,
        return_description,
        return_required,
    })
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

/// Function-tool entry in OpenAI function-calling format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    pub fn new(name: String, description: String, parameters: Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name,
                description,
                parameters,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScalarType;
    use serde_json::json;

    fn temperature_unit() -> TypeShape {
        TypeShape::Literal(vec!["Celsius".into(), "Fahrenheit".into()])
    }

    fn current_temperature() -> ToolSignature {
        ToolSignature::new("get_current_temperature")
            .doc("Get the current temperature for a specific location.")
            .param(
                ParamSpec::of::<String>("location")
                    .description("The city and state, e.g., San Francisco, CA"),
            )
            .param(ParamSpec::new("unit", temperature_unit()).description(
                "The temperature unit to use. Infer this from the user's location.",
            ))
    }

    #[test]
    fn test_emit_required_enum_parameters() {
        let spec = describe(&current_temperature()).unwrap().emit();
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({
                "type": "function",
                "function": {
                    "name": "get_current_temperature",
                    "description": "Get the current temperature for a specific location.",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "location": {
                                "type": "string",
                                "description": "The city and state, e.g., San Francisco, CA",
                            },
                            "unit": {
                                "type": "string",
                                "enum": ["Celsius", "Fahrenheit"],
                                "description": "The temperature unit to use. Infer this from the user's location.",
                            },
                        },
                        "required": ["location", "unit"],
                    },
                },
            })
        );
    }

    #[test]
    fn test_emit_single_parameter() {
        let signature = ToolSignature::new("get_rain_probability")
            .doc("Get the probability of rain for a specific location.")
            .param(
                ParamSpec::of::<String>("location")
                    .description("The city and state, e.g., San Francisco, CA"),
            );
        let spec = describe(&signature).unwrap().emit();
        let parameters = &spec.function.parameters;
        assert_eq!(parameters["required"], json!(["location"]));
        assert!(parameters["properties"].get("unit").is_none());
    }

    #[test]
    fn test_emit_is_deterministic() {
        let first = describe(&current_temperature()).unwrap().emit();
        let second = describe(&current_temperature()).unwrap().emit();
        assert_eq!(first, second);
    }

    #[test]
    fn test_optional_routes() {
        let signature = ToolSignature::new("search")
            .doc("Search the corpus.")
            .param(ParamSpec::of::<String>("query").description("What to look for"))
            .param(
                ParamSpec::of::<u32>("limit")
                    .description("Maximum number of hits")
                    .default_value(json!(5)),
            )
            .param(ParamSpec::of::<Option<String>>("author").description("Filter by author"));
        let descriptor = describe(&signature).unwrap();

        let required: Vec<_> = descriptor.required_parameters().map(|p| p.name.as_str()).collect();
        assert_eq!(required, ["query"]);

        let spec = descriptor.emit();
        let props = &spec.function.parameters["properties"];
        assert_eq!(
            props["limit"],
            json!({
                "type": "integer",
                "description": "Maximum number of hits",
                "optional": true,
                "default": 5,
            })
        );
        assert_eq!(
            props["author"],
            json!({
                "type": "string",
                "description": "Filter by author",
                "optional": true,
                "default": null,
            })
        );
    }

    #[test]
    fn test_missing_documentation() {
        let signature = ToolSignature::new("undocumented");
        assert_eq!(
            describe(&signature).unwrap_err(),
            SchemaError::MissingDocumentation {
                tool: "undocumented".into()
            }
        );

        let blank = ToolSignature::new("blank").doc("   \n ");
        assert!(matches!(
            describe(&blank),
            Err(SchemaError::MissingDocumentation { .. })
        ));
    }

    #[test]
    fn test_missing_parameter_description() {
        let signature = ToolSignature::new("get_weather")
            .doc("Gets the weather.")
            .param(ParamSpec::of::<String>("location"));
        assert_eq!(
            describe(&signature).unwrap_err(),
            SchemaError::MissingDescription {
                tool: "get_weather".into(),
                param: "location".into(),
            }
        );
    }

    #[test]
    fn test_unsupported_parameter_type() {
        let signature = ToolSignature::new("pairs")
            .doc("Takes a pair.")
            .param(ParamSpec::of::<(i32, i32)>("pair").description("Two numbers"));
        let err = describe(&signature).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnsupportedType {
                tool: "pairs".into(),
                param: "pair".into(),
                type_name: "tuple[integer, integer]".into(),
            }
        );
        assert!(err.to_string().contains("pair"));
    }

    #[test]
    fn test_duplicate_parameter() {
        let signature = ToolSignature::new("twice")
            .doc("Declares x twice.")
            .param(ParamSpec::new("x", TypeShape::Scalar(ScalarType::Integer)).description("x"))
            .param(ParamSpec::new("x", TypeShape::Scalar(ScalarType::String)).description("x"));
        assert!(matches!(
            describe(&signature),
            Err(SchemaError::DuplicateParameter { .. })
        ));
    }

    #[test]
    fn test_return_metadata_is_informational() {
        let signature = current_temperature().returns(ReturnSpec {
            type_name: "f64".into(),
            description: Some("Degrees in the requested unit".into()),
            required: true,
        });
        let descriptor = describe(&signature).unwrap();
        assert_eq!(descriptor.return_type, "f64");
        assert_eq!(descriptor.return_description, "Degrees in the requested unit");
        assert!(descriptor.return_required);
        assert_eq!(descriptor.emit(), describe(&current_temperature()).unwrap().emit());
    }
}
