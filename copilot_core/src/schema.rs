//! Type shapes and their JSON-Schema classification.
//!
//! Every Rust type that may appear as a tool parameter describes itself
//! through [`ToolSchema::shape`]. The resulting [`TypeShape`] is the raw
//! annotation: it can express things a tool parameter may not use (tuples,
//! arbitrary structs, maps with non-string keys). [`classify`] walks the
//! shape recursively and either produces the [`TypeDescriptor`] sent to the
//! model or rejects the shape.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde_json::{Map, Value, json};

// ============================================================================
// SHAPES
// ============================================================================

/// JSON-Schema scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Integer,
    Number,
    String,
    Boolean,
}

impl ScalarType {
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarType::Integer => "integer",
            ScalarType::Number => "number",
            ScalarType::String => "string",
            ScalarType::Boolean => "boolean",
        }
    }
}

/// Declared shape of a parameter type, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeShape {
    Scalar(ScalarType),
    /// The "no value" type: `()` on its own, or the `None` side of an `Option`.
    Null,
    List(Box<TypeShape>),
    Map {
        key: Box<TypeShape>,
        value: Box<TypeShape>,
    },
    Union(Vec<TypeShape>),
    /// Enumeration of string constants.
    Literal(Vec<String>),
    Tuple(Vec<TypeShape>),
    /// A type with no schema mapping. Carries the type name for error reports.
    Opaque(&'static str),
}

impl TypeShape {
    pub fn is_null(&self) -> bool {
        matches!(self, TypeShape::Null)
    }

    /// Short human-readable rendering used in error messages.
    pub fn render(&self) -> String {
        match self {
            TypeShape::Scalar(s) => s.as_str().to_string(),
            TypeShape::Null => "null".to_string(),
            TypeShape::List(inner) => format!("list[{}]", inner.render()),
            TypeShape::Map { key, value } => {
                format!("map[{}, {}]", key.render(), value.render())
            }
            TypeShape::Union(alts) => alts
                .iter()
                .map(TypeShape::render)
                .collect::<Vec<_>>()
                .join(" | "),
            TypeShape::Literal(values) => format!("literal[{}]", values.join(", ")),
            TypeShape::Tuple(elems) => format!(
                "tuple[{}]",
                elems
                    .iter()
                    .map(TypeShape::render)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            TypeShape::Opaque(name) => (*name).to_string(),
        }
    }
}

/// Validated, recursively structured type description of a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    Scalar(ScalarType),
    Null,
    Array(Box<TypeDescriptor>),
    /// Object with string keys; the payload describes the values.
    Object(Box<TypeDescriptor>),
    Union(Vec<TypeDescriptor>),
    Enum(Vec<String>),
}

impl TypeDescriptor {
    /// Render as a JSON-Schema fragment.
    pub fn to_json(&self) -> Map<String, Value> {
        let value = match self {
            TypeDescriptor::Scalar(s) => json!({ "type": s.as_str() }),
            TypeDescriptor::Null => json!({ "type": "null" }),
            TypeDescriptor::Array(items) => json!({
                "type": "array",
                "items": items.to_json(),
            }),
            TypeDescriptor::Object(values) => json!({
                "type": "object",
                "additionalProperties": values.to_json(),
            }),
            TypeDescriptor::Union(alts) => json!({
                "anyOf": alts.iter().map(TypeDescriptor::to_json).collect::<Vec<_>>(),
            }),
            TypeDescriptor::Enum(values) => json!({
                "type": "string",
                "enum": values,
            }),
        };
        match value {
            Value::Object(map) => map,
            _ => unreachable!("schema fragments are always objects"),
        }
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Reason a shape could not be classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedShape {
    /// Rendering of the innermost offending shape.
    pub offending: String,
}

/// Classify a nested shape. `Null` stays an ordinary alternative here.
pub fn classify(shape: &TypeShape) -> Result<TypeDescriptor, UnsupportedShape> {
    match shape {
        TypeShape::Scalar(s) => Ok(TypeDescriptor::Scalar(*s)),
        TypeShape::Null => Ok(TypeDescriptor::Null),
        TypeShape::List(elem) => Ok(TypeDescriptor::Array(Box::new(classify(elem)?))),
        TypeShape::Map { key, value } => {
            if **key != TypeShape::Scalar(ScalarType::String) {
                return Err(UnsupportedShape {
                    offending: shape.render(),
                });
            }
            Ok(TypeDescriptor::Object(Box::new(classify(value)?)))
        }
        TypeShape::Union(alts) => Ok(TypeDescriptor::Union(
            alts.iter().map(classify).collect::<Result<_, _>>()?,
        )),
        TypeShape::Literal(values) => Ok(TypeDescriptor::Enum(values.clone())),
        TypeShape::Tuple(_) | TypeShape::Opaque(_) => Err(UnsupportedShape {
            offending: shape.render(),
        }),
    }
}

/// Outcome of classifying a top-level parameter shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterType {
    pub descriptor: TypeDescriptor,
    /// The shape admitted "no value" through a union alternative.
    pub accepts_absence: bool,
}

/// Classify a parameter's shape.
///
/// Absence alternatives of a top-level union are lifted out of the union and
/// reported through [`ParameterType::accepts_absence`]. A union left with a
/// single alternative collapses to that alternative.
pub fn classify_parameter(shape: &TypeShape) -> Result<ParameterType, UnsupportedShape> {
    let TypeShape::Union(alts) = shape else {
        return Ok(ParameterType {
            descriptor: classify(shape)?,
            accepts_absence: false,
        });
    };

    let present: Vec<&TypeShape> = alts.iter().filter(|alt| !alt.is_null()).collect();
    let accepts_absence = present.len() != alts.len();

    let descriptor = match present.as_slice() {
        // `Option<()>` and friends: nothing but absence.
        [] => TypeDescriptor::Null,
        [single] => classify(single)?,
        many => TypeDescriptor::Union(
            many.iter()
                .map(|alt| classify(alt))
                .collect::<Result<_, _>>()?,
        ),
    };

    Ok(ParameterType {
        descriptor,
        accepts_absence,
    })
}

// ============================================================================
// TOOL SCHEMA TRAIT AND IMPLEMENTATIONS
// ============================================================================

/// Types that can describe their own parameter shape.
pub trait ToolSchema {
    fn shape() -> TypeShape;
}

macro_rules! prim {
    ($ty:ty, $scalar:expr) => {
        impl ToolSchema for $ty {
            fn shape() -> TypeShape {
                TypeShape::Scalar($scalar)
            }
        }
    };
}

prim!(bool, ScalarType::Boolean);
prim!(i8, ScalarType::Integer);
prim!(i16, ScalarType::Integer);
prim!(i32, ScalarType::Integer);
prim!(i64, ScalarType::Integer);
prim!(i128, ScalarType::Integer);
prim!(isize, ScalarType::Integer);
prim!(u8, ScalarType::Integer);
prim!(u16, ScalarType::Integer);
prim!(u32, ScalarType::Integer);
prim!(u64, ScalarType::Integer);
prim!(u128, ScalarType::Integer);
prim!(usize, ScalarType::Integer);
prim!(f32, ScalarType::Number);
prim!(f64, ScalarType::Number);
prim!(char, ScalarType::String);
prim!(String, ScalarType::String);
prim!(str, ScalarType::String);

impl ToolSchema for &'_ str {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarType::String)
    }
}

impl ToolSchema for () {
    fn shape() -> TypeShape {
        TypeShape::Null
    }
}

impl<T: ToolSchema + ?Sized> ToolSchema for Box<T> {
    fn shape() -> TypeShape {
        T::shape()
    }
}

impl<T: ToolSchema> ToolSchema for Option<T> {
    fn shape() -> TypeShape {
        match T::shape() {
            // Flatten `Option<Union>` so absence sits next to the other alternatives.
            TypeShape::Union(mut alts) => {
                if !alts.iter().any(TypeShape::is_null) {
                    alts.push(TypeShape::Null);
                }
                TypeShape::Union(alts)
            }
            inner => TypeShape::Union(vec![inner, TypeShape::Null]),
        }
    }
}

macro_rules! list {
    ($($ty:ident),+) => {
        $(
            impl<T: ToolSchema> ToolSchema for $ty<T> {
                fn shape() -> TypeShape {
                    TypeShape::List(Box::new(T::shape()))
                }
            }
        )+
    };
}

list!(Vec, VecDeque, HashSet, BTreeSet);

impl<T: ToolSchema> ToolSchema for [T] {
    fn shape() -> TypeShape {
        TypeShape::List(Box::new(T::shape()))
    }
}

impl<K: ToolSchema, V: ToolSchema, S> ToolSchema for HashMap<K, V, S> {
    fn shape() -> TypeShape {
        TypeShape::Map {
            key: Box::new(K::shape()),
            value: Box::new(V::shape()),
        }
    }
}

impl<K: ToolSchema, V: ToolSchema> ToolSchema for BTreeMap<K, V> {
    fn shape() -> TypeShape {
        TypeShape::Map {
            key: Box::new(K::shape()),
            value: Box::new(V::shape()),
        }
    }
}

// Tuples have a shape so that they produce a readable error instead of a
// missing-trait compile failure.
macro_rules! impl_tuples {
    ($(($($name:ident)+))+) => {
        $(
            impl<$($name: ToolSchema),+> ToolSchema for ($($name,)+) {
                fn shape() -> TypeShape {
                    TypeShape::Tuple(vec![$($name::shape()),+])
                }
            }
        )+
    }
}

impl_tuples! {
    (T0)
    (T0 T1)
    (T0 T1 T2)
    (T0 T1 T2 T3)
    (T0 T1 T2 T3 T4)
    (T0 T1 T2 T3 T4 T5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema_of<T: ToolSchema + ?Sized>() -> Value {
        Value::Object(classify(&T::shape()).unwrap().to_json())
    }

    #[test]
    fn test_primitive_schemas() {
        assert_eq!(schema_of::<bool>(), json!({"type": "boolean"}));
        assert_eq!(schema_of::<i32>(), json!({"type": "integer"}));
        assert_eq!(schema_of::<u64>(), json!({"type": "integer"}));
        assert_eq!(schema_of::<f64>(), json!({"type": "number"}));
        assert_eq!(schema_of::<String>(), json!({"type": "string"}));
        assert_eq!(schema_of::<&str>(), json!({"type": "string"}));
        assert_eq!(schema_of::<()>(), json!({"type": "null"}));
    }

    #[test]
    fn test_vec_schema() {
        assert_eq!(
            schema_of::<Vec<String>>(),
            json!({"type": "array", "items": {"type": "string"}})
        );
        assert_eq!(
            schema_of::<Vec<Vec<i64>>>(),
            json!({
                "type": "array",
                "items": {"type": "array", "items": {"type": "integer"}}
            })
        );
    }

    #[test]
    fn test_hashmap_schema() {
        assert_eq!(
            schema_of::<HashMap<String, i32>>(),
            json!({
                "type": "object",
                "additionalProperties": {"type": "integer"}
            })
        );
        assert_eq!(
            schema_of::<BTreeMap<String, Vec<bool>>>(),
            json!({
                "type": "object",
                "additionalProperties": {"type": "array", "items": {"type": "boolean"}}
            })
        );
    }

    #[test]
    fn test_non_string_map_keys_are_rejected() {
        let err = classify(&<HashMap<i32, String>>::shape()).unwrap_err();
        assert_eq!(err.offending, "map[integer, string]");
    }

    #[test]
    fn test_tuples_are_rejected() {
        let err = classify(&<(i32, String)>::shape()).unwrap_err();
        assert_eq!(err.offending, "tuple[integer, string]");

        let nested = classify(&<Vec<(i32,)>>::shape()).unwrap_err();
        assert_eq!(nested.offending, "tuple[integer]");
    }

    #[test]
    fn test_nested_option_keeps_null_alternative() {
        assert_eq!(
            schema_of::<Vec<Option<i32>>>(),
            json!({
                "type": "array",
                "items": {"anyOf": [{"type": "integer"}, {"type": "null"}]}
            })
        );
    }

    #[test]
    fn test_parameter_option_lifts_absence() {
        let param = classify_parameter(&<Option<String>>::shape()).unwrap();
        assert!(param.accepts_absence);
        assert_eq!(param.descriptor, TypeDescriptor::Scalar(ScalarType::String));

        let plain = classify_parameter(&<String>::shape()).unwrap();
        assert!(!plain.accepts_absence);
    }

    #[test]
    fn test_parameter_union_keeps_remaining_alternatives() {
        let shape = TypeShape::Union(vec![
            TypeShape::Scalar(ScalarType::Integer),
            TypeShape::Null,
            TypeShape::Scalar(ScalarType::String),
        ]);
        let param = classify_parameter(&shape).unwrap();
        assert!(param.accepts_absence);
        assert_eq!(
            Value::Object(param.descriptor.to_json()),
            json!({"anyOf": [{"type": "integer"}, {"type": "string"}]})
        );
    }

    #[test]
    fn test_option_of_union_is_flattened() {
        struct Either;
        impl ToolSchema for Either {
            fn shape() -> TypeShape {
                TypeShape::Union(vec![
                    TypeShape::Scalar(ScalarType::Integer),
                    TypeShape::Scalar(ScalarType::String),
                ])
            }
        }

        assert_eq!(
            <Option<Either>>::shape(),
            TypeShape::Union(vec![
                TypeShape::Scalar(ScalarType::Integer),
                TypeShape::Scalar(ScalarType::String),
                TypeShape::Null,
            ])
        );
    }

    #[test]
    fn test_literal_schema() {
        let shape = TypeShape::Literal(vec!["Celsius".into(), "Fahrenheit".into()]);
        assert_eq!(
            Value::Object(classify(&shape).unwrap().to_json()),
            json!({"type": "string", "enum": ["Celsius", "Fahrenheit"]})
        );
    }
}
