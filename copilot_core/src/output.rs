//! Conversion of tool return values into the textual output channel.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::ToolFailure;

/// Values a tool may return.
///
/// The model only ever sees text: strings pass through verbatim, scalars use
/// their `Display` form, unit and `None` become `null`, and structured values
/// are written as compact JSON. `Result::Err` marks the call as failed.
pub trait IntoToolOutput {
    fn into_tool_output(self) -> Result<String, ToolFailure>;
}

macro_rules! display_output {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl IntoToolOutput for $ty {
                fn into_tool_output(self) -> Result<String, ToolFailure> {
                    Ok(self.to_string())
                }
            }
        )+
    };
}

display_output!(
    String, &str, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize,
    f32, f64,
);

impl IntoToolOutput for () {
    fn into_tool_output(self) -> Result<String, ToolFailure> {
        Ok("null".to_string())
    }
}

impl IntoToolOutput for Value {
    fn into_tool_output(self) -> Result<String, ToolFailure> {
        Ok(self.to_string())
    }
}

impl<T: IntoToolOutput> IntoToolOutput for Option<T> {
    fn into_tool_output(self) -> Result<String, ToolFailure> {
        match self {
            Some(value) => value.into_tool_output(),
            None => Ok("null".to_string()),
        }
    }
}

impl<T: IntoToolOutput, E: fmt::Display + fmt::Debug> IntoToolOutput for Result<T, E> {
    fn into_tool_output(self) -> Result<String, ToolFailure> {
        match self {
            Ok(value) => value.into_tool_output(),
            Err(err) => Err(ToolFailure::from_error(err)),
        }
    }
}

fn to_json_text<T: Serialize>(value: &T) -> Result<String, ToolFailure> {
    serde_json::to_string(value).map_err(ToolFailure::from_error)
}

macro_rules! json_output {
    ($($ty:ident<$($param:ident),+>),+ $(,)?) => {
        $(
            impl<$($param: Serialize),+> IntoToolOutput for $ty<$($param),+> {
                fn into_tool_output(self) -> Result<String, ToolFailure> {
                    to_json_text(&self)
                }
            }
        )+
    };
}

json_output!(
    Vec<T>,
    VecDeque<T>,
    BTreeSet<T>,
    BTreeMap<K, V>,
);

impl<T: Serialize, S> IntoToolOutput for HashSet<T, S> {
    fn into_tool_output(self) -> Result<String, ToolFailure> {
        to_json_text(&self)
    }
}

impl<K: Serialize, V: Serialize, S> IntoToolOutput for HashMap<K, V, S> {
    fn into_tool_output(self) -> Result<String, ToolFailure> {
        to_json_text(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strings_pass_through_verbatim() {
        assert_eq!("plain text".into_tool_output().unwrap(), "plain text");
        assert_eq!(
            String::from("\"quoted\"").into_tool_output().unwrap(),
            "\"quoted\""
        );
    }

    #[test]
    fn test_scalars_use_display() {
        assert_eq!(42_i32.into_tool_output().unwrap(), "42");
        assert_eq!(0.5_f64.into_tool_output().unwrap(), "0.5");
        assert_eq!(true.into_tool_output().unwrap(), "true");
    }

    #[test]
    fn test_absence_is_null() {
        assert_eq!(().into_tool_output().unwrap(), "null");
        assert_eq!(None::<i32>.into_tool_output().unwrap(), "null");
        assert_eq!(Some(3_u8).into_tool_output().unwrap(), "3");
    }

    #[test]
    fn test_structured_values_are_json() {
        assert_eq!(vec![1, 2, 3].into_tool_output().unwrap(), "[1,2,3]");
        let mut map = BTreeMap::new();
        map.insert("a", 1);
        assert_eq!(map.into_tool_output().unwrap(), r#"{"a":1}"#);
        assert_eq!(
            json!({"title": "x"}).into_tool_output().unwrap(),
            r#"{"title":"x"}"#
        );
    }

    #[test]
    fn test_err_becomes_failure() {
        let result: Result<String, String> = Err("disk on fire".into());
        let failure = result.into_tool_output().unwrap_err();
        assert_eq!(failure.message, "disk on fire");
        assert_eq!(failure.trace, "\"disk on fire\"");
    }
}
