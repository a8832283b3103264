//! Named values substituted into templates.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::format::{FormatSpec, format_value};

/// Named values passed to a template, keyed by placeholder name.
pub type TemplateVars = BTreeMap<String, TemplateValue>;

/// A value that can fill a template placeholder.
///
/// Numbers keep their type so that numeric format specs such as `.2f` or
/// `,d` apply; everything else renders through its string form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateValue {
    /// Absent value, rendered as `None`.
    None,
    /// Boolean, rendered as `True` / `False`.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Str(String),
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = format_value(self, &FormatSpec::default()).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for TemplateValue {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<char> for TemplateValue {
    fn from(value: char) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<bool> for TemplateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for TemplateValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for TemplateValue {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

macro_rules! from_lossless_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for TemplateValue {
            fn from(value: $ty) -> Self {
                Self::Int(i64::from(value))
            }
        })*
    };
}

from_lossless_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for TemplateValue {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Str(value.to_string()), Self::Int)
    }
}

impl From<u64> for TemplateValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Str(value.to_string()), Self::Int)
    }
}

impl<T: Into<TemplateValue>> From<Option<T>> for TemplateValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

/// Builds [`TemplateVars`] from keyword-style pairs.
///
/// ```
/// use prompt_runtime::{TemplateValue, vars};
///
/// let vars = vars!(name = "Bo", price = 3.5);
/// assert_eq!(vars["name"], TemplateValue::from("Bo"));
/// assert_eq!(vars.len(), 2);
/// ```
#[macro_export]
macro_rules! vars {
    () => {
        $crate::TemplateVars::new()
    };
    ($($name:ident = $value:expr),+ $(,)?) => {{
        let mut vars = $crate::TemplateVars::new();
        $(
            vars.insert(
                ::std::string::String::from(stringify!($name)),
                $crate::TemplateValue::from($value),
            );
        )+
        vars
    }};
}
