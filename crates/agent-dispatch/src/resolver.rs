//! Argument parsing and `{{name}}` placeholder substitution.

use crate::{Map, variables::VariableStore};
use regex::{Captures, Regex};
use serde_json::Value;
use std::{borrow::Cow, sync::LazyLock};
use thiserror::Error;

/// Errors raised while resolving capability arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// The argument string is not valid relaxed JSON or not an object.
    #[error("invalid arguments `{arguments}`: {reason}")]
    InvalidArguments {
        /// The offending argument string.
        arguments: String,
        /// Parser diagnostic.
        reason: String,
    },
}

/// Parses relaxed-JSON arguments and substitutes placeholders in string fields.
///
/// An absent or blank input resolves to an empty object.
pub fn resolve_arguments(
    arguments: Option<&str>,
    variables: &VariableStore,
) -> Result<Map, ArgumentError> {
    let Some(input) = arguments.filter(|s| !s.trim().is_empty()) else {
        return Ok(Map::new());
    };
    let invalid = |reason: String| ArgumentError::InvalidArguments {
        arguments: input.to_owned(),
        reason,
    };
    let mut args = match json5::from_str::<Value>(input) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Map::new(),
        Ok(value) => {
            return Err(invalid(format!(
                "expected an object but found `{}`",
                value_type(&value)
            )));
        }
        Err(err) => return Err(invalid(err.to_string())),
    };
    if !variables.is_empty() {
        for value in args.values_mut() {
            let Value::String(s) = value else {
                continue;
            };
            let resolved = match resolve_placeholders(s, variables) {
                Cow::Owned(resolved) => resolved,
                Cow::Borrowed(_) => continue,
            };
            *s = resolved;
        }
    }
    Ok(args)
}

/// Replaces each `{{name}}` token with the decoded value of the variable.
///
/// String values are inserted as-is, other values as compact JSON.
/// Tokens referring to unknown variables are left verbatim.
pub fn resolve_placeholders<'a>(template: &'a str, variables: &VariableStore) -> Cow<'a, str> {
    if !template.contains("{{") {
        return Cow::Borrowed(template);
    }
    PLACEHOLDER_PATTERN.replace_all(template, |captures: &Captures| {
        let key = captures[1].trim();
        match variables.get(key) {
            Some(Value::String(s)) => s,
            Some(value) => value.to_string(),
            None => captures[0].to_owned(),
        }
    })
}

/// Returns the JSON type name of a value.
fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Regex for the variable placeholder.
static PLACEHOLDER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{(.*?)\}\}").expect("fail to create a regex for the variable placeholder")
});
