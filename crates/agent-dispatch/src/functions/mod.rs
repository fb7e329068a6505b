//! Built-in capabilities.

use crate::error::Failure;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

mod create_script;
mod execute_script;
mod read_file;
mod read_var;
mod write_file;

pub use create_script::CreateScript;
pub use execute_script::ExecuteScript;
pub use read_file::ReadFile;
pub use read_var::ReadVar;
pub use write_file::WriteFile;

/// Builds the JSON Schema of an object with the properties.
fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Deserializes the parameters of a capability.
fn parse_params<T: DeserializeOwned>(name: &str, arguments: &Value) -> Result<T, Failure> {
    serde_json::from_value(arguments.clone()).map_err(|err| {
        Failure::InvalidArguments(format!("Invalid arguments provided for {name}: {err}"))
    })
}

/// Checks the text encoding requested by a file capability.
fn check_encoding(encoding: Option<&str>) -> Result<(), Failure> {
    match encoding.map(str::to_ascii_lowercase).as_deref() {
        None | Some("utf-8" | "utf8") => Ok(()),
        Some(other) => Err(Failure::InvalidArguments(format!(
            "Unsupported encoding '{other}', only 'utf-8' is available."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Params {
        name: String,
    }

    #[test]
    fn it_parses_params() {
        let params = parse_params::<Params>("readVar", &json!({"name": "y"})).unwrap();
        assert_eq!(params.name, "y");

        let failure = parse_params::<Params>("readVar", &json!({})).unwrap_err();
        assert!(failure.message().contains("missing field `name`"));
    }

    #[test]
    fn it_checks_encodings() {
        assert!(check_encoding(None).is_ok());
        assert!(check_encoding(Some("UTF-8")).is_ok());
        assert!(matches!(
            check_encoding(Some("base64")),
            Err(Failure::InvalidArguments(_))
        ));
    }
}
