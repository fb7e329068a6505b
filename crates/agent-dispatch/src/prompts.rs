//! Model-facing message templates.
//!
//! These strings are fed back to the LLM, so their wording is part of the
//! observable behavior of the dispatcher.

use crate::render::trim_text;

/// Inline preview limit used by [`function_call_failed`].
const FAILED_ARGS_PREVIEW: usize = 200;

/// The function call has no name.
pub fn undefined_function_name() -> String {
    "Function call name was undefined.".to_owned()
}

/// The function call has no arguments.
pub fn undefined_function_args(name: &str) -> String {
    format!("Function call argument for '{name}' were undefined.")
}

/// The function does not exist.
pub fn function_not_found(name: &str) -> String {
    format!("Function '{name}' not found. Use one of the available functions.")
}

/// The function arguments are not valid JSON.
pub fn unparsable_function_args(name: &str, arguments: &str, reason: &str) -> String {
    format!(
        "Could not parse JSON arguments for function: {name}. Error: {reason}\n\
         JSON Arguments:\n```\n{arguments}\n```\n\
         Try again with valid JSON arguments."
    )
}

/// The function call ran into an internal fault.
pub fn function_call_failed(name: &str, message: &str, arguments: &str) -> String {
    let arguments = trim_text(arguments, FAILED_ARGS_PREVIEW);
    format!("The function '{name}' failed, this is the error:\n```\n{message}\n```\n\nArguments:\n```\n{arguments}\n```")
}

/// Summary header for a function call.
pub fn function_call_header(name: &str, pretty_arguments: &str) -> String {
    format!("Function call: `{name}({pretty_arguments})`\n")
}

/// Title content for a successful function call.
pub fn function_call_success_content(name: &str, pretty_arguments: &str, result: &str) -> String {
    format!("## Function Call:\n```javascript\n{name}({pretty_arguments})\n```\n## Result\n{result}")
}

/// Title content for a failed function call.
pub fn function_call_failed_content(name: &str, pretty_arguments: &str, error: &str) -> String {
    format!("## Function Call:\n```javascript\n{name}({pretty_arguments})\n```\n## Failed\n```\n{error}\n```")
}

/// A note that the result has been stored in a variable.
pub fn stored_result_in_var(variable: Option<&str>) -> String {
    match variable.filter(|name| !name.is_empty()) {
        Some(name) => format!("Result stored in variable: {{{{{name}}}}}"),
        None => String::new(),
    }
}

/// Output of `readVar`.
pub fn read_var_output(name: &str, value: &str) -> String {
    format!("## Variable {{{{{name}}}}}\n```\n{value}\n```")
}

/// Output of any function without a specialized summary.
pub fn other_function_output(result: &str) -> String {
    format!("```\n{result}\n```")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_mentions_the_variable_placeholder() {
        assert_eq!(
            stored_result_in_var(Some("y")),
            "Result stored in variable: {{y}}"
        );
        assert_eq!(stored_result_in_var(Some("")), "");
        assert_eq!(stored_result_in_var(None), "");
    }

    #[test]
    fn it_bounds_failed_arguments() {
        let arguments = "a".repeat(1000);
        let text = function_call_failed("readVar", "boom", &arguments);
        assert!(text.contains("boom"));
        assert!(text.len() < 400);
    }
}
