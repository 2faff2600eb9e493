//! Command text checks done before any network call

use crate::config::defaults;
use crate::error::ValidationError;

/// Trim `command` and reject text the device shell would misparse.
///
/// Double quotes must be balanced and may not be nested, so an odd count or
/// an adjacent `""` pair is refused.
pub fn validate_command(command: &str) -> Result<&str, ValidationError> {
    let command = command.trim();
    if command.is_empty() {
        return Err(ValidationError::EmptyCommand);
    }

    let quotes = command.matches('"').count();
    if quotes % 2 != 0 || command.contains("\"\"") {
        return Err(ValidationError::UnbalancedQuotes(command.to_string()));
    }

    Ok(command)
}

/// Service name that runs `command` without a terminal
pub fn shell_service(command: &str) -> String {
    format!("{}{}", defaults::SHELL_SERVICE_PREFIX, command)
}
