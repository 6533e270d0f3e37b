//! Parsing of bind commands and console lines.

use crate::error::ParseError;

/// Marks a bind command as a reference to an already registered action.
pub const ACTION_REFERENCE_PREFIX: char = '$';

/// The right-hand side of `bind "key" "command"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindCommand {
    /// `$Name`: attach the key to the registered action `Name`.
    Reference(String),
    /// Anything else: a console command to run whenever the key is pressed.
    Literal(String),
}

impl BindCommand {
    pub fn parse(command: &str) -> Result<BindCommand, ParseError> {
        let command = command.trim();
        if command.is_empty() {
            return Err(ParseError::EmptyCommand);
        }
        if let Some(name) = command.strip_prefix(ACTION_REFERENCE_PREFIX) {
            if name.is_empty() {
                return Err(ParseError::MissingActionName);
            }
            if !is_valid_action_name(name) {
                return Err(ParseError::InvalidActionName(name.to_string()));
            }
            return Ok(BindCommand::Reference(name.to_string()));
        }
        Ok(BindCommand::Literal(command.to_string()))
    }
}

/// Action names must survive a round trip through `bind "key" "$Name"`, so
/// they cannot contain whitespace or quotes.
pub(crate) fn is_valid_action_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c.is_whitespace() || c == '"')
}

/// Split a console line into parameters.
///
/// Words are separated by whitespace; double quotes group words and support
/// the `\"`, `\\`, `\n` and `\t` escapes.
pub fn split_parameters(line: &str) -> Result<Vec<String>, ParseError> {
    let mut params = Vec::new();
    let mut current = String::new();
    let mut has_token = false;
    let mut in_quotes = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            '\\' if in_quotes => match chars.next() {
                Some('n') => current.push('\n'),
                Some('t') => current.push('\t'),
                Some('"') => current.push('"'),
                Some('\\') => current.push('\\'),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            },
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    params.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if in_quotes {
        return Err(ParseError::UnterminatedQuote(line.to_string()));
    }
    if has_token {
        params.push(current);
    }
    Ok(params)
}

/// One line of a `.cfg` file or console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    /// Empty line or comment (`#` / `//`).
    Blank,
    Bind { key: String, command: String },
    /// `bind "key"` without a command reports what the key is bound to.
    BindQuery { key: String },
    /// `unbind "all"`, `unbind "SDLK_x"` or `unbind "ActionName"`.
    Unbind { target: String },
    Exec { path: String },
    /// Any other console command, run as-is.
    Other(String),
}

impl ConsoleLine {
    pub fn parse(line: &str) -> Result<ConsoleLine, ParseError> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
            return Ok(ConsoleLine::Blank);
        }

        let mut params = split_parameters(trimmed)?.into_iter();
        let Some(head) = params.next() else {
            return Ok(ConsoleLine::Blank);
        };

        match head.as_str() {
            "bind" => {
                let key = params.next().ok_or(ParseError::MissingArgument {
                    command: "bind",
                    expected: "a key",
                })?;
                Ok(match params.next() {
                    Some(command) => ConsoleLine::Bind { key, command },
                    None => ConsoleLine::BindQuery { key },
                })
            }
            "unbind" => {
                let target = params.next().ok_or(ParseError::MissingArgument {
                    command: "unbind",
                    expected: "a key, an action name or \"all\"",
                })?;
                Ok(ConsoleLine::Unbind { target })
            }
            "exec" => {
                let path = params.next().ok_or(ParseError::MissingArgument {
                    command: "exec",
                    expected: "a config file",
                })?;
                Ok(ConsoleLine::Exec { path })
            }
            _ => Ok(ConsoleLine::Other(trimmed.to_string())),
        }
    }
}
