use std::path::PathBuf;

use thiserror::Error;

/// Problems with the text of a bind command or console line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("command is empty")]
    EmptyCommand,
    #[error("action reference `$` is missing a name")]
    MissingActionName,
    #[error("action name {0:?} contains whitespace or quotes")]
    InvalidActionName(String),
    #[error("unterminated quote in {0:?}")]
    UnterminatedQuote(String),
    #[error("`{command}` requires {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },
}

/// Error conditions returned by the binding table.
///
/// None of these leave the table half-modified: a failed call is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("malformed command: {0}")]
    Parse(#[from] ParseError),
    #[error("no action named {name:?} is registered")]
    UnknownAction { name: String },
    #[error("unknown key name {name:?}")]
    UnknownKey { name: String },
    #[error("action names must not be empty")]
    InvalidName,
}

/// Failures while loading or executing a config script.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error("exec nesting deeper than {0} levels")]
    ExecDepth(usize),
}

impl From<ParseError> for ConfigError {
    fn from(err: ParseError) -> Self {
        ConfigError::Bind(BindError::Parse(err))
    }
}
