//! Console config files (`.cfg`): one console command per line.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::command::ConsoleLine;
use crate::console::{Console, UnbindTarget};
use crate::error::ConfigError;
use crate::trigger::Trigger;

/// Deepest chain of `exec` lines followed before giving up.
pub const MAX_EXEC_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigScript {
    origin: Option<PathBuf>,
    lines: Vec<String>,
}

/// A line that could not be applied.
#[derive(Debug)]
pub struct LineFailure {
    pub origin: String,
    /// 1-based.
    pub line: usize,
    pub text: String,
    pub error: ConfigError,
}

#[derive(Debug, Default)]
pub struct ConfigReport {
    /// Lines that ran successfully, comments excluded.
    pub applied: usize,
    pub failures: Vec<LineFailure>,
}

impl ConfigReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl ConfigScript {
    pub fn load(path: impl AsRef<Path>) -> Result<ConfigScript, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut script = ConfigScript::from_source(&source);
        script.origin = Some(path.to_path_buf());
        Ok(script)
    }

    pub fn from_source(source: &str) -> ConfigScript {
        ConfigScript {
            origin: None,
            lines: source.lines().map(str::to_string).collect(),
        }
    }

    /// Run every line against `console`. Failing lines are logged and
    /// recorded; the rest of the script still runs.
    pub fn apply(&self, console: &mut impl Console) -> ConfigReport {
        let mut report = ConfigReport::default();
        self.apply_nested(console, 0, &mut report);
        debug!(
            "config {}: {} line(s) applied, {} failed",
            self.origin_label(),
            report.applied,
            report.failures.len()
        );
        report
    }

    fn apply_nested(&self, console: &mut impl Console, depth: usize, report: &mut ConfigReport) {
        for (index, text) in self.lines.iter().enumerate() {
            match self.apply_line(console, text, depth, report) {
                Ok(true) => report.applied += 1,
                Ok(false) => {}
                Err(error) => {
                    let failure = LineFailure {
                        origin: self.origin_label(),
                        line: index + 1,
                        text: text.trim().to_string(),
                        error,
                    };
                    warn!(
                        "{}:{}: `{}` failed: {}",
                        failure.origin, failure.line, failure.text, failure.error
                    );
                    report.failures.push(failure);
                }
            }
        }
    }

    /// Returns whether the line did anything.
    fn apply_line(
        &self,
        console: &mut impl Console,
        text: &str,
        depth: usize,
        report: &mut ConfigReport,
    ) -> Result<bool, ConfigError> {
        match ConsoleLine::parse(text)? {
            ConsoleLine::Blank => Ok(false),
            ConsoleLine::Bind { key, command } => {
                let trigger = Trigger::parse(&key)?;
                console.bind(trigger, &command)?;
                Ok(true)
            }
            ConsoleLine::BindQuery { key } => {
                let trigger = Trigger::parse(&key)?;
                console.bound_to(trigger);
                Ok(true)
            }
            ConsoleLine::Unbind { target } => {
                let target = UnbindTarget::parse(&target)?;
                console.unbind(&target);
                Ok(true)
            }
            ConsoleLine::Exec { path } => {
                if depth + 1 >= MAX_EXEC_DEPTH {
                    return Err(ConfigError::ExecDepth(MAX_EXEC_DEPTH));
                }
                let nested = ConfigScript::load(self.resolve(&path))?;
                nested.apply_nested(console, depth + 1, report);
                Ok(true)
            }
            ConsoleLine::Other(command) => {
                console.run(&command);
                Ok(true)
            }
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match self.origin.as_deref().and_then(Path::parent) {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn origin_label(&self) -> String {
        self.origin
            .as_deref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<console>".to_string())
    }
}
