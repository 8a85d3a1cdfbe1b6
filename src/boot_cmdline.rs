//! Helpers for the kernel command lines measured by the boot loader.
use regex::Regex;

use crate::config::ConfigError;

/// Command lines containing this are not recorded
pub const DEFAULT_REDACT_MARKER: &str = "no-auto-partition";
/// Key of the boot identifier on the command line
pub const DEFAULT_IDENTIFIER_KEY: &str = "bootUUID";

type Result<T> = core::result::Result<T, ConfigError>;

/// Redact boot command lines and extract the boot identifier from them.
#[derive(Debug, Clone)]
pub struct CommandLineSanitizer {
    redact_markers: Vec<String>,
    identifier: Regex,
}

impl Default for CommandLineSanitizer {
    fn default() -> Self {
        Self::new(vec![DEFAULT_REDACT_MARKER.to_string()], DEFAULT_IDENTIFIER_KEY)
            .unwrap_or_else(|_| unreachable!())
    }
}

impl CommandLineSanitizer {
    /// Create a sanitizer. A command line containing any of `redact_markers`
    /// is erased, and the identifier is the hex value following
    /// `<identifier_key>=`.
    pub fn new(redact_markers: Vec<String>, identifier_key: &str) -> Result<Self> {
        if identifier_key.is_empty() {
            return Err(ConfigError::Invalid("empty identifier key".to_string()));
        }
        // The whole line must match, the leading .* being greedy the last
        // occurrence of the key wins.
        let pattern = format!(r"^.*{}=([a-fA-F0-9]+).*$", regex::escape(identifier_key));
        let identifier = Regex::new(&pattern)
            .map_err(|e| ConfigError::Invalid(format!("identifier key: {e}")))?;

        Ok(CommandLineSanitizer {
            redact_markers,
            identifier,
        })
    }

    /// Return the command line, or an empty string if it contains one of the
    /// redaction markers.
    pub fn sanitize<'a>(&self, command_line: &'a str) -> &'a str {
        if self
            .redact_markers
            .iter()
            .any(|m| !m.is_empty() && command_line.contains(m.as_str()))
        {
            return "";
        }
        command_line
    }

    /// Return the hex identifier following the identifier key, if any.
    pub fn extract_identifier<'a>(&self, command_line: &'a str) -> Option<&'a str> {
        self.identifier
            .captures(command_line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}
