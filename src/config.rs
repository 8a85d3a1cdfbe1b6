///
/// Configuration of the manifest assembly, loaded from TOML files and
/// overridden from the command line.
///
use std::fs;

use serde::Deserialize;

use crate::boot_cmdline::{CommandLineSanitizer, DEFAULT_IDENTIFIER_KEY, DEFAULT_REDACT_MARKER};
use crate::command_line::Args;

#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum ConfigError {
    #[error("file {filename} error: {e}")]
    File { e: std::io::Error, filename: String },

    #[error("cannot parse {filename}: {e}")]
    Parse {
        e: toml::de::Error,
        filename: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
type Result<T> = core::result::Result<T, ConfigError>;

/// Command line event settings
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct CommandLineConfig {
    /// Additional redaction markers
    #[serde(default)]
    pub redact_markers: Vec<String>,
    /// Key of the boot identifier
    pub identifier_key: Option<String>,
}

/// Assembly settings
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssemblyConfig {
    /// Skip entries with an invalid PCR index instead of failing
    pub lenient: Option<bool>,
}

/// Full configuration. Files are applied in order, each one overlaying the
/// previous ones.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct AssemblerConfig {
    /// Command line event settings
    #[serde(default)]
    pub command_line: CommandLineConfig,
    /// Assembly settings
    #[serde(default)]
    pub assembly: AssemblyConfig,
}

impl AssemblerConfig {
    /// Create a configuration from command-line arguments: load the config
    /// files then apply the flags.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = AssemblerConfig::default();

        for filename in &args.config {
            config.load_config(filename)?;
        }

        config.update(&AssemblerConfig {
            command_line: CommandLineConfig {
                redact_markers: args.redact_marker.clone(),
                identifier_key: args.identifier_key.clone(),
            },
            assembly: AssemblyConfig {
                lenient: args.lenient.then_some(true),
            },
        });
        log::debug!("config: {config:?}");
        Ok(config)
    }

    /// Overlay the TOML file `filename`
    pub fn load_config(&mut self, filename: &str) -> Result<()> {
        let content = fs::read_to_string(filename).map_err(|e| ConfigError::File {
            filename: filename.to_string(),
            e,
        })?;
        let other: AssemblerConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            filename: filename.to_string(),
            e,
        })?;
        self.update(&other);
        Ok(())
    }

    /// Overlay `other`: markers are added, other values replaced when set.
    pub fn update(&mut self, other: &AssemblerConfig) {
        for m in &other.command_line.redact_markers {
            if !self.command_line.redact_markers.contains(m) {
                self.command_line.redact_markers.push(m.clone());
            }
        }
        if other.command_line.identifier_key.is_some() {
            self.command_line
                .identifier_key
                .clone_from(&other.command_line.identifier_key);
        }
        if other.assembly.lenient.is_some() {
            self.assembly.lenient = other.assembly.lenient;
        }
    }

    /// Build the command line sanitizer. The default marker is always
    /// included.
    pub fn sanitizer(&self) -> Result<CommandLineSanitizer> {
        let mut markers = vec![DEFAULT_REDACT_MARKER.to_string()];
        for m in &self.command_line.redact_markers {
            if !markers.contains(m) {
                markers.push(m.clone());
            }
        }
        let key = self
            .command_line
            .identifier_key
            .as_deref()
            .unwrap_or(DEFAULT_IDENTIFIER_KEY);
        CommandLineSanitizer::new(markers, key)
    }

    /// True if invalid PCR indices are skipped
    pub fn lenient(&self) -> bool {
        self.assembly.lenient.unwrap_or(false)
    }
}
