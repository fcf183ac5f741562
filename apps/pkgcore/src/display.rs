//! Output rendering and formatting

use pkgcore_types::OutputFormat;
use serde::Serialize;
use std::io;
use std::path::PathBuf;

/// Result of a command, rendered once the command finishes
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutput {
    Fetched {
        package: String,
        path: PathBuf,
        link: Option<PathBuf>,
        transferred: u64,
        retried: bool,
    },
    KeyGenerated {
        backend: String,
        key_path: PathBuf,
    },
    Signature {
        backend: String,
        tagged: bool,
        signature: String,
        output: Option<PathBuf>,
    },
    Verified {
        backend: String,
        legacy_allowed: bool,
    },
    PublicKey {
        backend: String,
        public_key: String,
    },
    KeyInfo {
        backend: String,
        entries: Vec<KeyInfoLine>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyInfoLine {
    pub name: String,
    pub value: String,
}

/// Output renderer for CLI results
#[derive(Clone, Copy)]
pub struct OutputRenderer {
    format: OutputFormat,
}

impl OutputRenderer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render operation result
    pub fn render_result(&self, result: &CommandOutput) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => Self::render_json(result),
            OutputFormat::Tty => {
                Self::render_text(result);
                Ok(())
            }
        }
    }

    fn render_json(result: &CommandOutput) -> io::Result<()> {
        let json = serde_json::to_string(result).map_err(io::Error::other)?;
        println!("{json}");
        Ok(())
    }

    fn render_text(result: &CommandOutput) {
        match result {
            CommandOutput::Fetched {
                package,
                path,
                link,
                transferred,
                retried,
            } => {
                println!("{package}: {}", path.display());
                if let Some(link) = link {
                    println!("  link: {}", link.display());
                }
                println!("  transferred: {transferred} bytes");
                if *retried {
                    println!("  stale cache entry was replaced");
                }
            }
            CommandOutput::KeyGenerated { backend, key_path } => {
                println!("Generated {backend} key at {}", key_path.display());
            }
            CommandOutput::Signature {
                signature, output, ..
            } => match output {
                Some(path) => println!("Signature written to {}", path.display()),
                None => println!("{signature}"),
            },
            CommandOutput::Verified {
                backend,
                legacy_allowed,
            } => {
                if *legacy_allowed {
                    println!("Signature OK ({backend}, legacy accepted)");
                } else {
                    println!("Signature OK ({backend})");
                }
            }
            CommandOutput::PublicKey { public_key, .. } => {
                println!("{}", public_key.trim_end());
            }
            CommandOutput::KeyInfo { backend, entries } => {
                println!("backend: {backend}");
                for entry in entries {
                    println!("{}: {}", entry.name, entry.value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let output = CommandOutput::Verified {
            backend: "minisign".to_string(),
            legacy_allowed: false,
        };
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["kind"], "verified");
        assert_eq!(value["backend"], "minisign");
    }
}
