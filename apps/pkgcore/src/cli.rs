//! Command line interface definition

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// pkgcore - signed, resumable package retrieval
#[derive(Parser)]
#[command(name = "pkgcore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetch, verify and sign binary packages")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the cache directory
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch a package into the cache
    Fetch(FetchArgs),

    /// Fetch a package into a mirror directory
    Mirror {
        #[command(flatten)]
        package: FetchArgs,

        /// Directory that receives `<repopath>`
        #[arg(long, value_name = "DIR")]
        dest: PathBuf,
    },

    /// Generate a new key pair
    Keygen {
        #[command(flatten)]
        key: KeyArgs,

        /// Hex-encoded seed for deterministic keys (ed25519 only)
        #[arg(long, value_name = "HEX")]
        seed: Option<String>,
    },

    /// Sign checksum text
    Sign {
        #[command(flatten)]
        key: KeyArgs,

        /// Hex checksum to sign
        #[arg(long)]
        digest: String,

        /// Prefix the signature with its `$PKGSIGN:<backend>$` marker
        #[arg(long)]
        tag: bool,

        /// Write the signature here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Verify a detached signature over checksum text
    Verify {
        #[command(flatten)]
        key: KeyArgs,

        /// Hex checksum the signature covers
        #[arg(long)]
        digest: String,

        /// Signature file
        #[arg(long, value_name = "FILE")]
        signature: PathBuf,

        /// Accept signatures in the legacy encoding
        #[arg(long)]
        allow_legacy: bool,
    },

    /// Print the exportable public key
    Pubkey {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Describe the key
    #[command(name = "key-info")]
    KeyInfo {
        #[command(flatten)]
        key: KeyArgs,
    },
}

/// Package and repository selection shared by `fetch` and `mirror`
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Configured repository name
    #[arg(long, conflicts_with = "url", required_unless_present = "url")]
    pub repo: Option<String>,

    /// Repository base URL (`https://`, `http://` or `file:`)
    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub version: String,

    /// Artifact path relative to the repository URL
    #[arg(long)]
    pub repopath: String,

    /// Expected size in bytes
    #[arg(long)]
    pub size: u64,

    /// Expected checksum (`sha256:<hex>`, `blake3:<hex>` or bare hex)
    #[arg(long)]
    pub sum: String,

    /// Catalog checksum to authenticate before fetching
    #[arg(long, requires = "catalog_signature")]
    pub catalog_digest: Option<String>,

    /// Catalog signature file
    #[arg(long, value_name = "FILE", requires = "catalog_digest")]
    pub catalog_signature: Option<PathBuf>,
}

/// Backend and key selection; both fall back to `[signing]` in the config
#[derive(Args, Debug, Clone)]
pub struct KeyArgs {
    #[arg(long)]
    pub backend: Option<String>,

    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,
}

impl Commands {
    /// Short name used for operation events
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Mirror { .. } => "mirror",
            Self::Keygen { .. } => "keygen",
            Self::Sign { .. } => "sign",
            Self::Verify { .. } => "verify",
            Self::Pubkey { .. } => "pubkey",
            Self::KeyInfo { .. } => "key-info",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_requires_repository() {
        let parsed = Cli::try_parse_from([
            "pkgcore", "fetch", "--name", "foo", "--version", "1.2", "--repopath",
            "All/foo-1.2.pkg", "--size", "1000", "--sum", "abc123",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_mirror_arguments() {
        let cli = Cli::try_parse_from([
            "pkgcore", "--json", "mirror", "--url", "https://pkg.example.org", "--name", "foo",
            "--version", "1.2", "--repopath", "All/foo-1.2.pkg", "--size", "1000", "--sum",
            "abc123", "--dest", "/tmp/out",
        ])
        .unwrap();
        assert!(cli.global.json);
        match cli.command {
            Commands::Mirror { package, dest } => {
                assert_eq!(package.url.as_deref(), Some("https://pkg.example.org"));
                assert_eq!(dest, PathBuf::from("/tmp/out"));
            }
            _ => panic!("expected mirror"),
        }
    }

    #[test]
    fn test_catalog_arguments_come_in_pairs() {
        let parsed = Cli::try_parse_from([
            "pkgcore", "fetch", "--repo", "main", "--name", "foo", "--version", "1.2",
            "--repopath", "All/foo-1.2.pkg", "--size", "1000", "--sum", "abc123",
            "--catalog-digest", "abc",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_verify_arguments() {
        let cli = Cli::try_parse_from([
            "pkgcore", "verify", "--backend", "ed25519", "--key", "repo.pub", "--digest",
            "abc123", "--signature", "sig", "--allow-legacy",
        ])
        .unwrap();
        assert_eq!(cli.command.operation(), "verify");
        match cli.command {
            Commands::Verify {
                key, allow_legacy, ..
            } => {
                assert_eq!(key.backend.as_deref(), Some("ed25519"));
                assert!(allow_legacy);
            }
            _ => panic!("expected verify"),
        }
    }
}
