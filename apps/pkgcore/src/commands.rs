//! Command execution

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pkgcore_config::Config;
use pkgcore_errors::Error;
use pkgcore_events::{EventEmitter, EventSender};
use pkgcore_fetch::{CacheNamer, Fetcher, Repository};
use pkgcore_hash::{Checksum, FileValidator};
use pkgcore_net::{NetConfig, RepoTransport};
use pkgcore_signing::{BackendRegistry, KeyParam, PassphraseProvider, Signature, SigningContext};
use pkgcore_types::Package;

use crate::cli::{Commands, FetchArgs, KeyArgs};
use crate::display::{CommandOutput, KeyInfoLine};
use crate::error::CliError;

/// Environment variable consulted for key passphrases
pub const PASSPHRASE_ENV: &str = "PKGCORE_PASSPHRASE";

const COMMAND_LINE_REPO: &str = "command-line";

/// Everything a command needs besides its arguments
pub struct CommandContext {
    config: Config,
    registry: BackendRegistry,
    events: EventSender,
}

impl EventEmitter for CommandContext {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(&self.events)
    }
}

impl CommandContext {
    pub fn new(config: Config, events: EventSender) -> Self {
        Self {
            config,
            registry: BackendRegistry::with_defaults(),
            events,
        }
    }

    /// Execute the specified command
    pub async fn execute(&self, command: Commands) -> Result<CommandOutput, CliError> {
        match command {
            Commands::Fetch(args) => self.fetch(&args, None).await,
            Commands::Mirror { package, dest } => self.fetch(&package, Some(&dest)).await,
            Commands::Keygen { key, seed } => self.keygen(&key, seed.as_deref()),
            Commands::Sign {
                key,
                digest,
                tag,
                output,
            } => self.sign(&key, &digest, tag, output).await,
            Commands::Verify {
                key,
                digest,
                signature,
                allow_legacy,
            } => self.verify(&key, &digest, &signature, allow_legacy).await,
            Commands::Pubkey { key } => self.public_key(&key),
            Commands::KeyInfo { key } => self.key_info(&key),
        }
    }

    async fn fetch(&self, args: &FetchArgs, dest: Option<&Path>) -> Result<CommandOutput, CliError> {
        let repo = self.repository(args)?;
        if let (Some(digest), Some(signature)) = (&args.catalog_digest, &args.catalog_signature) {
            let raw = tokio::fs::read(signature).await?;
            repo.verify_catalog(digest, &raw, self.config.signing.allow_legacy)?;
        }

        let sum = Checksum::parse(&args.sum)?;
        let package = Package::remote(
            args.name.as_str(),
            args.version.as_str(),
            args.repopath.as_str(),
            args.size,
            sum,
        );

        let transport = RepoTransport::from_config(NetConfig::from(&self.config.network))?;
        let fetcher = Fetcher::new(
            CacheNamer::new(self.config.cache_dir()),
            transport,
            FileValidator,
        )
        .with_event_sender(self.events.clone());

        let fetched = match dest {
            Some(dir) => fetcher.mirror(&repo, &package, dir).await?,
            None => fetcher.fetch(&repo, &package).await?,
        };

        Ok(CommandOutput::Fetched {
            package: package.id.to_string(),
            path: fetched.path,
            link: fetched.link,
            transferred: fetched.transferred,
            retried: fetched.retried,
        })
    }

    fn repository(&self, args: &FetchArgs) -> Result<Repository, CliError> {
        match (&args.repo, &args.url) {
            (Some(name), _) => {
                let config = self.config.repository(name)?;
                if !config.enabled {
                    self.emit_warning(format!("repository {name} is disabled in the configuration"));
                }
                Ok(Repository::from_config(
                    name,
                    config,
                    &self.config.signing.backend,
                    &self.registry,
                )?)
            }
            (None, Some(url)) => Ok(Repository::new(COMMAND_LINE_REPO, url.as_str())),
            (None, None) => Err(CliError::InvalidArguments(
                "pass --repo or --url".to_string(),
            )),
        }
    }

    fn keygen(&self, key: &KeyArgs, seed: Option<&str>) -> Result<CommandOutput, CliError> {
        let mut params = Vec::new();
        if let Some(seed) = seed {
            let bytes = hex::decode(seed)
                .map_err(|e| CliError::InvalidArguments(format!("seed is not hex: {e}")))?;
            params.push(KeyParam::new("seed", bytes));
        }

        let mut context = self.open_for_signing(key)?;
        context.generate(&params)?;
        Ok(CommandOutput::KeyGenerated {
            backend: context.backend_name().to_string(),
            key_path: context.key_path().to_path_buf(),
        })
    }

    async fn sign(
        &self,
        key: &KeyArgs,
        digest: &str,
        tag: bool,
        output: Option<PathBuf>,
    ) -> Result<CommandOutput, CliError> {
        let context = self.open_for_signing(key)?;
        let signature = context.sign(digest)?;
        let backend = context.backend_name().to_string();
        context.close();

        let bytes = if tag {
            signature.encode()
        } else {
            signature.into_payload()
        };
        if let Some(path) = &output {
            tokio::fs::write(path, &bytes).await?;
        }

        Ok(CommandOutput::Signature {
            backend,
            tagged: tag,
            signature: String::from_utf8_lossy(&bytes).into_owned(),
            output,
        })
    }

    async fn verify(
        &self,
        key: &KeyArgs,
        digest: &str,
        signature_path: &Path,
        allow_legacy: bool,
    ) -> Result<CommandOutput, CliError> {
        let raw = tokio::fs::read(signature_path).await?;
        let signature = Signature::parse(&raw)?;
        let allow_legacy = allow_legacy || self.config.signing.allow_legacy;

        // An explicit --backend must agree with the signature's own marker
        let backend = key
            .backend
            .as_deref()
            .or(signature.backend())
            .unwrap_or(&self.config.signing.backend)
            .to_string();
        let key_path = self.key_path(key)?;
        let context = SigningContext::new_for_verification(&self.registry, &backend, key_path)?
            .with_event_sender(self.events.clone());
        context.verify(digest, &signature, allow_legacy)?;

        Ok(CommandOutput::Verified {
            backend,
            legacy_allowed: allow_legacy,
        })
    }

    fn public_key(&self, key: &KeyArgs) -> Result<CommandOutput, CliError> {
        let context = self.open_for_verification(key)?;
        let public_key = context.public_key()?;
        Ok(CommandOutput::PublicKey {
            backend: context.backend_name().to_string(),
            public_key: String::from_utf8_lossy(&public_key).into_owned(),
        })
    }

    fn key_info(&self, key: &KeyArgs) -> Result<CommandOutput, CliError> {
        let context = self.open_for_verification(key)?;
        let entries = context
            .key_info()?
            .into_iter()
            .map(|entry| KeyInfoLine {
                name: entry.name,
                value: entry.value,
            })
            .collect();
        Ok(CommandOutput::KeyInfo {
            backend: context.backend_name().to_string(),
            entries,
        })
    }

    fn open_for_signing(&self, key: &KeyArgs) -> Result<SigningContext, CliError> {
        let context =
            SigningContext::new_for_signing(&self.registry, self.backend(key), self.key_path(key)?)?;
        Ok(context
            .with_passphrase(passphrase_from_env())
            .with_event_sender(self.events.clone()))
    }

    fn open_for_verification(&self, key: &KeyArgs) -> Result<SigningContext, CliError> {
        let context = SigningContext::new_for_verification(
            &self.registry,
            self.backend(key),
            self.key_path(key)?,
        )?;
        Ok(context
            .with_passphrase(passphrase_from_env())
            .with_event_sender(self.events.clone()))
    }

    fn backend<'a>(&'a self, key: &'a KeyArgs) -> &'a str {
        key.backend
            .as_deref()
            .unwrap_or(&self.config.signing.backend)
    }

    fn key_path(&self, key: &KeyArgs) -> Result<PathBuf, CliError> {
        key.key
            .clone()
            .or_else(|| self.config.signing.key_path.clone())
            .ok_or_else(|| {
                CliError::InvalidArguments(
                    "no key given; pass --key or set [signing].key_path".to_string(),
                )
            })
    }
}

/// Passphrases come from the environment; no terminal prompt is offered
fn passphrase_from_env() -> Arc<dyn PassphraseProvider> {
    Arc::new(|_: &Path, _: bool| -> Result<Option<String>, Error> {
        Ok(std::env::var(PASSPHRASE_ENV).ok())
    })
}
