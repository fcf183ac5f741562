//! Integration tests for config

#[cfg(test)]
mod tests {
    use pkgcore_config::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_VARS: [&str; 4] = [
        "PKGCORE_CACHE_DIR",
        "PKGCORE_SIGNING_BACKEND",
        "PKGCORE_ALLOW_LEGACY_SIGNATURES",
        "PKGCORE_TIMEOUT",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[paths]
cache_dir = "/tmp/pkgcore-cache"

[network]
timeout = 60

[signing]
backend = "ed25519"
allow_legacy = true

[repositories.main]
url = "https://pkgs.example.org/All"
public_key = "/etc/pkgcore/keys/main.pub"

[repositories.local]
url = "file:///srv/packages"
signing_backend = "minisign"
enabled = false
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/pkgcore-cache"));
        assert_eq!(config.network.timeout, 60);
        assert_eq!(config.network.connect_timeout, 30);
        assert!(config.signing.allow_legacy);

        let main = config.repository("main").unwrap();
        assert!(main.enabled);
        assert_eq!(config.signing_backend_for(main), "ed25519");

        let local = config.repository("local").unwrap();
        assert_eq!(config.signing_backend_for(local), "minisign");

        let enabled: Vec<_> = config.enabled_repositories().map(|(n, _)| n).collect();
        assert_eq!(enabled, vec!["main"]);

        assert!(config.repository("missing").is_err());
    }

    #[tokio::test]
    async fn test_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[paths\ncache_dir = 3").unwrap();
        assert!(Config::load_from_file(temp_file.path()).await.is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_dir(), PathBuf::from(constants::DEFAULT_CACHE_DIR));
        assert_eq!(config.signing.backend, "minisign");
        assert!(!config.signing.allow_legacy);
        assert!(config.repositories.is_empty());
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("PKGCORE_CACHE_DIR", "/srv/cache");
        std::env::set_var("PKGCORE_SIGNING_BACKEND", "ed25519");
        std::env::set_var("PKGCORE_ALLOW_LEGACY_SIGNATURES", "yes");
        std::env::set_var("PKGCORE_TIMEOUT", "12");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(config.cache_dir(), PathBuf::from("/srv/cache"));
        assert_eq!(config.signing.backend, "ed25519");
        assert!(config.signing.allow_legacy);
        assert_eq!(config.network.timeout, 12);

        clear_env();
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("PKGCORE_ALLOW_LEGACY_SIGNATURES", "sometimes");
        let mut config = Config::default();
        assert!(config.merge_env().is_err());
        clear_env();

        std::env::set_var("PKGCORE_TIMEOUT", "soon");
        let mut config = Config::default();
        assert!(config.merge_env().is_err());
        clear_env();
    }
}
