//! Fixed defaults for pkgcore

pub const DEFAULT_CACHE_DIR: &str = "/var/cache/pkgcore/packages";

pub const DEFAULT_SIGNING_BACKEND: &str = "minisign";

pub const CONFIG_FILE_NAME: &str = "config.toml";
