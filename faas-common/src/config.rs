//! Layered configuration loading: compiled-in default, overridden by an
//! optional TOML file, overridden by environment variables with a
//! binary-specific prefix (double underscore as the nesting separator).
//!
//! Grounded in the teacher's `ConfigLoader`/`HasConfigExamples` split: a
//! binary gets `make_config_loader()` and either loads normally or, when
//! `--dump-config` is passed, prints the effective config as TOML and exits.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A named example configuration, surfaced by `--dump-config` callers that
/// want to print more than just the bare default (currently unused by any
/// binary in this repository, but the trait is the documented extension
/// point, matching the teacher's `HasConfigExamples`).
pub struct ConfigExample<T> {
    pub name: &'static str,
    pub config: T,
}

pub trait HasConfigExamples<T> {
    fn examples() -> Vec<ConfigExample<T>>;
}

pub struct ConfigLoader<T> {
    pub config_file_name: PathBuf,
    env_prefix: &'static str,
    _marker: PhantomData<T>,
}

impl<T> ConfigLoader<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    /// `env_prefix` should end in an underscore, e.g. `"FAAS_GATEWAY_"`;
    /// figment's `Env::prefixed` combined with `.split("__")` gives nested
    /// keys like `FAAS_GATEWAY_DISPATCH__SUBMIT_DEADLINE`.
    pub fn new(config_file_name: impl AsRef<Path>, env_prefix: &'static str) -> ConfigLoader<T> {
        ConfigLoader {
            config_file_name: config_file_name.as_ref().to_path_buf(),
            env_prefix,
            _marker: PhantomData,
        }
    }

    pub fn load(&self) -> figment::Result<T> {
        let figment = Figment::from(Serialized::defaults(T::default()))
            .merge(Toml::file(&self.config_file_name))
            .merge(Env::prefixed(self.env_prefix).split("__"));
        figment.extract()
    }

    /// If invoked with `--dump-config`, prints the effective configuration
    /// (falling back to the file/env-less default on load error, so the
    /// flag never fails even with a broken config file) and returns `None`
    /// so the caller exits without starting any service. Otherwise loads
    /// normally and returns `Some`.
    pub fn load_or_dump_config(&self) -> Option<T> {
        if std::env::args().any(|arg| arg == "--dump-config") {
            let config = self.load().unwrap_or_default();
            match toml::to_string_pretty(&config) {
                Ok(toml) => println!("{toml}"),
                Err(error) => eprintln!("failed to render config as toml: {error}"),
            }
            None
        } else {
            match self.load() {
                Ok(config) => Some(config),
                Err(error) => {
                    eprintln!("failed to load config from {:?}: {error}", self.config_file_name);
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Inner {
        port: u16,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Example {
        name: String,
        inner: Inner,
    }

    #[test]
    fn defaults_apply_without_a_file() {
        let loader: ConfigLoader<Example> =
            ConfigLoader::new("/nonexistent/path/does-not-exist.toml", "FAAS_TEST_MISSING_");
        assert_eq!(loader.load().unwrap(), Example::default());
    }

    #[test]
    fn file_overrides_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"from-file\"\n[inner]\nport = 9000").unwrap();
        let loader: ConfigLoader<Example> =
            ConfigLoader::new(file.path(), "FAAS_TEST_FILE_OVERRIDE_");
        let loaded = loader.load().unwrap();
        assert_eq!(loaded.name, "from-file");
        assert_eq!(loaded.inner.port, 9000);
    }

    #[test]
    fn env_overrides_file_with_double_underscore_nesting() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"from-file\"\n[inner]\nport = 9000").unwrap();
        let loader: ConfigLoader<Example> = ConfigLoader::new(file.path(), "FAAS_TEST_ENV_");
        std::env::set_var("FAAS_TEST_ENV_INNER__PORT", "9500");
        let loaded = loader.load().unwrap();
        std::env::remove_var("FAAS_TEST_ENV_INNER__PORT");
        assert_eq!(loaded.inner.port, 9500);
    }
}
