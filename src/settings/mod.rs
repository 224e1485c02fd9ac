use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::path::PathBuf;

pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

pub const DEFAULT_PORT: u16 = 53;

pub const DEFAULT_WORKERS: NonZeroUsize = match NonZeroUsize::new(1) {
    Some(n) => n,
    None => unreachable!(),
};

/// Server settings, from a configuration file or the command line.
/// Anything left unset falls back to another source or a default.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub db: Option<PathBuf>,
    #[serde(default)]
    pub host: Option<IpAddr>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub workers: Option<NonZeroUsize>,
}

/// Settings with every field filled in.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ServerSettings {
    pub db: PathBuf,
    pub address: SocketAddr,
    pub workers: NonZeroUsize,
}

impl Settings {
    /// Read settings from a file, the format is picked from the
    /// extension.
    ///
    /// # Errors
    ///
    /// If the file cannot be read or does not contain valid settings.
    pub fn new(filename: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(filename))
            .build()?
            .try_deserialize()
    }

    /// # Errors
    ///
    /// If the string does not contain valid settings.
    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(data, FileFormat::Yaml))
            .build()?
            .try_deserialize()
    }

    /// Fill in anything unset in `self` from `fallback`.
    pub fn or(self, fallback: Settings) -> Settings {
        Settings {
            db: self.db.or(fallback.db),
            host: self.host.or(fallback.host),
            port: self.port.or(fallback.port),
            workers: self.workers.or(fallback.workers),
        }
    }

    /// Apply the defaults.  There is no default database, so this is
    /// `None` if `db` is unset.
    pub fn resolve(self) -> Option<ServerSettings> {
        Some(ServerSettings {
            db: self.db?,
            address: SocketAddr::new(
                self.host.unwrap_or(DEFAULT_HOST),
                self.port.unwrap_or(DEFAULT_PORT),
            ),
            workers: self.workers.unwrap_or(DEFAULT_WORKERS),
        })
    }
}
