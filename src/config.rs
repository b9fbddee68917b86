use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, de};

/// The format used to represent the configuration data.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Format {
    Json,
    #[default]
    Yaml,
}

impl Format {
    pub fn from_path<T: AsRef<Path>>(path: T) -> Result<Self, T> {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            Some("json") => Ok(Format::Json),
            _ => Err(path),
        }
    }
}

/// Parse `content` in the given format, YAML when there is no hint.
pub fn deserialize<T>(content: &str, format: Option<Format>) -> Result<T, Vec<String>>
where
    T: de::DeserializeOwned,
{
    match format.unwrap_or_default() {
        Format::Yaml => serde_yaml::from_str(content).map_err(|err| vec![err.to_string()]),
        Format::Json => serde_json::from_str(content).map_err(|err| vec![err.to_string()]),
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 6343)
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The address to receive datagrams on.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Configures the receive buffer size using the "SO_RCVBUF" option on the socket.
    #[serde(default, with = "humanize::bytes::serde_option")]
    pub receive_buffer_bytes: Option<usize>,

    /// Print every datagram as indented JSON.
    #[serde(default)]
    pub pretty: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: default_listen(),
            receive_buffer_bytes: None,
            pretty: false,
        }
    }
}

impl Config {
    /// Load from a file, the format is taken from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, Vec<String>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|err| vec![format!("read config file {path:?} failed, {err}")])?;

        deserialize(&content, Format::from_path(path).ok())
    }
}
