use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use siren_audio::SpectrogramConfig;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    /// Directory holding uploads while they are processed.
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub intra_threads: usize,
    pub spectrogram: SpectrogramConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            model_path: PathBuf::from("mobilenet_model.onnx"),
            upload_dir: PathBuf::from("temp"),
            max_upload_bytes: 25 * 1024 * 1024,
            intra_threads: 1,
            spectrogram: SpectrogramConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parse server config")
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        Self::from_yaml_str(&text)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("invalid host address {:?}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
