use std::path::PathBuf;

use clap::Parser;
use siren_server::ServerConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve emergency sound predictions over HTTP", long_about = None)]
struct Cli {
    /// YAML file with server settings
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Interface to bind
    #[arg(long)]
    host: Option<String>,
    /// Port to bind
    #[arg(short, long)]
    port: Option<u16>,
    /// ONNX model loaded at startup
    #[arg(short, long)]
    model: Option<PathBuf>,
    /// Directory for transient uploads
    #[arg(long)]
    upload_dir: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_yaml_file(path)?,
            None => ServerConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(model) = self.model {
            config.model_path = model;
        }
        if let Some(upload_dir) = self.upload_dir {
            config.upload_dir = upload_dir;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Cli::parse().into_config()?;
    siren_server::run(config).await
}
