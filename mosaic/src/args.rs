use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Mosaic image generation gateway
#[derive(Debug, Parser)]
#[command(name = "mosaic", about = "Fan one prompt out to many image generators")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "mosaic.toml", env = "MOSAIC_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "MOSAIC_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Log filter used when neither `RUST_LOG` nor the config sets one
    #[arg(long, default_value = "info", env = "MOSAIC_LOG")]
    pub log: String,
}
