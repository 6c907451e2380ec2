use std::path::PathBuf;

use clap::Parser;

/// CLI flags override environment variables, which override `.env` file values,
/// which override the compiled-in defaults.
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Root directory downloads are placed under (DOWNLOAD_LOCATION)
    #[arg(long)]
    pub download_location: Option<PathBuf>,
    /// Sqlite connection string (DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,
    /// Size of the download worker pool (MAX_CONCURRENT_DOWNLOADS)
    #[arg(long)]
    pub max_concurrent_downloads: Option<usize>,
    /// HTTP port to listen on (SERVER_PORT)
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub download_location: PathBuf,
    pub database_url: String,
    pub max_concurrent_downloads: usize,
    pub server_port: u16,
}

const DEFAULT_DATABASE_URL: &str = "sqlite://downloads.sqlite";
const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 1;
const DEFAULT_SERVER_PORT: u16 = 8080;

impl Config {
    /// Loads `.env` (if present), then layers env vars and CLI args on top of the defaults.
    pub fn load(args: Args) -> anyhow::Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {e}");
        }

        let download_location = args
            .download_location
            .or_else(|| std::env::var("DOWNLOAD_LOCATION").ok().map(PathBuf::from))
            .ok_or_else(|| anyhow::anyhow!("DOWNLOAD_LOCATION must be set"))?;

        let database_url = args
            .database_url
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let max_concurrent_downloads = args
            .max_concurrent_downloads
            .or_else(|| {
                std::env::var("MAX_CONCURRENT_DOWNLOADS")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(DEFAULT_MAX_CONCURRENT_DOWNLOADS);

        let server_port = args
            .port
            .or_else(|| std::env::var("SERVER_PORT").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(DEFAULT_SERVER_PORT);

        Ok(Self {
            download_location,
            database_url,
            max_concurrent_downloads,
            server_port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_args_take_full_precedence() {
        let args = Args {
            download_location: Some(PathBuf::from("/data/downloads")),
            database_url: Some("sqlite://custom.sqlite".to_string()),
            max_concurrent_downloads: Some(4),
            port: Some(9000),
        };
        let config = Config::load(args).unwrap();
        assert_eq!(config.download_location, PathBuf::from("/data/downloads"));
        assert_eq!(config.database_url, "sqlite://custom.sqlite");
        assert_eq!(config.max_concurrent_downloads, 4);
        assert_eq!(config.server_port, 9000);
    }

    #[test]
    fn missing_download_location_is_an_error() {
        // SAFETY: no other test reads or writes DOWNLOAD_LOCATION.
        unsafe {
            std::env::remove_var("DOWNLOAD_LOCATION");
        }
        let args = Args {
            download_location: None,
            database_url: None,
            max_concurrent_downloads: None,
            port: None,
        };
        assert!(Config::load(args).is_err());
    }
}
