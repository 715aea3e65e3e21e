//! Command line configuration.

use crate::modules::ModuleOptions;
use crate::types::{HttpConfig, Result, ScanError};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Prober for exposed Symfony web profilers.
#[derive(Parser, Debug, Clone)]
#[command(name = "symprobe")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log with timestamps
    #[arg(long, global = true)]
    pub timestamps: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_colors: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Perform a full scan
    Scan(ScanConfig),
    /// Download the application source code
    Sources(ScanConfig),
    /// Look for credentials in the request logs
    Creds(ScanConfig),
    /// Download one file from the application
    Get(GetConfig),
}

/// Target and HTTP options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Target URL
    pub url: String,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long)]
    pub insecure: bool,

    /// Custom HTTP header, repeatable
    #[arg(short = 'H', long = "header", value_name = "Header: value")]
    pub headers: Vec<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Rate limit (requests per second, 0 for none)
    #[arg(long, default_value = "0")]
    pub rate_limit: u32,

    /// Custom User-Agent string
    #[arg(long)]
    pub user_agent: Option<String>,
}

impl TargetArgs {
    /// Get HTTP configuration from the target options.
    pub fn http_config(&self) -> Result<HttpConfig> {
        let headers = self
            .headers
            .iter()
            .map(|h| parse_header(h))
            .collect::<Result<Vec<_>>>()?;

        let mut config = HttpConfig {
            timeout_secs: self.timeout,
            headers,
            insecure: self.insecure,
            rate_limit: self.rate_limit,
            ..Default::default()
        };
        if let Some(ref agent) = self.user_agent {
            config.user_agent = agent.clone();
        }
        Ok(config)
    }

    /// Target URL with a scheme. Fails when the result isn't a valid URL.
    pub fn normalized_url(&self) -> Result<String> {
        let url = self.url.trim();
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("http://{}", url)
        };
        url::Url::parse(&url)?;
        Ok(url)
    }
}

/// Configuration for the scan, sources and creds commands.
#[derive(Args, Debug, Clone)]
pub struct ScanConfig {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output directory, must be empty or missing
    #[arg(short, long, value_name = "dir")]
    pub output: Option<PathBuf>,

    /// Simultaneous workers
    #[arg(short, long, default_value = "10")]
    pub threads: usize,

    /// Seconds between two queue progress notices
    #[arg(long, default_value = "30")]
    pub heartbeat: u64,

    /// Project files wordlist (one path per line)
    #[arg(long)]
    pub wordlist: Option<PathBuf>,

    /// Print the scan report as JSON
    #[arg(long)]
    pub json: bool,
}

impl ScanConfig {
    pub fn module_options(&self) -> ModuleOptions {
        ModuleOptions {
            wordlist: self.wordlist.clone(),
        }
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat.max(1))
    }
}

/// Configuration for the get command.
#[derive(Args, Debug, Clone)]
pub struct GetConfig {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Project path of the file, e.g. config/services.yaml
    pub path: String,
}

/// Split a `Name: value` header.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| ScanError::ConfigError(format!("invalid header '{}'", raw)))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ScanError::ConfigError(format!("invalid header '{}'", raw)));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_command() {
        let config = Config::try_parse_from([
            "symprobe",
            "scan",
            "localhost:8000",
            "-H",
            "Cookie: a=b; c=d",
            "-k",
            "-t",
            "4",
            "-v",
        ])
        .unwrap();
        assert!(config.verbose);

        let Commands::Scan(scan) = config.command else {
            panic!("expected scan");
        };
        assert_eq!(scan.threads, 4);
        assert_eq!(scan.heartbeat(), Duration::from_secs(30));
        assert_eq!(scan.target.normalized_url().unwrap(), "http://localhost:8000");

        let http = scan.target.http_config().unwrap();
        assert!(http.insecure);
        assert_eq!(http.headers, vec![("Cookie".to_string(), "a=b; c=d".to_string())]);
        assert_eq!(http.user_agent, "Mozilla/5.0");
    }

    #[test]
    fn test_parse_get_command() {
        let config =
            Config::try_parse_from(["symprobe", "get", "https://t", "config/services.yaml"]).unwrap();
        let Commands::Get(get) = config.command else {
            panic!("expected get");
        };
        assert_eq!(get.path, "config/services.yaml");
        assert_eq!(get.target.normalized_url().unwrap(), "https://t");
    }

    #[test]
    fn test_invalid_target_url() {
        let config = Config::try_parse_from(["symprobe", "get", "http://[::1", "x"]).unwrap();
        let Commands::Get(get) = config.command else {
            panic!("expected get");
        };
        assert!(matches!(
            get.target.normalized_url(),
            Err(ScanError::UrlError(_))
        ));
    }

    #[test]
    fn test_invalid_header() {
        assert!(parse_header("no colon").is_err());
        assert!(parse_header(": value").is_err());
        assert_eq!(
            parse_header("X-Forwarded-For:127.0.0.1").unwrap(),
            ("X-Forwarded-For".to_string(), "127.0.0.1".to_string())
        );
    }
}
