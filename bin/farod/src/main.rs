//! Faro Daemon - runs one role of the faro distributed filesystem.
//!
//! `farod naming` runs the naming server: the directory tree plus the
//! service and registration endpoints.
//!
//! `farod storage` runs a storage server: serves file data from a local
//! root directory and registers itself with the naming server.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use faro_core::REGISTRATION_PORT;
use faro_naming::{NamingConfig, NamingServer};
use faro_proto::StubAddr;
use faro_storage::{StorageConfig, StorageServer};

/// Faro daemon.
#[derive(Parser)]
#[command(name = "farod")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, default_value = "~/.faro/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the naming server
    Naming {
        /// Bind address for the client-facing service endpoint
        #[arg(long)]
        service_addr: Option<SocketAddr>,

        /// Bind address for the storage-facing registration endpoint
        #[arg(long)]
        registration_addr: Option<SocketAddr>,
    },

    /// Run a storage server
    Storage {
        /// Local directory holding the served files
        #[arg(long)]
        root: Option<PathBuf>,

        /// Naming server to register with (host or host:port)
        #[arg(long)]
        naming: Option<String>,

        /// Externally-routable hostname advertised in this server's stubs
        #[arg(long)]
        hostname: Option<String>,

        /// Bind address for the client-facing data endpoint
        #[arg(long)]
        storage_addr: Option<SocketAddr>,

        /// Bind address for the naming-facing command endpoint
        #[arg(long)]
        command_addr: Option<SocketAddr>,

        /// Advisory capacity hint reported at registration
        #[arg(long)]
        capacity: Option<u64>,
    },
}

/// Daemon configuration loaded from the TOML file.
#[derive(Debug, Clone, Default)]
struct DaemonConfig {
    service_addr: Option<SocketAddr>,
    registration_addr: Option<SocketAddr>,
    storage_root: Option<PathBuf>,
    naming_host: Option<String>,
    hostname: Option<String>,
    storage_addr: Option<SocketAddr>,
    command_addr: Option<SocketAddr>,
    capacity: Option<u64>,
}

/// Load configuration from the TOML file, if it exists.
fn load_config(path: &PathBuf) -> Result<DaemonConfig> {
    let path = expand_tilde(path);

    if !path.exists() {
        info!("no config file found at {:?}, using defaults", path);
        return Ok(DaemonConfig::default());
    }

    let content = std::fs::read_to_string(&path).context("failed to read config file")?;
    let toml: toml::Value = content.parse().context("failed to parse config file")?;

    let mut config = DaemonConfig::default();

    if let Some(naming) = toml.get("naming") {
        if let Some(addr) = naming.get("service_addr").and_then(|v| v.as_str()) {
            config.service_addr = Some(addr.parse().context("invalid service_addr")?);
        }
        if let Some(addr) = naming.get("registration_addr").and_then(|v| v.as_str()) {
            config.registration_addr = Some(addr.parse().context("invalid registration_addr")?);
        }
    }

    if let Some(storage) = toml.get("storage") {
        if let Some(root) = storage.get("root").and_then(|v| v.as_str()) {
            config.storage_root = Some(PathBuf::from(root));
        }
        if let Some(host) = storage.get("naming").and_then(|v| v.as_str()) {
            config.naming_host = Some(host.to_string());
        }
        if let Some(host) = storage.get("hostname").and_then(|v| v.as_str()) {
            config.hostname = Some(host.to_string());
        }
        if let Some(addr) = storage.get("storage_addr").and_then(|v| v.as_str()) {
            config.storage_addr = Some(addr.parse().context("invalid storage_addr")?);
        }
        if let Some(addr) = storage.get("command_addr").and_then(|v| v.as_str()) {
            config.command_addr = Some(addr.parse().context("invalid command_addr")?);
        }
        if let Some(capacity) = storage.get("capacity").and_then(|v| v.as_integer()) {
            config.capacity = Some(capacity as u64);
        }
    }

    Ok(config)
}

/// Expand ~ to home directory.
fn expand_tilde(path: &PathBuf) -> PathBuf {
    let s = path.to_string_lossy();
    if s.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&s[2..]);
        }
    }
    path.clone()
}

/// Parses `host` or `host:port`, falling back to the default port.
fn parse_stub(s: &str, default_port: u16) -> Result<StubAddr> {
    match s.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse().context("invalid port")?;
            Ok(StubAddr::new(host, port))
        }
        None => Ok(StubAddr::new(s, default_port)),
    }
}

async fn run_naming(config: NamingConfig) -> Result<()> {
    let server = NamingServer::new(config);
    server.start().await.context("failed to start naming server")?;

    println!("faro naming server running");
    println!(
        "  service:      {}",
        server.service_addr().expect("server running")
    );
    println!(
        "  registration: {}",
        server.registration_addr().expect("server running")
    );
    println!();
    println!("Press Ctrl+C to stop");

    signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("received shutdown signal");
    server.stop().await;
    Ok(())
}

async fn run_storage(config: StorageConfig) -> Result<()> {
    let server = StorageServer::new(config);
    server.start().await.context("failed to start storage server")?;

    println!("faro storage server running");
    println!(
        "  storage: {}",
        server.storage_addr().expect("server running")
    );
    println!(
        "  command: {}",
        server.command_addr().expect("server running")
    );
    println!();
    println!("Press Ctrl+C to stop");

    signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("received shutdown signal");
    server.stop().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set up logging")?;

    let file_config = load_config(&cli.config)?;

    match cli.command {
        Commands::Naming {
            service_addr,
            registration_addr,
        } => {
            let defaults = NamingConfig::default();
            let config = NamingConfig {
                service_addr: service_addr
                    .or(file_config.service_addr)
                    .unwrap_or(defaults.service_addr),
                registration_addr: registration_addr
                    .or(file_config.registration_addr)
                    .unwrap_or(defaults.registration_addr),
            };
            run_naming(config).await
        }

        Commands::Storage {
            root,
            naming,
            hostname,
            storage_addr,
            command_addr,
            capacity,
        } => {
            let root = root
                .or(file_config.storage_root)
                .context("storage root is required (--root or [storage].root)")?;
            let naming_host = naming
                .or(file_config.naming_host)
                .context("naming server is required (--naming or [storage].naming)")?;
            let naming_stub = parse_stub(&naming_host, REGISTRATION_PORT)?;

            let mut config = StorageConfig::new(expand_tilde(&root), naming_stub);
            if let Some(hostname) = hostname.or(file_config.hostname) {
                config.hostname = hostname;
            }
            if let Some(addr) = storage_addr.or(file_config.storage_addr) {
                config.storage_addr = addr;
            }
            if let Some(addr) = command_addr.or(file_config.command_addr) {
                config.command_addr = addr;
            }
            if let Some(capacity) = capacity.or(file_config.capacity) {
                config.capacity = capacity;
            }
            run_storage(config).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let path = PathBuf::from("~/.faro/config.toml");
        let expanded = expand_tilde(&path);

        if let Some(home) = dirs::home_dir() {
            assert!(expanded.starts_with(&home));
            assert!(expanded.ends_with(".faro/config.toml"));
        }
    }

    #[test]
    fn test_parse_stub_with_and_without_port() {
        let with_port = parse_stub("naming.example:9000", REGISTRATION_PORT).unwrap();
        assert_eq!(with_port.port, 9000);

        let without = parse_stub("naming.example", REGISTRATION_PORT).unwrap();
        assert_eq!(without.port, REGISTRATION_PORT);
    }
}
