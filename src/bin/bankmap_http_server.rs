use bankmap::bankmap_node::{load_node_config, BankMapHttpServer, BankMapNode};
use bankmap::web_logger;
use clap::Parser;
use log::{info, LevelFilter};

/// Command line options for the HTTP server binary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Port for the HTTP server, overriding the configured bind address
    #[arg(long)]
    port: Option<u16>,

    /// Path to the node configuration file (JSON, or TOML by extension)
    #[arg(long)]
    config: Option<String>,

    /// Keep recent log lines in memory and serve them at /api/logs
    #[arg(long)]
    web_log: bool,
}

/// Starts the mapping engine HTTP server.
///
/// # Environment Variables
///
/// * `NODE_CONFIG` - Path to the node configuration file when `--config` is absent
/// * `IMPORT_TIMEOUT_SECONDS` - Document import timeout (60 to 600)
/// * `RUST_LOG` - Log filter for the default logger
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if cli.web_log {
        web_logger::init(LevelFilter::Info)?;
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
    info!("Starting BankMap HTTP Server...");

    let config = load_node_config(cli.config.as_deref(), cli.port)?;
    info!("Config loaded successfully");

    let bind_address = config.bind_address.clone();
    let node = BankMapNode::new(config)?;
    info!("Node loaded successfully");

    let http_server = BankMapHttpServer::new(node, &bind_address);
    http_server.run().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["test"]);
        assert_eq!(cli.port, None);
        assert_eq!(cli.config, None);
        assert!(!cli.web_log);
    }

    #[test]
    fn custom_options() {
        let cli = Cli::parse_from([
            "test",
            "--port",
            "8000",
            "--config",
            "node.toml",
            "--web-log",
        ]);
        assert_eq!(cli.port, Some(8000));
        assert_eq!(cli.config.as_deref(), Some("node.toml"));
        assert!(cli.web_log);
    }
}
