use std::{net::SocketAddr, sync::Arc, time::Duration};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use synapse::{
    adapters::{HttpBridgeRpcInvoker, HttpHandler, RegistryRateLimitStore, ReqwestHttpClient, SyncClient},
    config::bootstrap::{BootstrapConfig, load_config},
    core::gateway::{Gateway, GatewayBackends},
    tracing_setup,
    utils::singleton::SingletonRegistry,
};
use url::Url;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "synapse.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate the bootstrap configuration file
    Validate {
        #[clap(short, long, default_value = "synapse.toml")]
        config: String,
    },
    /// Start the gateway (default)
    Serve {
        #[clap(short, long, default_value = "synapse.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let (command, config_path) = match args.command {
        Some(Commands::Validate { config }) => ("validate", config),
        Some(Commands::Serve { config }) => ("serve", config),
        None => ("serve", args.config),
    };

    if command == "validate" {
        return validate_config_command(&config_path);
    }

    let config = load_config(&config_path)
        .wrap_err_with(|| format!("failed to load bootstrap config from {config_path}"))?;
    tracing_setup::init_tracing(&config.logging)?;

    let gateway = build_gateway()?;
    spawn_sync_task(&gateway, &config)?;

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .wrap_err("failed to parse listen address")?;
    let handler = Arc::new(HttpHandler::new(gateway));
    let app = handler.router();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err("failed to bind listen address")?;
    tracing::info!(%addr, "Synapse gateway listening");

    tokio::select! {
        result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        ) => {
            result.wrap_err("server error")?;
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, stopping");
        }
    }

    Ok(())
}

fn build_gateway() -> Result<Arc<Gateway>> {
    let http_client =
        Arc::new(ReqwestHttpClient::new().map_err(|e| eyre!("http client: {e}"))?);
    let rpc_invoker =
        Arc::new(HttpBridgeRpcInvoker::new().map_err(|e| eyre!("rpc invoker: {e}"))?);

    // The limiter store watches the registry for pushed redis settings, so
    // both sides share the same registry handle.
    let registry = Arc::new(SingletonRegistry::new());
    let rate_limit_store = Arc::new(RegistryRateLimitStore::new(registry.clone()));

    Ok(Arc::new(Gateway::with_registry(
        GatewayBackends {
            http_client,
            rpc_invoker,
            rate_limit_store,
        },
        registry,
    )))
}

fn spawn_sync_task(gateway: &Arc<Gateway>, config: &BootstrapConfig) -> Result<()> {
    let Some(raw_url) = &config.sync.url else {
        tracing::warn!("no sync endpoint configured, starting with empty route caches");
        return Ok(());
    };
    let url = Url::parse(raw_url).wrap_err_with(|| format!("invalid sync url {raw_url}"))?;
    let dispatcher = Arc::new(gateway.sync_dispatcher());
    let retry = Duration::from_secs(config.sync.retry_interval_secs.max(1));
    let client = SyncClient::new(url, dispatcher, retry);
    tokio::spawn(async move { client.run().await });
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

fn validate_config_command(config_path: &str) -> Result<()> {
    println!("Validating bootstrap configuration: {config_path}");
    match load_config(config_path) {
        Ok(config) => {
            println!("Configuration OK");
            println!("  listen address: {}", config.listen_addr);
            println!(
                "  sync endpoint:  {}",
                config.sync.url.as_deref().unwrap_or("(none)")
            );
            println!("  log level:      {}", config.logging.level);
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid:");
            eprintln!("  {e}");
            std::process::exit(1);
        }
    }
}
