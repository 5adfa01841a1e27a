//! CLI for geobroker
//!
//! Subcommands:
//! - `broker`: run one broker of a federation
//! - `client`: connect, optionally subscribe and publish, print deliveries

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser};
use geobroker::broker::{Broker, BrokerArea, BrokerAreaRegistry};
use geobroker::client::{ClientOptions, GeoClient};
use geobroker::config::{Settings, load_config, load_config_from};
use geobroker::geo::{Geofence, Location};
use geobroker::protocol::BrokerInfo;
use geobroker::transport::client::WsConnector;
use geobroker::transport::websocket::start_broker_server;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "geobroker")]
struct Cli {
    /// Configuration file, `config/default.*` if omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level, overrides `logging.level`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run a broker
    Broker {
        /// Broker id, overrides `broker.id`
        #[arg(long)]
        id: Option<String>,
        /// Broker area file, overrides `broker.areas_file`
        #[arg(long)]
        areas: Option<String>,
    },
    /// Run a client against a broker
    Client(ClientArgs),
}

#[derive(Args)]
struct ClientArgs {
    /// Broker address (`host:port`) to connect to first
    #[arg(long, default_value = "127.0.0.1:8080")]
    broker: String,
    /// Client id, random if omitted
    #[arg(long)]
    id: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,
    /// Topic to subscribe and/or publish to
    #[arg(long, default_value = "chat")]
    topic: String,
    /// Radius in degrees of the geofence around the client's location
    #[arg(long, default_value_t = 1.0)]
    radius: f64,
    /// Content to publish once connected
    #[arg(long)]
    publish: Option<String>,
    /// Seconds to wait for deliveries
    #[arg(long, default_value_t = 10)]
    listen: u64,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            geobroker::utils::logging::init("info");
            error!("Failed to load configuration: {e}");
            return;
        }
    };
    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    geobroker::utils::logging::init(level);

    match cli.command {
        Command::Broker { id, areas } => {
            if let Err(e) = run_broker(settings, id, areas).await {
                error!("Broker failed: {e}");
            }
        }
        Command::Client(args) => {
            if let Err(e) = run_client(settings, args).await {
                error!("Client failed: {e}");
            }
        }
    }
}

async fn run_broker(
    mut settings: Settings,
    id: Option<String>,
    areas: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(id) = id {
        settings.broker.id = id;
    }
    if areas.is_some() {
        settings.broker.areas_file = areas;
    }
    let addr = format!("{}:{}", settings.server.host, settings.server.port);

    let registry = match &settings.broker.areas_file {
        Some(path) => BrokerAreaRegistry::from_file(&settings.broker.id, path)?,
        None => {
            info!("No broker area file configured, serving the whole world alone");
            BrokerAreaRegistry::standalone(BrokerArea::root(
                BrokerInfo::new(settings.broker.id.as_str(), addr.as_str()),
                Geofence::world(),
            ))
        }
    };
    let broker = Broker::with_policy(registry, settings.broker.forwarding_policy());

    tokio::select! {
        result = start_broker_server(&addr, broker) => {
            result?;
            error!("Broker server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_client(settings: Settings, args: ClientArgs) -> Result<(), Box<dyn std::error::Error>> {
    let id = args
        .id
        .unwrap_or_else(|| format!("client-{}", uuid::Uuid::new_v4()));
    let location = Location::new(args.lat, args.lon);
    let fence = Geofence::circle(location, args.radius);
    let mut client = GeoClient::new(
        id,
        Some(location),
        WsConnector,
        ClientOptions::from(&settings.client),
    );

    client.connect(&args.broker).await?;
    println!("Connected as {} to {}", client.id(), client.broker_address());

    let status = client.subscribe(args.topic.as_str(), fence.clone()).await?;
    println!("Subscribe to {}: {status:?}", args.topic);

    if let Some(content) = args.publish {
        let outcome = client.publish(args.topic.as_str(), fence, content).await?;
        println!("Publish: {outcome:?}");
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(args.listen);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        tokio::select! {
            delivery = client.next_publication(remaining) => match delivery? {
                Some(publish) => println!("[{}] {}", publish.topic, publish.content),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.disconnect().await;
    Ok(())
}
