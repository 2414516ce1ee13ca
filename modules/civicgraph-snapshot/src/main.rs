use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use civicgraph_common::{Config, EdgeKind};
use civicgraph_graph::GraphReader;
use civicgraph_store::ViewStore;

#[derive(Parser)]
#[command(name = "civicgraph-snapshot", about = "Dump civic graph payloads as JSON")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Vertices, edges among them, locations and cities in one document
    Store,
    /// Top entities followed by every other renderable entity
    Vertices,
    /// The top entities by employees and by followers
    Top,
    /// Renderable entities outside the given ids
    Others {
        /// Comma-separated entity ids to leave out
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<i64>,
    },
    /// Edges of one kind, or all kinds grouped
    Edges {
        #[arg(long)]
        kind: Option<EdgeKind>,
    },
    /// Every location keyed by id
    Locations,
    /// Every city keyed by id
    Cities,
    /// Locations joined with their city, ordered by entity
    CityLocations,
    /// Entity ids matching a name, nickname or place
    Search { term: String },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Store => "store",
            Command::Vertices => "vertices",
            Command::Top => "top",
            Command::Others { .. } => "others",
            Command::Edges { .. } => "edges",
            Command::Locations => "locations",
            Command::Cities => "cities",
            Command::CityLocations => "city-locations",
            Command::Search { .. } => "search",
        }
    }
}

#[derive(Serialize)]
struct SearchHits {
    term: String,
    exact: Vec<i64>,
    prefix: Vec<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().context("Invalid configuration")?;
    config.log_redacted();

    let store = ViewStore::connect(&config)
        .await
        .context("Failed to connect to database")?;
    let reader = GraphReader::new(store).with_top_limit(config.top_entity_limit);

    info!(command = cli.command.name(), "Running snapshot");

    let output = match cli.command {
        Command::Store => to_json(&reader.store().await?)?,
        Command::Vertices => to_json(&reader.vertices().await?)?,
        Command::Top => to_json(&reader.top_entities().await?)?,
        Command::Others { exclude } => to_json(&reader.other_entities(&exclude).await?)?,
        Command::Edges { kind: Some(kind) } => to_json(&reader.edges(kind).await?)?,
        Command::Edges { kind: None } => to_json(&reader.all_edges().await?)?,
        Command::Locations => to_json(&reader.locations().await?)?,
        Command::Cities => to_json(&reader.cities().await?)?,
        Command::CityLocations => to_json(&reader.city_locations().await?)?,
        Command::Search { term } => {
            let index = reader.search_index().await?;
            to_json(&SearchHits {
                exact: index.lookup(&term),
                prefix: index.search_prefix(&term),
                term,
            })?
        }
    };

    println!("{output}");
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}
