//! Command-line query tool.
//!
//! ```text
//! gatherdb <database> <collection> [condition] [column...]
//! ```
//!
//! Prints every matching row as one JSON object per line. The data
//! directory and other settings come from the environment (see
//! `gatherdb::config`).

use gatherdb::{Collection, CollectionError, StoreConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: gatherdb <database> <collection> [condition] [column...]";

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatherdb=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (Some(database), Some(name)) = (args.first(), args.get(1)) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    let condition = args.get(2).map_or("", String::as_str);
    let columns: Vec<&str> = args.iter().skip(3).map(String::as_str).collect();

    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    tracing::debug!(
        "Loaded configuration: data_directory={}",
        config.data_directory.display()
    );

    if !Collection::exists(database, name, &config) {
        tracing::error!("Collection {database}/{name} does not exist");
        std::process::exit(1);
    }

    if let Err(e) = run(database, name, &config, condition, &columns) {
        tracing::error!("Query failed: {e}");
        std::process::exit(1);
    }
}

fn run(
    database: &str,
    name: &str,
    config: &StoreConfig,
    condition: &str,
    columns: &[&str],
) -> Result<(), CollectionError> {
    let collection = Collection::open(database, name, config)?;
    let rows = collection.query(condition)?.build()?.select(columns)?;
    tracing::info!("{} rows matched", rows.len());
    for row in rows {
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}
