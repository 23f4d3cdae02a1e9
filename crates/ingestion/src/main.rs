//! August Ingestion CLI
//!
//! Ingests one corpus file into a collection:
//!
//! ```text
//! august-ingestion <collection> <corpus.json>
//! ```
//!
//! Settings come from `config/*.toml` and `APP__*` environment variables.

use august_common::{config::AppConfig, metrics, telemetry, VERSION};
use august_ingestion::IngestionPipeline;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    telemetry::init_tracing(&config.observability)?;
    metrics::register_metrics();

    info!("Starting August ingestion v{}", VERSION);

    let mut args = std::env::args().skip(1);
    let (Some(collection), Some(path)) = (args.next(), args.next()) else {
        error!("Usage: august-ingestion <collection> <corpus.json>");
        std::process::exit(2);
    };

    let retriever = august_search::connect(&config).await.map_err(|e| {
        error!(error = %e, "Failed to initialize retriever");
        e
    })?;
    let pipeline = IngestionPipeline::new(retriever);

    if pipeline.store_file(&collection, &path, &config.ingestion).await? {
        info!(collection = %collection, "Ingestion complete");
    } else {
        warn!(collection = %collection, path = %path, "Corpus contained no documents");
    }

    Ok(())
}
