use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockpulse_backend::app;
use stockpulse_backend::db::{BatchWriter, NewsStore, PostgresNewsStore, WriterConfig};
use stockpulse_backend::external::article_fetcher::FetcherRegistry;
use stockpulse_backend::external::extractors::SiteExtractor;
use stockpulse_backend::external::feed::{FeedConfig, FinnhubFeed};
use stockpulse_backend::external::openai_classifier::{ClassifierConfig, OpenAiClassifier};
use stockpulse_backend::services::enrichment::EnrichmentService;
use stockpulse_backend::services::metrics::PipelineMetrics;
use stockpulse_backend::services::pipeline::{PipelineConfig, PipelineManager};
use stockpulse_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")?;

    // Initialize logging FIRST
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new("info"))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    let postgres_store = PostgresNewsStore::new(pool);
    postgres_store.ensure_schema().await?;
    let store: Arc<dyn NewsStore> = Arc::new(postgres_store);

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let registry = Arc::new(
        FetcherRegistry::new(Arc::new(SiteExtractor::default_rules(http_client.clone())))
            .register("yahoo", Arc::new(SiteExtractor::yahoo(http_client.clone())))
            .register("cnbc", Arc::new(SiteExtractor::cnbc(http_client.clone()))),
    );

    let classifier_config = ClassifierConfig::from_env().map_err(anyhow::Error::msg)?;
    let classifier = Arc::new(OpenAiClassifier::new(classifier_config));

    let feed_config = FeedConfig::from_env().map_err(anyhow::Error::msg)?;
    let feed = Arc::new(FinnhubFeed::new(feed_config, http_client));

    let metrics = Arc::new(PipelineMetrics::new());
    let pipeline_config = PipelineConfig::from_env();

    let writer = Arc::new(BatchWriter::new(store.clone(), WriterConfig::default()));
    let enrichment = Arc::new(EnrichmentService::new(
        registry,
        classifier,
        writer,
        metrics.clone(),
        pipeline_config.enrichment.clone(),
    ));

    let pipeline = Arc::new(PipelineManager::new(
        feed,
        enrichment,
        metrics,
        pipeline_config,
    ));
    pipeline.start();

    let state = AppState { pipeline, store };
    let app = app::create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 StockPulse backend running at http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
