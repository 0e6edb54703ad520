pub mod batch_worker;
pub mod enrichment;
pub mod ingest_queue;
pub mod metrics;
pub mod pipeline;
pub mod rate_limiter;
