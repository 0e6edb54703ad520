pub mod batch_writer;
pub mod news_store;
pub mod postgres_store;

pub use batch_writer::{BatchWriter, WriteReport, WriterConfig};
pub use news_store::{NewsStore, StoreError};
pub use postgres_store::PostgresNewsStore;
