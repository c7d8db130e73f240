mod loader;

pub use loader::{BracketCsvLoader, BracketLoaderError, BracketRecord, ConfigMetadata};
