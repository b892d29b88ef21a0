//! Infrastructure layer: configuration, logging, HTTP, the per-chain source
//! collectors and the CSV exporter.

pub mod collectors;
pub mod config; // Configuration file and defaults
pub mod csv_exporter;
pub mod http_client;
pub mod logging; // Logging infrastructure
pub mod scrape_error;

pub use collectors::{EmartCollector, HomeplusCollector, LottemartCollector, build_collectors, clean_string};
pub use config::{AppConfig, ConfigError, ConfigManager, ConfigSource};
pub use csv_exporter::{ChangeStatus, CsvExporter, ExportError, ExportReport, Snapshot};
pub use http_client::HttpClient;
pub use logging::{get_log_directory, init_logging_with_config};
pub use scrape_error::{ScrapeError, ScrapeResult};
