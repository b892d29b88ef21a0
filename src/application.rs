//! Application layer module
//!
//! Use cases over the domain: the collection orchestrator, the eligibility
//! filter and the end-to-end run that ties them to the CSV exporter.

pub mod collection;
pub mod filter;
pub mod pipeline;

pub use collection::{CollectionOutcome, LectureCollector, SourceCount, collect_lectures};
pub use filter::{FilterError, FilterSummary, LectureFilter, WEEKDAY_CUTOFF_HOUR};
pub use pipeline::{PipelineError, RunReport, run};
