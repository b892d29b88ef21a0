//! One complete run: collect -> filter -> export
//!
//! Nothing is written unless collection and filtering both succeed.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::application::collection::{CollectionOutcome, LectureCollector, collect_lectures};
use crate::application::filter::{FilterError, FilterSummary, LectureFilter};
use crate::infrastructure::csv_exporter::{CsvExporter, ExportError, ExportReport};
use crate::infrastructure::scrape_error::ScrapeError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Lecture collection failed: {0}")]
    Collection(#[from] ScrapeError),

    #[error("Lecture filtering failed: {0}")]
    Filter(#[from] FilterError),

    #[error("CSV export failed: {0}")]
    Export(#[from] ExportError),
}

/// Outcome of a successful run
#[derive(Debug)]
pub struct RunReport {
    pub collected: usize,
    pub filter: FilterSummary,
    pub export: ExportReport,
}

pub async fn run(
    collectors: &[Arc<dyn LectureCollector>],
    filter: &LectureFilter,
    exporter: &CsvExporter,
) -> Result<RunReport, PipelineError> {
    let CollectionOutcome { mut lectures, .. } = collect_lectures(collectors).await?;
    let collected = lectures.len();
    info!("문화센터 강좌 수집이 완료되었습니다. 총 {}개의 강좌가 수집되었습니다.", collected);

    let summary = filter.apply(&mut lectures)?;
    let export = exporter.export(&lectures)?;

    Ok(RunReport {
        collected,
        filter: summary,
        export,
    })
}
