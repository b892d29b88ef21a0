//! Collection orchestrator
//!
//! Runs every configured source collector as its own task and merges the
//! results. One failing collector fails the whole collection.

use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{error, info};

use crate::domain::Lecture;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// A provider of lectures for one retail chain
#[async_trait]
pub trait LectureCollector: Send + Sync {
    /// Chain name used in logs and diagnostics
    fn name(&self) -> &str;

    /// Every lecture the chain currently lists, or the first parse/transport failure
    async fn collect(&self) -> ScrapeResult<Vec<Lecture>>;
}

/// Lectures gathered from one collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCount {
    pub source: String,
    pub count: usize,
}

/// Merged output of every collector, in no particular order
#[derive(Debug, Default)]
pub struct CollectionOutcome {
    pub lectures: Vec<Lecture>,
    pub per_source: Vec<SourceCount>,
    /// Empty-title records dropped as "no data" markers
    pub discarded_sentinels: usize,
}

/// Launch all collectors concurrently and wait until every one has finished.
pub async fn collect_lectures(collectors: &[Arc<dyn LectureCollector>]) -> ScrapeResult<CollectionOutcome> {
    info!("🚀 Starting lecture collection from {} sources", collectors.len());

    let tasks = collectors.iter().map(|collector| {
        let collector = Arc::clone(collector);
        let name = collector.name().to_string();
        let handle = tokio::spawn(async move { collector.collect().await });

        async move {
            let result = handle.await.map_err(|e| ScrapeError::TaskFailed {
                task: name.clone(),
                message: e.to_string(),
            })?;
            match result {
                Ok(lectures) => Ok((name, lectures)),
                Err(e) => {
                    error!("❌ {} 문화센터 강좌 수집 실패: {}", name, e);
                    Err(e)
                }
            }
        }
    });

    let results = try_join_all(tasks).await?;

    let mut outcome = CollectionOutcome::default();
    for (source, lectures) in results {
        let received = lectures.len();
        let kept: Vec<Lecture> = lectures.into_iter().filter(|lecture| !lecture.is_sentinel()).collect();
        let count = kept.len();
        outcome.discarded_sentinels += received - count;
        outcome.lectures.extend(kept);

        info!("📦 {}: {} lectures", source, count);
        outcome.per_source.push(SourceCount { source, count });
    }

    info!("✅ Lecture collection completed: {} lectures in total", outcome.lectures.len());
    Ok(outcome)
}
