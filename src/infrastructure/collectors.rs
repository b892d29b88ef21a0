//! Source collectors, one per retail chain
//!
//! Each collector fetches its chain's listing pages or API, turns every entry
//! into a [`Lecture`], and fails the whole collection on the first unexpected
//! shape. Parsing lives in pure functions so it can be tested without the network.

pub mod emart;
pub mod homeplus;
pub mod lottemart;

pub use emart::EmartCollector;
pub use homeplus::HomeplusCollector;
pub use lottemart::LottemartCollector;

use futures::future::try_join_all;
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use url::Url;

use crate::application::collection::LectureCollector;
use crate::domain::Lecture;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// Collapse every whitespace run into a single space and trim both ends.
pub fn clean_string(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text content of an element, whitespace-cleaned
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    clean_string(&element.text().collect::<String>())
}

pub(crate) fn selector(css: &str) -> ScrapeResult<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::InvalidSelector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn pattern(expr: &str) -> ScrapeResult<Regex> {
    Regex::new(expr).map_err(|e| ScrapeError::InvalidPattern {
        pattern: expr.to_string(),
        reason: e.to_string(),
    })
}

/// Number of pages needed to list `total` items
pub(crate) fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size)
}

/// `"<chain> <branch>"`
pub(crate) fn store_display_name(chain: &str, branch: &str) -> String {
    format!("{chain} {branch}")
}

/// Absolute detail-page URL with its query parameters encoded
pub(crate) fn detail_url(provider: &str, base: &str, path: &str, query: &[(&str, &str)]) -> ScrapeResult<String> {
    let mut url = Url::parse(base)
        .and_then(|base| base.join(path))
        .map_err(|e| ScrapeError::field_extraction_failed(provider, "detail_page_url", &e.to_string(), base))?;

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter().copied());
    }

    Ok(url.into())
}

/// Spawn one page task per job, each holding a permit while it runs.
pub(crate) fn spawn_page_tasks<F, Fut>(semaphore: &Arc<Semaphore>, jobs: Vec<F>) -> Vec<JoinHandle<ScrapeResult<Vec<Lecture>>>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ScrapeResult<Vec<Lecture>>> + Send + 'static,
{
    jobs.into_iter()
        .map(|job| {
            let semaphore = Arc::clone(semaphore);
            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|e| ScrapeError::TaskFailed {
                    task: "page request".to_string(),
                    message: e.to_string(),
                })?;
                job().await
            })
        })
        .collect()
}

/// Wait for every page task; the first failure is returned without waiting for the rest.
pub(crate) async fn join_page_tasks(
    provider: &str,
    handles: Vec<JoinHandle<ScrapeResult<Vec<Lecture>>>>,
) -> ScrapeResult<Vec<Lecture>> {
    let pages = try_join_all(handles.into_iter().map(|handle| async move {
        handle.await.map_err(|e| ScrapeError::TaskFailed {
            task: provider.to_string(),
            message: e.to_string(),
        })?
    }))
    .await?;

    Ok(pages.into_iter().flatten().collect())
}

/// The enabled collectors for the configured chains
pub fn build_collectors(config: &AppConfig) -> ScrapeResult<Vec<Arc<dyn LectureCollector>>> {
    let client = HttpClient::from_config(&config.http)?;
    let max_concurrent = config.http.max_concurrent_requests.max(1);
    let providers = &config.providers;

    let mut collectors: Vec<Arc<dyn LectureCollector>> = Vec::new();
    if providers.homeplus.enabled {
        collectors.push(Arc::new(HomeplusCollector::new(
            client.clone().with_context_label(homeplus::PROVIDER_NAME),
            providers.homeplus.clone(),
            max_concurrent,
        )?));
    }
    if providers.lottemart.enabled {
        collectors.push(Arc::new(LottemartCollector::new(
            client.clone().with_context_label(lottemart::PROVIDER_NAME),
            providers.lottemart.clone(),
            &config.search,
            max_concurrent,
        )?));
    }
    if providers.emart.enabled {
        collectors.push(Arc::new(EmartCollector::new(
            client.with_context_label(emart::PROVIDER_NAME),
            providers.emart.clone(),
        )?));
    }

    Ok(collectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn clean_string_collapses_whitespace() {
        assert_eq!(clean_string("  1회\n\t 6,000원  "), "1회 6,000원");
        assert_eq!(clean_string("\n \t"), "");
    }

    #[test]
    fn element_text_is_cleaned() {
        let html = Html::parse_fragment("<div class='t'>  신혜정\n   강사 </div>");
        let sel = selector("div.t").unwrap();
        let element = html.select(&sel).next().unwrap();
        assert_eq!(element_text(element), "신혜정 강사");
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 20), 0);
        assert_eq!(page_count(20, 20), 1);
        assert_eq!(page_count(21, 20), 2);
    }

    #[test]
    fn invalid_selector_is_reported() {
        let err = selector("div[").unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidSelector { .. }));
    }

    #[test]
    fn detail_url_encodes_query() {
        let url = detail_url("홈플러스", "https://mschool.homeplus.co.kr", "/Lecture/Detail", &[("LectureMasterID", "1234")]).unwrap();
        assert_eq!(url, "https://mschool.homeplus.co.kr/Lecture/Detail?LectureMasterID=1234");
    }

    #[test]
    fn all_chains_enabled_by_default() {
        let collectors = build_collectors(&AppConfig::default()).unwrap();
        let names: Vec<&str> = collectors.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["홈플러스", "롯데마트", "이마트"]);
    }

    #[tokio::test]
    async fn first_failing_page_fails_the_join() {
        let semaphore = Arc::new(Semaphore::new(2));
        let ok = || async { Ok::<_, ScrapeError>(vec![Lecture { title: "A".to_string(), ..Lecture::default() }]) };
        let handles = spawn_page_tasks(&semaphore, vec![ok]);
        assert_eq!(join_page_tasks("test", handles).await.unwrap().len(), 1);

        let failing = || async { Err::<Vec<Lecture>, _>(ScrapeError::column_count_mismatch("test", 5, 1, "http://example.com")) };
        let handles = spawn_page_tasks(&semaphore, vec![failing]);
        assert!(join_page_tasks("test", handles).await.is_err());
    }
}
