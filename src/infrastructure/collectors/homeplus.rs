//! 홈플러스 문화센터 collector
//!
//! Form-encoded search endpoint returning an HTML list, 20 lectures per page.
//! Pages of one store are fetched concurrently.

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::{
    clean_string, detail_url, element_text, join_page_tasks, page_count, pattern, selector, spawn_page_tasks,
    store_display_name,
};
use crate::application::collection::LectureCollector;
use crate::domain::{DAY_OF_WEEK_SUFFIX, Lecture, ReceptionStatus};
use crate::infrastructure::config::HomeplusConfig;
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

pub const PROVIDER_NAME: &str = "홈플러스";

const PAGE_SIZE: usize = 20;

const SEARCH_PATH: &str = "/Lecture/GetSearchResult";
const SEARCH_PAGE_PATH: &str = "/Lecture/Search";
const STORE_LIST_PATH: &str = "/Store/GetStoreList";
const DETAIL_PATH: &str = "/Lecture/Detail";

const CART_ICON_OPEN: &str = "/images/ico/icon_cart_3.png";
const CART_ICON_CLOSED: &str = "/images/ico/icon_cart_4.png";

/// Search filter keys sent empty for every `prm[i]` entry
const EMPTY_SEARCH_KEYS: [&str; 15] = [
    "LectureGroup",
    "LectureType",
    "LectureWeek",
    "ClassCount",
    "LectureTime",
    "LectureStatusSearch",
    "LectureStartMonth",
    "DeadLine",
    "Confirmed",
    "Discount",
    "LectureTimeGroup",
    "LectureAge",
    "LectureOnly",
    "WebTheme",
    "Description",
];

#[derive(Debug, Deserialize)]
struct StoreListResponse {
    #[serde(rename = "Data")]
    data: StoreListData,
}

#[derive(Debug, Deserialize)]
struct StoreListData {
    #[serde(rename = "StoreList", default)]
    store_list: Vec<StoreEntry>,
}

#[derive(Debug, Deserialize)]
struct StoreEntry {
    #[serde(rename = "StoreCode")]
    store_code: String,
    #[serde(rename = "StoreName")]
    store_name: String,
}

/// Compiled selectors and patterns for the search result list
#[derive(Debug)]
pub(crate) struct HomeplusParser {
    base_url: String,
    total_count: Selector,
    item: Selector,
    group: Selector,
    title: Selector,
    schedule: Selector,
    columns: Selector,
    cart_icon: Selector,
    cart_label: Selector,
    master_id: Selector,
    teacher_re: Regex,
    start_date_re: Regex,
    start_time_re: Regex,
    end_time_re: Regex,
    day_re: Regex,
    price_re: Regex,
    count_re: Regex,
}

impl HomeplusParser {
    pub(crate) fn new(base_url: &str) -> ScrapeResult<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            total_count: selector("#divTotalCnt")?,
            item: selector("li > div.result_info_wrap")?,
            group: selector("div.title_1")?,
            title: selector("div.title_2")?,
            schedule: selector("div.info_4")?,
            columns: selector("div.info_5")?,
            cart_icon: selector("button.btn_class_cart > img")?,
            cart_label: selector("button.btn_class_cart > span:last-child")?,
            master_id: selector("input[name=LectureMasterID]")?,
            teacher_re: pattern(r"^.*강사")?,
            start_date_re: pattern(r"([0-9]{4})\.([0-9]{2})\.([0-9]{2}) ~")?,
            start_time_re: pattern(r"([0-9]{2}:[0-9]{2}) ~")?,
            end_time_re: pattern(r"~ ([0-9]{2}:[0-9]{2})")?,
            day_re: pattern(r"^([월화수목금토일]) ")?,
            price_re: pattern(r" ([0-9]{1,3}(?:,[0-9]{3})*원)$")?,
            count_re: pattern(r"^[0-9]{1,3}회")?,
        })
    }

    /// `#divTotalCnt` of a result page
    pub(crate) fn parse_total_count(&self, body: &str, url: &str) -> ScrapeResult<usize> {
        let document = Html::parse_document(body);
        let value = document
            .select(&self.total_count)
            .next()
            .map(element_text)
            .unwrap_or_default();

        value
            .parse::<usize>()
            .map_err(|_| ScrapeError::field_extraction_failed(PROVIDER_NAME, "total_count", &value, url))
    }

    /// Every lecture of one result page
    pub(crate) fn parse_page(&self, body: &str, store_name: &str, url: &str) -> ScrapeResult<Vec<Lecture>> {
        let document = Html::parse_document(body);
        document
            .select(&self.item)
            .map(|item| self.parse_item(item, store_name, url))
            .collect()
    }

    fn parse_item(&self, item: ElementRef<'_>, store_name: &str, url: &str) -> ScrapeResult<Lecture> {
        let fail = |field: &str, data: &str| ScrapeError::field_extraction_failed(PROVIDER_NAME, field, data, url);
        let first_text = |sel: &Selector| item.select(sel).next().map(element_text).unwrap_or_default();

        let group = first_text(&self.group);
        if group.is_empty() {
            return Err(fail("group", &group));
        }

        let title = first_text(&self.title);
        if title.is_empty() {
            return Err(fail("title", &title));
        }

        // 요일/시간: "일 14:20 ~ 15:00"
        let schedule = first_text(&self.schedule);

        let columns: Vec<String> = item.select(&self.columns).map(element_text).collect();
        if columns.len() != 3 {
            return Err(ScrapeError::column_count_mismatch(PROVIDER_NAME, 3, columns.len(), url));
        }
        // "1회 6,000원" / "2023.08.20 ~ 2023.08.20" / "신혜정 강사"
        let (fee_info, date_info, teacher_info) = (&columns[0], &columns[1], &columns[2]);

        let teacher = self
            .teacher_re
            .find(teacher_info)
            .map(|m| clean_string(m.as_str()))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| fail("teacher", teacher_info))?;

        let start_date = self
            .start_date_re
            .captures(date_info)
            .map(|c| format!("{}-{}-{}", &c[1], &c[2], &c[3]))
            .ok_or_else(|| fail("start_date", date_info))?;

        let start_time = self
            .start_time_re
            .captures(&schedule)
            .map(|c| c[1].to_string())
            .ok_or_else(|| fail("start_time", &schedule))?;
        let end_time = self
            .end_time_re
            .captures(&schedule)
            .map(|c| c[1].to_string())
            .ok_or_else(|| fail("end_time", &schedule))?;

        let day = self
            .day_re
            .captures(&schedule)
            .map(|c| c[1].to_string())
            .ok_or_else(|| fail("day_of_week", &schedule))?;

        let price = self
            .price_re
            .captures(fee_info)
            .map(|c| c[1].to_string())
            .ok_or_else(|| fail("price", fee_info))?;
        let count = self
            .count_re
            .find(fee_info)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| fail("count", fee_info))?;

        let icon = item
            .select(&self.cart_icon)
            .next()
            .and_then(|img| img.value().attr("src"))
            .ok_or_else(|| fail("status", "button.btn_class_cart > img"))?;
        let label = first_text(&self.cart_label);
        let status = map_status(icon, &label, url)?;

        let master_id = item
            .select(&self.master_id)
            .next()
            .and_then(|input| input.value().attr("value"))
            .map(clean_string)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| fail("LectureMasterID", ""))?;

        Ok(Lecture {
            store_name: store_display_name(PROVIDER_NAME, store_name),
            group,
            title,
            teacher,
            start_date,
            start_time,
            end_time,
            day_of_week: format!("{day}{DAY_OF_WEEK_SUFFIX}"),
            price,
            count,
            status,
            detail_page_url: detail_url(PROVIDER_NAME, &self.base_url, DETAIL_PATH, &[("LectureMasterID", master_id.as_str())])?,
            ..Lecture::default()
        })
    }

    /// Every configured group must be offered by the search page under the same name.
    pub(crate) fn verify_lecture_groups(&self, body: &str, groups: &BTreeMap<String, String>) -> ScrapeResult<()> {
        let document = Html::parse_document(body);
        for (code, name) in groups {
            let css = format!(
                "section.search_body div.menu_depth_2_wrap ul.tree_menu_2 > li.depth_2 > ul.depth_3 > li:first-child > button[data-lecture-target='{code}']"
            );
            let group_selector = selector(&css)?;
            let matches: Vec<String> = document.select(&group_selector).map(element_text).collect();
            if matches.len() != 1 || matches[0] != *name {
                return Err(ScrapeError::code_mismatch(PROVIDER_NAME, "강좌군", code, name));
            }
        }
        Ok(())
    }
}

/// 장바구니 아이콘 + 라벨 -> 접수상태
fn map_status(icon: &str, label: &str, url: &str) -> ScrapeResult<ReceptionStatus> {
    match (icon, label) {
        (CART_ICON_OPEN, "대기") => Ok(ReceptionStatus::StandBy),
        (CART_ICON_OPEN, "강의 장바구니 담기") => Ok(ReceptionStatus::Possible),
        (CART_ICON_CLOSED, "마감") => Ok(ReceptionStatus::Closed),
        (CART_ICON_CLOSED, "방문" | "문의") => Ok(ReceptionStatus::VisitConsultation),
        _ => Err(ScrapeError::unsupported_status(PROVIDER_NAME, &format!("{icon} {label}"), url)),
    }
}

fn verify_stores(response: &StoreListResponse, stores: &BTreeMap<String, String>) -> ScrapeResult<()> {
    for (code, name) in stores {
        let found = response
            .data
            .store_list
            .iter()
            .any(|entry| entry.store_code == *code && entry.store_name == *name);
        if !found {
            return Err(ScrapeError::code_mismatch(PROVIDER_NAME, "점포", code, name));
        }
    }
    Ok(())
}

/// One `prm[index]` search condition
fn push_search_condition(fields: &mut Vec<(String, String)>, index: usize, text: &str, store_code: &str, target: &str) {
    fields.push((format!("prm[{index}][Id]"), String::new()));
    fields.push((format!("prm[{index}][Txt]"), text.to_string()));
    fields.push((format!("prm[{index}][Data][StoreCode]"), store_code.to_string()));
    fields.push((format!("prm[{index}][Data][LectureTarget]"), target.to_string()));
    for name in EMPTY_SEARCH_KEYS {
        fields.push((format!("prm[{index}][Data][{name}]"), String::new()));
    }
}

fn search_form(page: usize, store_code: &str, store_name: &str, groups: &BTreeMap<String, String>) -> Vec<(String, String)> {
    let mut fields = vec![
        ("page".to_string(), page.to_string()),
        ("pageSize".to_string(), PAGE_SIZE.to_string()),
    ];
    push_search_condition(&mut fields, 0, store_name, store_code, "");
    for (index, (code, name)) in groups.iter().enumerate() {
        push_search_condition(&mut fields, index + 1, name, "", code);
    }
    fields.push(("word".to_string(), String::new()));
    fields.push(("sort".to_string(), "1".to_string()));
    fields
}

pub struct HomeplusCollector {
    client: HttpClient,
    config: HomeplusConfig,
    parser: Arc<HomeplusParser>,
    semaphore: Arc<Semaphore>,
}

impl HomeplusCollector {
    pub fn new(client: HttpClient, config: HomeplusConfig, max_concurrent_requests: usize) -> ScrapeResult<Self> {
        let parser = Arc::new(HomeplusParser::new(&config.base_url)?);
        Ok(Self {
            client,
            config,
            parser,
            semaphore: Arc::new(Semaphore::new(max_concurrent_requests)),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn verify_site_codes(&self) -> ScrapeResult<()> {
        let store_list: StoreListResponse = self.client.post_empty_json(&self.url(STORE_LIST_PATH)).await?;
        verify_stores(&store_list, &self.config.stores)?;

        let search_page = self.client.get_text(&self.url(SEARCH_PAGE_PATH)).await?;
        self.parser.verify_lecture_groups(&search_page, &self.config.lecture_groups)
    }

    async fn collect_store(&self, store_code: &str, store_name: &str) -> ScrapeResult<Vec<Lecture>> {
        let url = self.url(SEARCH_PATH);
        let groups = &self.config.lecture_groups;

        let first_page = self
            .client
            .post_form(&url, &search_form(1, store_code, store_name, groups))
            .await?;
        let total = self.parser.parse_total_count(&first_page, &url)?;
        let pages = page_count(total, PAGE_SIZE);
        debug!("{} {}: {} lectures over {} pages", PROVIDER_NAME, store_name, total, pages);

        if pages == 0 {
            return Ok(Vec::new());
        }
        let mut lectures = self.parser.parse_page(&first_page, store_name, &url)?;

        let jobs: Vec<_> = (2..=pages)
            .map(|page| {
                let client = self.client.clone();
                let parser = Arc::clone(&self.parser);
                let url = url.clone();
                let form = search_form(page, store_code, store_name, groups);
                let store_name = store_name.to_string();
                move || async move {
                    let body = client.post_form(&url, &form).await?;
                    parser.parse_page(&body, &store_name, &url)
                }
            })
            .collect();

        let handles = spawn_page_tasks(&self.semaphore, jobs);
        lectures.extend(join_page_tasks(PROVIDER_NAME, handles).await?);
        Ok(lectures)
    }
}

#[async_trait]
impl LectureCollector for HomeplusCollector {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn collect(&self) -> ScrapeResult<Vec<Lecture>> {
        info!("{} 문화센터 강좌 수집을 시작합니다.", PROVIDER_NAME);
        self.verify_site_codes().await?;

        let mut lectures = Vec::new();
        for (store_code, store_name) in &self.config.stores {
            lectures.extend(self.collect_store(store_code, store_name).await?);
        }

        info!("{} 문화센터 강좌 수집이 완료되었습니다. 총 {}개의 강좌가 수집되었습니다.", PROVIDER_NAME, lectures.len());
        Ok(lectures)
    }
}
