//! 롯데마트 문화센터 collector
//!
//! The search endpoint answers with a bare `<tr>` fragment; the last row
//! carries a `pageinfo` attribute describing the whole result set.

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::{
    clean_string, detail_url, element_text, join_page_tasks, pattern, selector, spawn_page_tasks, store_display_name,
};
use crate::application::collection::LectureCollector;
use crate::domain::{DAY_OF_WEEK_SUFFIX, Lecture, ReceptionStatus};
use crate::infrastructure::config::{LottemartConfig, SearchConfig};
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

pub const PROVIDER_NAME: &str = "롯데마트";

const SEARCH_PATH: &str = "/cu/gus/course/courseinfo/searchList.do";
const DETAIL_PATH: &str = "/cu/gus/course/courseinfo/courseview.do";

const COLUMN_COUNT: usize = 5;
const PAGE_INFO_FIELDS: usize = 6;

/// `pageinfo="1|5|85|61|0|24"`
/// 현재 페이지 | 전체 페이지 | 전체 강좌 | 접수가능 | 온라인마감 | 접수마감
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageInfo {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_lectures: usize,
    pub open: usize,
    pub online_closed: usize,
    pub closed: usize,
}

#[derive(Debug)]
pub(crate) struct LottemartParser {
    base_url: String,
    search_term_code: String,
    row: Selector,
    cell: Selector,
    title_link: Selector,
    status_button: Selector,
    start_date_re: Regex,
    start_time_re: Regex,
    end_time_re: Regex,
    day_re: Regex,
    price_re: Regex,
    count_re: Regex,
}

/// The fragment loses its rows when parsed without an enclosing table.
fn parse_fragment(body: &str) -> Html {
    Html::parse_document(&format!("<table>{body}</table>"))
}

impl LottemartParser {
    pub(crate) fn new(base_url: &str, search_term_code: &str) -> ScrapeResult<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            search_term_code: search_term_code.to_string(),
            row: selector("tr")?,
            cell: selector("td")?,
            title_link: selector("div.info-txt > a")?,
            status_button: selector("div > div > a.btn-status:last-child")?,
            start_date_re: pattern(r"([0-9]{4})\.([0-9]{2})\.([0-9]{2})$")?,
            start_time_re: pattern(r" ([0-9]{2}:[0-9]{2})")?,
            end_time_re: pattern(r"([0-9]{2}:[0-9]{2}) ")?,
            day_re: pattern(r"\(([월화수목금토일])")?,
            price_re: pattern(r"[0-9,]{1,8}원$")?,
            count_re: pattern(r"[0-9]{1,3}회")?,
        })
    }

    pub(crate) fn parse_page_info(&self, body: &str, url: &str) -> ScrapeResult<PageInfo> {
        let document = parse_fragment(body);
        let raw = document
            .select(&self.row)
            .last()
            .and_then(|row| row.value().attr("pageinfo"))
            .ok_or_else(|| ScrapeError::field_extraction_failed(PROVIDER_NAME, "pageinfo", "", url))?
            .to_string();

        let invalid = || ScrapeError::field_extraction_failed(PROVIDER_NAME, "pageinfo", &raw, url);
        let fields = raw
            .split('|')
            .map(|field| field.trim().parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;
        if fields.len() != PAGE_INFO_FIELDS {
            return Err(invalid());
        }

        Ok(PageInfo {
            current_page: fields[0],
            total_pages: fields[1],
            total_lectures: fields[2],
            open: fields[3],
            online_closed: fields[4],
            closed: fields[5],
        })
    }

    /// Every row of one page; a single-cell "no data" row becomes an empty-title sentinel.
    pub(crate) fn parse_page(&self, body: &str, store_code: &str, store_name: &str, url: &str) -> ScrapeResult<Vec<Lecture>> {
        let document = parse_fragment(body);
        document
            .select(&self.row)
            .map(|row| self.parse_row(row, store_code, store_name, url))
            .collect()
    }

    fn parse_row(&self, row: ElementRef<'_>, store_code: &str, store_name: &str, url: &str) -> ScrapeResult<Lecture> {
        let fail = |field: &str, data: &str| ScrapeError::field_extraction_failed(PROVIDER_NAME, field, data, url);

        let cells: Vec<ElementRef<'_>> = row.select(&self.cell).collect();
        if cells.len() == 1 {
            return Ok(Lecture::default());
        }
        if cells.len() != COLUMN_COUNT {
            return Err(ScrapeError::column_count_mismatch(PROVIDER_NAME, COLUMN_COUNT, cells.len(), url));
        }

        let teacher = element_text(cells[1]);
        // 요일/시간/개강일: "(토) 10:30~11:20 2021.07.03"
        let schedule = element_text(cells[2]);
        // 강좌횟수/수강료: "12회 60,000원"
        let fee_info = element_text(cells[3]);
        let status_text = cells[4].select(&self.status_button).next().map(element_text).unwrap_or_default();

        let link = cells[0]
            .select(&self.title_link)
            .next()
            .ok_or_else(|| fail("title", "div.info-txt > a"))?;
        let title = element_text(link);

        let start_date = self
            .start_date_re
            .captures(&schedule)
            .map(|c| format!("{}-{}-{}", &c[1], &c[2], &c[3]))
            .ok_or_else(|| fail("start_date", &schedule))?;
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
            .find(&fee_info)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| fail("price", &fee_info))?;
        let count = self
            .count_re
            .find(&fee_info)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| fail("count", &fee_info))?;

        let status = map_status(&status_text, url)?;

        let onclick = link.value().attr("onclick").unwrap_or_default();
        let class_code = class_code_from_onclick(onclick).ok_or_else(|| fail("detail_page_url", onclick))?;

        Ok(Lecture {
            store_name: store_display_name(PROVIDER_NAME, store_name),
            group: String::new(),
            title,
            teacher,
            start_date,
            start_time,
            end_time,
            day_of_week: format!("{day}{DAY_OF_WEEK_SUFFIX}"),
            price,
            count,
            status,
            detail_page_url: detail_url(
                PROVIDER_NAME,
                &self.base_url,
                DETAIL_PATH,
                &[
                    ("cls_cd", class_code.as_str()),
                    ("is_category_open", "N"),
                    ("search_term_cd", self.search_term_code.as_str()),
                    ("search_str_cd", store_code),
                ],
            )?,
            ..Lecture::default()
        })
    }
}

/// Text between the first and the last single quote: `goView('CL0001')` -> `CL0001`
fn class_code_from_onclick(onclick: &str) -> Option<String> {
    let first = onclick.find('\'')?;
    let last = onclick.rfind('\'')?;
    if first == last {
        return None;
    }
    let code = clean_string(&onclick[first + 1..last]);
    (!code.is_empty()).then_some(code)
}

fn map_status(text: &str, url: &str) -> ScrapeResult<ReceptionStatus> {
    match text {
        "바로신청" => Ok(ReceptionStatus::Possible),
        "접수마감" => Ok(ReceptionStatus::Closed),
        "대기자 신청" => Ok(ReceptionStatus::StandBy),
        _ => Err(ScrapeError::unsupported_status(PROVIDER_NAME, text, url)),
    }
}

/// 검색년도 + "0" + 검색시즌: 2021 여름 -> "202102"
pub(crate) fn search_term_code(search: &SearchConfig) -> String {
    format!("{}0{}", clean_string(&search.year), clean_string(&search.season_code))
}

pub struct LottemartCollector {
    client: HttpClient,
    config: LottemartConfig,
    search_term_code: String,
    parser: Arc<LottemartParser>,
    semaphore: Arc<Semaphore>,
}

impl LottemartCollector {
    pub fn new(
        client: HttpClient,
        config: LottemartConfig,
        search: &SearchConfig,
        max_concurrent_requests: usize,
    ) -> ScrapeResult<Self> {
        let search_term_code = search_term_code(search);
        let parser = Arc::new(LottemartParser::new(&config.base_url, &search_term_code)?);
        Ok(Self {
            client,
            config,
            search_term_code,
            parser,
            semaphore: Arc::new(Semaphore::new(max_concurrent_requests)),
        })
    }

    fn search_form(&self, page: usize, store_code: &str) -> Vec<(String, String)> {
        let categories = &self.config.category_codes;
        let mut fields: Vec<(String, String)> = [
            ("currPageNo", page.to_string()),
            ("search_list_type", String::new()),
            ("search_str_cd", store_code.to_string()),
            ("search_order_gbn", String::new()),
            ("search_reg_status", String::new()),
            ("is_category_open", "Y".to_string()),
            ("from_fg", String::new()),
            ("cls_cd", String::new()),
            ("fam_no", String::new()),
            ("wish_typ", String::new()),
            ("search_term_cd", self.search_term_code.clone()),
            ("search_day_fg", String::new()),
            ("search_cls_nm", String::new()),
            ("search_cat_cd", categories.join(",")),
            ("search_opt_cd", String::new()),
            ("search_tit_cd", String::new()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        fields.extend(categories.iter().map(|code| ("arr_cat_cd".to_string(), code.clone())));
        fields
    }

    async fn collect_store(&self, store_code: &str, store_name: &str) -> ScrapeResult<Vec<Lecture>> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), SEARCH_PATH);

        let first_page = self.client.post_form(&url, &self.search_form(1, store_code)).await?;
        let page_info = self.parser.parse_page_info(&first_page, &url)?;
        debug!(
            "{} {}: page {}/{}, {} lectures ({} open, {} closed online, {} closed)",
            PROVIDER_NAME,
            store_name,
            page_info.current_page,
            page_info.total_pages,
            page_info.total_lectures,
            page_info.open,
            page_info.online_closed,
            page_info.closed
        );

        let mut lectures = self.parser.parse_page(&first_page, store_code, store_name, &url)?;

        let jobs: Vec<_> = (2..=page_info.total_pages)
            .map(|page| {
                let client = self.client.clone();
                let parser = Arc::clone(&self.parser);
                let url = url.clone();
                let form = self.search_form(page, store_code);
                let store_code = store_code.to_string();
                let store_name = store_name.to_string();
                move || async move {
                    let body = client.post_form(&url, &form).await?;
                    parser.parse_page(&body, &store_code, &store_name, &url)
                }
            })
            .collect();

        let handles = spawn_page_tasks(&self.semaphore, jobs);
        lectures.extend(join_page_tasks(PROVIDER_NAME, handles).await?);
        Ok(lectures)
    }
}

#[async_trait]
impl LectureCollector for LottemartCollector {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn collect(&self) -> ScrapeResult<Vec<Lecture>> {
        info!("{} 문화센터 강좌 수집을 시작합니다.(검색조건:{})", PROVIDER_NAME, self.search_term_code);

        let mut lectures = Vec::new();
        for (store_code, store_name) in &self.config.stores {
            lectures.extend(self.collect_store(store_code, store_name).await?);
        }
        lectures.retain(|lecture| !lecture.is_sentinel());

        info!("{} 문화센터 강좌 수집이 완료되었습니다. 총 {}개의 강좌가 수집되었습니다.", PROVIDER_NAME, lectures.len());
        Ok(lectures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://culture.lottemart.com";

    fn row(status: &str, pageinfo: Option<&str>) -> String {
        let attr = pageinfo.map(|p| format!(" pageinfo=\"{p}\"")).unwrap_or_default();
        format!(
            r##"<tr{attr}>
                <td><div class="info-txt"><a href="#" onclick="javascript:goView('CL2021070001'); return false;"> 튼튼 발레 (5~7세) </a></div></td>
                <td> 김강사 </td>
                <td>(토) 10:30~11:20 2021.07.03</td>
                <td>12회  60,000원</td>
                <td><div><div><a class="btn-status">상세</a><a class="btn-status">{status}</a></div></div></td>
            </tr>"##
        )
    }

    fn parser() -> LottemartParser {
        LottemartParser::new(BASE, "202102").unwrap()
    }

    #[test]
    fn parses_rows() {
        let body = format!("{}{}", row("바로신청", None), row("접수마감", Some("1|1|2|1|0|1")));
        let lectures = parser().parse_page(&body, "705", "여수점", "u").unwrap();

        assert_eq!(lectures.len(), 2);
        let lecture = &lectures[0];
        assert_eq!(lecture.store_name, "롯데마트 여수점");
        assert_eq!(lecture.group, "");
        assert_eq!(lecture.title, "튼튼 발레 (5~7세)");
        assert_eq!(lecture.teacher, "김강사");
        assert_eq!(lecture.start_date, "2021-07-03");
        assert_eq!(lecture.start_time, "10:30");
        assert_eq!(lecture.end_time, "11:20");
        assert_eq!(lecture.day_of_week, "토요일");
        assert_eq!(lecture.price, "60,000원");
        assert_eq!(lecture.count, "12회");
        assert_eq!(lecture.status, ReceptionStatus::Possible);
        assert_eq!(
            lecture.detail_page_url,
            "http://culture.lottemart.com/cu/gus/course/courseinfo/courseview.do?cls_cd=CL2021070001&is_category_open=N&search_term_cd=202102&search_str_cd=705"
        );
        assert_eq!(lectures[1].status, ReceptionStatus::Closed);
    }

    #[test]
    fn reads_page_info_from_last_row() {
        let body = format!("{}{}", row("바로신청", None), row("대기자 신청", Some("1|5|85|61|0|24")));
        let info = parser().parse_page_info(&body, "u").unwrap();
        assert_eq!(info.current_page, 1);
        assert_eq!(info.total_pages, 5);
        assert_eq!(info.total_lectures, 85);
        assert_eq!(info.open, 61);
        assert_eq!(info.online_closed, 0);
        assert_eq!(info.closed, 24);
    }

    #[test]
    fn malformed_page_info_is_fatal() {
        let body = row("바로신청", Some("1|5|85"));
        assert!(matches!(
            parser().parse_page_info(&body, "u"),
            Err(ScrapeError::FieldExtractionFailed { .. })
        ));
        assert!(parser().parse_page_info(&row("바로신청", None), "u").is_err());
    }

    #[test]
    fn no_data_row_is_a_sentinel() {
        let body = r#"<tr pageinfo="1|0|0|0|0|0"><td colspan="5">검색된 강좌가 없습니다.</td></tr>"#;
        let lectures = parser().parse_page(body, "705", "여수점", "u").unwrap();
        assert_eq!(lectures.len(), 1);
        assert!(lectures[0].is_sentinel());
    }

    #[test]
    fn column_count_mismatch_is_fatal() {
        let body = "<tr><td>a</td><td>b</td><td>c</td></tr>";
        let err = parser().parse_page(body, "705", "여수점", "http://example.com/list").unwrap_err();
        assert_eq!(err, ScrapeError::column_count_mismatch(PROVIDER_NAME, 5, 3, "http://example.com/list"));
    }

    #[test]
    fn unknown_status_is_fatal() {
        let err = parser().parse_page(&row("전화문의", None), "705", "여수점", "u").unwrap_err();
        assert!(matches!(err, ScrapeError::UnsupportedStatus { ref status, .. } if status == "전화문의"));
    }

    #[test]
    fn class_code_between_quotes() {
        assert_eq!(class_code_from_onclick("goView('A1')").as_deref(), Some("A1"));
        assert_eq!(class_code_from_onclick("goView(A1)"), None);
        assert_eq!(class_code_from_onclick("goView('A1)"), None);
    }

    #[test]
    fn term_code_joins_year_and_season() {
        let search = SearchConfig {
            year: " 2021 ".to_string(),
            season_code: "2".to_string(),
        };
        assert_eq!(search_term_code(&search), "202102");
    }
}
