//! 이마트 문화센터 collector
//!
//! GraphQL (AWS AppSync) API replayed with the site's public API key and an
//! optional captured authorization token. Pages are requested one at a time:
//! the endpoint reports inconsistent totals under concurrent load.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{detail_url, store_display_name};
use crate::application::collection::LectureCollector;
use crate::domain::{DAY_OF_WEEK_SUFFIX, Lecture, ReceptionStatus};
use crate::infrastructure::config::EmartConfig;
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

pub const PROVIDER_NAME: &str = "이마트";

/// 한번에 검색할 강좌 갯수
const PAGE_SIZE: usize = 20;

const AMPLIFY_USER_AGENT: &str = "aws-amplify/3.8.14 js";

const CLASS_QUERY: &str = "query getClassByFiltering($keyword: String, $filterData: [FilterData], $sortKey: String, $from: Int, $size: Int) {
  getClassByFiltering(keyword: $keyword, filterData: $filterData, sortKey: $sortKey, from: $from, size: $size) {
    total
    data {
      classId
      classStatus
      classTitle
      classDay
      classTime { startTime endTime }
      classTimes
      classFee
      classDateInfo { classStartDate }
    }
  }
}
";

const STORE_QUERY: &str = "query getStoreAreaList($isAll: Boolean!) {
  getStoreAreaList(isAll: $isAll) {
    area
    storeListInfo { storeName storeCode }
  }
}
";

const CATEGORY_QUERY: &str = "query getCategoryList {
  getCategoryList {
    message {
      subCategory { categoryCode categoryName }
    }
  }
}
";

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassSearchData {
    get_class_by_filtering: ClassPage,
}

#[derive(Debug, Deserialize)]
struct ClassPage {
    total: usize,
    #[serde(default)]
    data: Vec<ClassItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClassItem {
    class_id: String,
    class_status: String,
    class_title: String,
    #[serde(default)]
    class_day: Vec<String>,
    class_time: ClassTime,
    class_times: i64,
    class_fee: i64,
    class_date_info: ClassDateInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassTime {
    start_time: String,
    end_time: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassDateInfo {
    class_start_date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreAreaData {
    #[serde(default)]
    get_store_area_list: Vec<StoreArea>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreArea {
    #[serde(default)]
    store_list_info: Vec<StoreInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreInfo {
    store_name: String,
    store_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryData {
    get_category_list: CategoryList,
}

#[derive(Debug, Deserialize)]
struct CategoryList {
    #[serde(default)]
    message: Vec<CategoryGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryGroup {
    #[serde(default)]
    sub_category: Vec<Category>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Category {
    category_code: String,
    category_name: String,
}

/// "20210703" -> "2021-07-03"
fn format_date(raw: &str) -> Option<String> {
    (raw.len() == 8 && raw.chars().all(|c| c.is_ascii_digit()))
        .then(|| format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..]))
}

/// "1430" -> "14:30"
fn format_time(raw: &str) -> Option<String> {
    (raw.len() == 4 && raw.chars().all(|c| c.is_ascii_digit())).then(|| format!("{}:{}", &raw[..2], &raw[2..]))
}

fn map_status(status: &str, url: &str) -> ScrapeResult<ReceptionStatus> {
    match status {
        "접수중" => Ok(ReceptionStatus::Possible),
        "접수마감" | "정원마감" => Ok(ReceptionStatus::Closed),
        "접수대기" => Ok(ReceptionStatus::StandBy),
        _ => Err(ScrapeError::unsupported_status(PROVIDER_NAME, status, url)),
    }
}

/// One search hit as a lecture of `store_name`
pub(crate) fn convert_class(item: &ClassItem, store_name: &str, base_url: &str, url: &str) -> ScrapeResult<Lecture> {
    let fail = |field: &str, data: &str| ScrapeError::field_extraction_failed(PROVIDER_NAME, field, data, url);

    if item.class_title.trim().is_empty() {
        return Err(fail("classTitle", &item.class_id));
    }

    let start_date = format_date(&item.class_date_info.class_start_date)
        .ok_or_else(|| fail("classStartDate", &item.class_date_info.class_start_date))?;
    let start_time =
        format_time(&item.class_time.start_time).ok_or_else(|| fail("startTime", &item.class_time.start_time))?;
    let end_time = format_time(&item.class_time.end_time).ok_or_else(|| fail("endTime", &item.class_time.end_time))?;

    let day = item
        .class_day
        .first()
        .map(|day| day.trim())
        .filter(|day| !day.is_empty())
        .ok_or_else(|| fail("classDay", &item.class_day.join(",")))?;

    let status = map_status(&item.class_status, url)?;

    Ok(Lecture {
        store_name: store_display_name(PROVIDER_NAME, store_name),
        group: String::new(),
        title: item.class_title.clone(),
        teacher: String::new(),
        start_date,
        start_time,
        end_time,
        day_of_week: format!("{day}{DAY_OF_WEEK_SUFFIX}"),
        price: item.class_fee.to_string(),
        count: item.class_times.to_string(),
        status,
        detail_page_url: detail_url(PROVIDER_NAME, base_url, &format!("/class/{}", item.class_id), &[])?,
        ..Lecture::default()
    })
}

/// Every configured store must be listed under the same code and name.
fn verify_stores(data: &StoreAreaData, stores: &BTreeMap<String, String>) -> ScrapeResult<()> {
    for (code, name) in stores {
        let found = data
            .get_store_area_list
            .iter()
            .flat_map(|area| area.store_list_info.iter())
            .any(|store| store.store_code == *code && store.store_name == *name);
        if !found {
            return Err(ScrapeError::code_mismatch(PROVIDER_NAME, "점포", code, name));
        }
    }
    Ok(())
}

fn verify_lecture_groups(data: &CategoryData, groups: &BTreeMap<String, String>) -> ScrapeResult<()> {
    for (code, name) in groups {
        let found = data
            .get_category_list
            .message
            .iter()
            .flat_map(|group| group.sub_category.iter())
            .any(|category| category.category_code == *code && category.category_name == *name);
        if !found {
            return Err(ScrapeError::code_mismatch(PROVIDER_NAME, "강좌군", code, name));
        }
    }
    Ok(())
}

fn class_search_variables(store_code: &str, groups: &BTreeMap<String, String>, from: usize) -> Value {
    json!({
        "keyword": "",
        "filterData": [
            { "type": "mainStoreInfo.storeCode", "data": [store_code] },
            { "type": "subCategory", "data": groups.keys().collect::<Vec<_>>() },
        ],
        "sortKey": "deadline",
        "from": from,
        "size": PAGE_SIZE,
    })
}

fn header_value(name: &str, value: &str) -> ScrapeResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ScrapeError::ClientBuild {
        message: format!("invalid {name} header: {e}"),
    })
}

pub struct EmartCollector {
    client: HttpClient,
    config: EmartConfig,
    headers: HeaderMap,
}

impl EmartCollector {
    pub fn new(client: HttpClient, config: EmartConfig) -> ScrapeResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, header_value("origin", &config.base_url)?);
        headers.insert(REFERER, header_value("referer", &config.base_url)?);
        headers.insert(
            HeaderName::from_static("x-amz-user-agent"),
            HeaderValue::from_static(AMPLIFY_USER_AGENT),
        );
        headers.insert(HeaderName::from_static("x-api-key"), header_value("x-api-key", &config.api_key)?);
        if !config.authorization.trim().is_empty() {
            headers.insert(AUTHORIZATION, header_value("authorization", config.authorization.trim())?);
        }

        Ok(Self { client, config, headers })
    }

    async fn query<T: DeserializeOwned>(&self, operation: &str, query: &str, variables: Value) -> ScrapeResult<T> {
        let url = &self.config.api_url;
        let body = json!({ "query": query, "variables": variables });
        let response: GraphQlResponse<T> = self.client.post_json(url, self.headers.clone(), &body).await?;

        response.data.ok_or_else(|| {
            let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
            ScrapeError::field_extraction_failed(PROVIDER_NAME, operation, &messages.join("; "), url)
        })
    }

    async fn search_classes(&self, store_code: &str, from: usize) -> ScrapeResult<ClassPage> {
        let variables = class_search_variables(store_code, &self.config.lecture_groups, from);
        let data: ClassSearchData = self.query("getClassByFiltering", CLASS_QUERY, variables).await?;
        Ok(data.get_class_by_filtering)
    }

    async fn collect_store(&self, store_code: &str, store_name: &str) -> ScrapeResult<Vec<Lecture>> {
        let total = self.search_classes(store_code, 0).await?.total;
        if total == 0 {
            return Err(ScrapeError::field_extraction_failed(
                PROVIDER_NAME,
                "total",
                &format!("{store_name}: 0"),
                &self.config.api_url,
            ));
        }
        debug!("{} {}: {} lectures", PROVIDER_NAME, store_name, total);

        let mut lectures = Vec::with_capacity(total);
        for from in (0..total).step_by(PAGE_SIZE) {
            let page = self.search_classes(store_code, from).await?;
            for item in &page.data {
                lectures.push(convert_class(item, store_name, &self.config.base_url, &self.config.api_url)?);
            }
        }
        Ok(lectures)
    }
}

#[async_trait]
impl LectureCollector for EmartCollector {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn collect(&self) -> ScrapeResult<Vec<Lecture>> {
        info!("{} 문화센터 강좌 수집을 시작합니다.", PROVIDER_NAME);

        let categories: CategoryData = self.query("getCategoryList", CATEGORY_QUERY, json!({})).await?;
        verify_lecture_groups(&categories, &self.config.lecture_groups)?;

        let stores: StoreAreaData = self.query("getStoreAreaList", STORE_QUERY, json!({ "isAll": false })).await?;
        verify_stores(&stores, &self.config.stores)?;

        let mut lectures = Vec::new();
        for (store_code, store_name) in &self.config.stores {
            lectures.extend(self.collect_store(store_code, store_name).await?);
        }

        info!("{} 문화센터 강좌 수집이 완료되었습니다. 총 {}개의 강좌가 수집되었습니다.", PROVIDER_NAME, lectures.len());
        Ok(lectures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.cultureclub.emart.com";

    const SEARCH_RESPONSE: &str = r#"{
        "data": {
            "getClassByFiltering": {
                "total": 1,
                "data": [{
                    "PK": "CLASS#1",
                    "classId": "C-2021-0001",
                    "classStatus": "접수중",
                    "classTitle": "[With Mom] 오감놀이 (12~24개월)",
                    "classDay": ["화"],
                    "classTime": { "startTime": "1630", "endTime": "1720" },
                    "classTimes": 12,
                    "classFee": 48000,
                    "classDateInfo": { "classStartDate": "20210706", "classEndDate": "20210921" }
                }]
            }
        }
    }"#;

    fn first_item() -> ClassItem {
        let response: GraphQlResponse<ClassSearchData> = serde_json::from_str(SEARCH_RESPONSE).unwrap();
        response.data.unwrap().get_class_by_filtering.data[0].clone()
    }

    #[test]
    fn converts_class_item() {
        let lecture = convert_class(&first_item(), "여수", BASE, "https://api.example.com/graphql").unwrap();

        assert_eq!(lecture.store_name, "이마트 여수");
        assert_eq!(lecture.title, "[With Mom] 오감놀이 (12~24개월)");
        assert_eq!(lecture.start_date, "2021-07-06");
        assert_eq!(lecture.start_time, "16:30");
        assert_eq!(lecture.end_time, "17:20");
        assert_eq!(lecture.day_of_week, "화요일");
        assert_eq!(lecture.price, "48000");
        assert_eq!(lecture.count, "12");
        assert_eq!(lecture.status, ReceptionStatus::Possible);
        assert_eq!(lecture.detail_page_url, "https://www.cultureclub.emart.com/class/C-2021-0001");
    }

    #[test]
    fn malformed_time_is_fatal() {
        let mut item = first_item();
        item.class_time.start_time = "16:30".to_string();
        let err = convert_class(&item, "여수", BASE, "u").unwrap_err();
        assert!(matches!(err, ScrapeError::FieldExtractionFailed { ref field, .. } if field == "startTime"));
    }

    #[test]
    fn missing_day_is_fatal() {
        let mut item = first_item();
        item.class_day.clear();
        assert!(convert_class(&item, "여수", BASE, "u").is_err());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(map_status("정원마감", "u").unwrap(), ReceptionStatus::Closed);
        assert_eq!(map_status("접수마감", "u").unwrap(), ReceptionStatus::Closed);
        assert_eq!(map_status("접수대기", "u").unwrap(), ReceptionStatus::StandBy);
        assert!(map_status("폐강", "u").is_err());
    }

    #[test]
    fn verifies_store_codes() {
        let data: GraphQlResponse<StoreAreaData> = serde_json::from_str(
            r#"{"data":{"getStoreAreaList":[{"PK":"AREA#1","area":"전라","storeListInfo":[{"storeName":"여수","storeCode":"560"},{"storeName":"순천","storeCode":"900"}]}]}}"#,
        )
        .unwrap();
        let data = data.data.unwrap();

        assert!(verify_stores(&data, &EmartConfig::default().stores).is_ok());

        let renamed = BTreeMap::from([("560".to_string(), "순천".to_string())]);
        assert!(matches!(
            verify_stores(&data, &renamed),
            Err(ScrapeError::CodeMismatch { ref code, .. }) if code == "560"
        ));

        let partly_unknown = BTreeMap::from([
            ("560".to_string(), "여수".to_string()),
            ("999".to_string(), "광주".to_string()),
        ]);
        assert!(verify_stores(&data, &partly_unknown).is_err());
    }

    #[test]
    fn verifies_lecture_groups() {
        let data: GraphQlResponse<CategoryData> = serde_json::from_str(
            r#"{"data":{"getCategoryList":{"message":[
                {"mainCategory":{"categoryCode":"4"},"subCategory":[{"categoryCode":"402","categoryName":"With Mom"},{"categoryCode":"403","categoryName":"With mom(event)"}]},
                {"subCategory":[{"categoryCode":"404","categoryName":"Kids & Children"},{"categoryCode":"406","categoryName":"Kids & Children(event)"}]}
            ]}}}"#,
        )
        .unwrap();
        let data = data.data.unwrap();

        assert!(verify_lecture_groups(&data, &EmartConfig::default().lecture_groups).is_ok());
        let unknown = BTreeMap::from([("499".to_string(), "Adult".to_string())]);
        assert!(verify_lecture_groups(&data, &unknown).is_err());
    }

    #[test]
    fn graphql_errors_leave_data_empty() {
        let response: GraphQlResponse<CategoryData> =
            serde_json::from_str(r#"{"data":null,"errors":[{"message":"Unauthorized"}]}"#).unwrap();
        assert!(response.data.is_none());
        assert_eq!(response.errors[0].message, "Unauthorized");
    }

    #[test]
    fn search_variables_filter_store_and_groups() {
        let groups = EmartConfig::default().lecture_groups;
        let variables = class_search_variables("560", &groups, 40);
        assert_eq!(variables["from"], 40);
        assert_eq!(variables["size"], 20);
        assert_eq!(variables["filterData"][0]["data"][0], "560");
        assert_eq!(variables["filterData"][1]["data"].as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn authorization_header_only_when_configured() {
        let client = HttpClient::from_config(&crate::infrastructure::config::HttpConfig::default()).unwrap();
        let collector = EmartCollector::new(client.clone(), EmartConfig::default()).unwrap();
        assert!(!collector.headers.contains_key(AUTHORIZATION));
        assert!(collector.headers.contains_key("x-api-key"));

        let config = EmartConfig {
            authorization: "token-value".to_string(),
            ..EmartConfig::default()
        };
        let collector = EmartCollector::new(client, config).unwrap();
        assert_eq!(collector.headers[AUTHORIZATION], "token-value");
    }
}
