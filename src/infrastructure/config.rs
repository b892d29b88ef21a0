//! Configuration infrastructure
//!
//! Run parameters that used to be edited in source before every collection
//! (search year/season, the child's age, the holiday calendar) live in one
//! JSON file together with the provider endpoints and logging settings.
//!
//! Every section has `#[serde(default)]`, so a config file only needs the
//! values that differ from [`defaults`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file {path} contains invalid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 검색년도 / 검색시즌
    pub search: SearchConfig,

    /// 강좌를 수강하는 아이
    pub child: ChildConfig,

    /// 공휴일 (YYYY-MM-DD)
    pub holidays: Vec<String>,

    pub export: ExportConfig,

    pub http: HttpConfig,

    pub logging: LoggingConfig,

    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 검색년도 (e.g. "2021")
    pub year: String,

    /// 검색시즌 (봄:1, 여름:2, 가을:3, 겨울:4)
    pub season_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildConfig {
    /// 나이 (세는 나이)
    pub age: u32,

    /// 개월수
    pub months: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory receiving the timestamped CSV
    pub output_dir: PathBuf,

    /// Output file name prefix: `<prefix>-YYYYMMDDHHMMSS.csv`
    pub file_prefix: String,

    /// Previous run's CSV used for change annotation
    pub snapshot_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// User agent string
    pub user_agent: String,

    /// Upper bound of in-flight page requests per provider
    pub max_concurrent_requests: usize,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Log directory; `logs/` next to the executable when unset
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub homeplus: HomeplusConfig,
    pub lottemart: LottemartConfig,
    pub emart: EmartConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeplusConfig {
    pub enabled: bool,
    pub base_url: String,
    /// 점포코드 -> 점포명
    pub stores: BTreeMap<String, String>,
    /// 강좌군코드 -> 강좌군명
    pub lecture_groups: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LottemartConfig {
    pub enabled: bool,
    pub base_url: String,
    /// 점포코드 -> 점포명
    pub stores: BTreeMap<String, String>,
    /// 검색 대상 강좌 카테고리 코드
    pub category_codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmartConfig {
    pub enabled: bool,
    pub base_url: String,
    /// GraphQL endpoint
    pub api_url: String,
    /// Public client key sent as `x-api-key`
    pub api_key: String,
    /// Captured `Authorization` token, replayed as-is when non-empty
    pub authorization: String,
    /// 점포코드 -> 점포명
    pub stores: BTreeMap<String, String>,
    /// 강좌군코드 -> 강좌군명
    pub lecture_groups: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            child: ChildConfig::default(),
            holidays: defaults::HOLIDAYS.iter().map(ToString::to_string).collect(),
            export: ExportConfig::default(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            year: defaults::SEARCH_YEAR.to_string(),
            season_code: defaults::SEARCH_SEASON_CODE.to_string(),
        }
    }
}

impl Default for ChildConfig {
    fn default() -> Self {
        Self {
            age: defaults::CHILD_AGE,
            months: defaults::CHILD_MONTHS,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            file_prefix: defaults::EXPORT_FILE_PREFIX.to_string(),
            snapshot_file: PathBuf::from(defaults::SNAPSHOT_FILE_NAME),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            user_agent: defaults::USER_AGENT.to_string(),
            max_concurrent_requests: defaults::MAX_CONCURRENT_REQUESTS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
        }
    }
}

impl Default for HomeplusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: defaults::HOMEPLUS_BASE_URL.to_string(),
            stores: code_map(&[("0035", "광양점"), ("0030", "순천점")]),
            lecture_groups: code_map(&[("MH|EL|IF", "Kids 전체"), ("BB", "Baby 전체")]),
        }
    }
}

impl Default for LottemartConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: defaults::LOTTEMART_BASE_URL.to_string(),
            stores: code_map(&[("705", "여수점")]),
            category_codes: defaults::LOTTEMART_CATEGORY_CODES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Default for EmartConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: defaults::EMART_BASE_URL.to_string(),
            api_url: defaults::EMART_API_URL.to_string(),
            api_key: defaults::EMART_API_KEY.to_string(),
            authorization: String::new(),
            stores: code_map(&[("560", "여수"), ("900", "순천")]),
            lecture_groups: code_map(&[
                ("402", "With Mom"),
                ("403", "With mom(event)"),
                ("404", "Kids & Children"),
                ("406", "Kids & Children(event)"),
            ]),
        }
    }
}

fn code_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(code, name)| ((*code).to_string(), (*name).to_string())).collect()
}

impl AppConfig {
    /// Rejects values that would make every provider query meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let year = self.search.year.trim();
        if year.is_empty() {
            return Err(ConfigError::invalid("search.year", "검색년도는 빈 문자열을 허용하지 않습니다"));
        }
        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::invalid("search.year", format!("'{year}' is not a four-digit year")));
        }

        let season = self.search.season_code.trim();
        if season.is_empty() {
            return Err(ConfigError::invalid("search.season_code", "검색시즌코드는 빈 문자열을 허용하지 않습니다"));
        }
        if !matches!(season, "1" | "2" | "3" | "4") {
            return Err(ConfigError::invalid("search.season_code", format!("'{season}' is not one of 1..4")));
        }

        for holiday in &self.holidays {
            NaiveDate::parse_from_str(holiday, "%Y-%m-%d")
                .map_err(|e| ConfigError::invalid("holidays", format!("'{holiday}': {e}")))?;
        }

        if self.http.max_concurrent_requests == 0 {
            return Err(ConfigError::invalid("http.max_concurrent_requests", "must be at least 1"));
        }

        Ok(())
    }
}

/// Where a loaded [`AppConfig`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// No config file; built-in defaults
    Defaults,
}

/// Configuration manager for loading settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// `culturelecture-scrape.json` in the working directory
    pub fn with_default_path() -> Self {
        Self::new(defaults::CONFIG_FILE_NAME)
    }

    /// Load configuration from file, falling back to defaults if it doesn't exist
    pub async fn load_config(&self) -> Result<AppConfig, ConfigError> {
        self.load_config_with_source().await.map(|(config, _)| config)
    }

    /// Like [`Self::load_config`], also telling where the values came from.
    /// Nothing is logged here: this runs before logging is initialised.
    pub async fn load_config_with_source(&self) -> Result<(AppConfig, ConfigSource), ConfigError> {
        if !fs::try_exists(&self.config_path).await.unwrap_or(false) {
            return Ok((AppConfig::default(), ConfigSource::Defaults));
        }

        let content = fs::read_to_string(&self.config_path).await.map_err(|source| ConfigError::Io {
            path: self.config_path.clone(),
            source,
        })?;

        let config = serde_json::from_str::<AppConfig>(&content).map_err(|source| ConfigError::Json {
            path: self.config_path.clone(),
            source,
        })?;

        Ok((config, ConfigSource::File))
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Default configuration values
pub mod defaults {
    /// Default config file, resolved against the working directory
    pub const CONFIG_FILE_NAME: &str = "culturelecture-scrape.json";

    /// 검색년도
    pub const SEARCH_YEAR: &str = "2021";

    /// 검색시즌 (여름)
    pub const SEARCH_SEASON_CODE: &str = "2";

    /// 아이 나이
    pub const CHILD_AGE: u32 = 6;

    /// 아이 개월수
    pub const CHILD_MONTHS: u32 = 62;

    /// 공휴일 (2021년도)
    pub const HOLIDAYS: &[&str] = &[
        "2021-01-01",
        "2021-02-11", "2021-02-12", "2021-02-13",
        "2021-03-01",
        "2021-05-05",
        "2021-05-19",
        "2021-06-06",
        "2021-08-15",
        "2021-09-20", "2021-09-21", "2021-09-22",
        "2021-10-03",
        "2021-10-09",
        "2021-12-25",
    ];

    pub const EXPORT_FILE_PREFIX: &str = "culturelecture-scrape";

    pub const SNAPSHOT_FILE_NAME: &str = "culturelecture-scrape-latest.csv";

    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// Default maximum concurrent page requests per provider
    pub const MAX_CONCURRENT_REQUESTS: usize = 5;

    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/101.0.4951.67 Safari/537.36";

    /// Default log level
    pub const LOG_LEVEL: &str = "info";

    /// Default JSON format setting
    pub const LOG_JSON_FORMAT: bool = false;

    /// Default console output setting
    pub const LOG_CONSOLE_OUTPUT: bool = true;

    /// Default file output setting
    pub const LOG_FILE_OUTPUT: bool = true;

    pub const HOMEPLUS_BASE_URL: &str = "https://mschool.homeplus.co.kr";

    pub const LOTTEMART_BASE_URL: &str = "http://culture.lottemart.com";

    /// 유아/어린이 강좌 카테고리
    pub const LOTTEMART_CATEGORY_CODES: &[&str] = &[
        "21", "81", "22", "82", "23", "83", "24", "84", "25", "85", "26", "86", "27", "87",
        "31", "32", "33", "34", "35", "36", "37",
        "41", "42", "43", "44", "45", "46", "47", "48",
    ];

    pub const EMART_BASE_URL: &str = "https://www.cultureclub.emart.com";

    pub const EMART_API_URL: &str = "https://o27tfdumlrbf7jmrvql76qbhsm.appsync-api.ap-northeast-2.amazonaws.com/graphql";

    pub const EMART_API_KEY: &str = "da2-ua6i7vyww5cmjkqzwv6gwdqhly";
}
