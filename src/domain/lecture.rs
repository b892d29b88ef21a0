//! Lecture record - the normalized unit flowing through the whole pipeline
//!
//! Every source collector turns its provider-specific HTML/JSON into this shape.
//! Apart from the exclusion flag the record is immutable once created.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 평일 (월~금) 요일 문자열
pub const WEEKDAYS: [&str; 5] = ["월요일", "화요일", "수요일", "목요일", "금요일"];

/// Suffix appended to a single-character day name ("월" -> "월요일")
pub const DAY_OF_WEEK_SUFFIX: &str = "요일";

/// 접수상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReceptionStatus {
    /// 알수없음
    #[default]
    Unknown,
    /// 접수가능
    Possible,
    /// 접수마감
    Closed,
    /// 대기신청
    StandBy,
    /// 방문상담
    VisitConsultation,
    /// 방문선착순
    VisitFirstComeFirstServed,
    /// 당일참여
    DayParticipation,
}

impl ReceptionStatus {
    /// Label written to the exported CSV
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "알수없음",
            Self::Possible => "접수가능",
            Self::Closed => "접수마감",
            Self::StandBy => "대기신청",
            Self::VisitConsultation => "방문상담",
            Self::VisitFirstComeFirstServed => "방문선착순",
            Self::DayParticipation => "당일참여",
        }
    }
}

impl fmt::Display for ReceptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scraped course offering
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lecture {
    /// 점포 (chain + branch)
    pub store_name: String,
    /// 강좌그룹, may be empty
    pub group: String,
    /// 강좌명 - the only input to age extraction
    pub title: String,
    /// 강사명, may be empty
    pub teacher: String,
    /// 개강일 (YYYY-MM-DD)
    pub start_date: String,
    /// 시작시간 (HH:MM, 24h)
    pub start_time: String,
    /// 종료시간 (HH:MM, 24h)
    pub end_time: String,
    /// 요일 ("월요일" ...)
    pub day_of_week: String,
    /// 수강료
    pub price: String,
    /// 강좌횟수
    pub count: String,
    /// 접수상태
    pub status: ReceptionStatus,
    /// 상세페이지
    pub detail_page_url: String,
    #[serde(skip)]
    pub(crate) excluded: bool,
}

impl Lecture {
    /// A record without a title marks "no data on this page" and is discarded on collection.
    pub fn is_sentinel(&self) -> bool {
        self.title.is_empty()
    }

    pub fn is_excluded(&self) -> bool {
        self.excluded
    }

    /// Marks the lecture as excluded. Exclusion is never undone within a run.
    pub fn exclude(&mut self) {
        self.excluded = true;
    }

    /// Monday..Friday
    pub fn is_on_weekday(&self) -> bool {
        WEEKDAYS.contains(&self.day_of_week.as_str())
    }
}
