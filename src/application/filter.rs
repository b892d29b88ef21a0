//! Eligibility & policy filter
//!
//! Three passes over the collected lectures, in this order:
//! 1. 접수마감 강좌 제외
//! 2. 주말 및 공휴일이 아닌 평일 16시 이전의 강좌 제외
//! 3. 개월수 및 나이에 포함되지 않는 강좌 제외
//!
//! A pass only ever sets the exclusion flag, so once a lecture is excluded it
//! stays excluded. Lectures already excluded are not re-examined.

use std::collections::HashSet;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{AgeLimitType, AgeRangeError, AgeRangeExtractor, Lecture, ReceptionStatus};
use crate::infrastructure::config::AppConfig;

/// Weekday lectures starting before this hour are excluded (unless on a holiday).
pub const WEEKDAY_CUTOFF_HOUR: u32 = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Lecture '{title}' has an unreadable start time '{start_time}'")]
    InvalidStartTime { title: String, start_time: String },

    #[error(transparent)]
    AgeRange(#[from] AgeRangeError),
}

/// What the filter did to one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub total: usize,
    pub excluded_by_status: usize,
    pub excluded_by_schedule: usize,
    pub excluded_by_age: usize,
    /// Titles no age rule recognised; kept, but worth a manual look
    pub unknown_age_titles: Vec<String>,
}

impl FilterSummary {
    pub fn excluded(&self) -> usize {
        self.excluded_by_status + self.excluded_by_schedule + self.excluded_by_age
    }

    pub fn remaining(&self) -> usize {
        self.total - self.excluded()
    }
}

pub struct LectureFilter {
    child_age: u32,
    child_months: u32,
    holidays: HashSet<String>,
    extractor: AgeRangeExtractor,
}

impl LectureFilter {
    pub fn new(child_age: u32, child_months: u32, holidays: &[String], extractor: AgeRangeExtractor) -> Self {
        Self {
            child_age,
            child_months,
            holidays: holidays.iter().map(|day| day.trim().to_string()).collect(),
            extractor,
        }
    }

    /// Filter for the configured child, converting birth years against the current year
    pub fn from_config(config: &AppConfig) -> Result<Self, FilterError> {
        Ok(Self::new(
            config.child.age,
            config.child.months,
            &config.holidays,
            AgeRangeExtractor::for_current_year()?,
        ))
    }

    /// Marks every ineligible lecture as excluded.
    pub fn apply(&self, lectures: &mut [Lecture]) -> Result<FilterSummary, FilterError> {
        let mut summary = FilterSummary {
            total: lectures.len(),
            ..FilterSummary::default()
        };

        for lecture in lectures.iter_mut().filter(|l| !l.is_excluded()) {
            if lecture.status == ReceptionStatus::Closed {
                lecture.exclude();
                summary.excluded_by_status += 1;
            }
        }

        for lecture in lectures.iter_mut().filter(|l| !l.is_excluded()) {
            if self.is_unavailable_time(lecture)? {
                lecture.exclude();
                summary.excluded_by_schedule += 1;
            }
        }

        for lecture in lectures.iter_mut().filter(|l| !l.is_excluded()) {
            let range = self.extractor.extract(&lecture.title)?;
            let eligible = match range.kind {
                AgeLimitType::Months => range.contains(self.child_months),
                AgeLimitType::Age => range.contains(self.child_age),
                AgeLimitType::Unknown => {
                    warn!("⚠️ 연령 제한을 판단할 수 없는 강좌입니다(확인 필요): {} [{}]", lecture.title, lecture.store_name);
                    summary.unknown_age_titles.push(lecture.title.clone());
                    true
                }
            };
            if !eligible {
                lecture.exclude();
                summary.excluded_by_age += 1;
            }
        }

        info!(
            "총 {}건의 문화센터 강좌중에서 {}건이 필터링되어 제외되었습니다.",
            summary.total,
            summary.excluded()
        );
        info!(
            "제외 사유: 접수마감 {}건, 평일 {}시 이전 {}건, 연령 {}건 (연령 미확인 {}건)",
            summary.excluded_by_status,
            WEEKDAY_CUTOFF_HOUR,
            summary.excluded_by_schedule,
            summary.excluded_by_age,
            summary.unknown_age_titles.len()
        );

        Ok(summary)
    }

    /// A non-holiday weekday session starting before the cutoff hour
    fn is_unavailable_time(&self, lecture: &Lecture) -> Result<bool, FilterError> {
        if !lecture.is_on_weekday() || self.holidays.contains(&lecture.start_date) {
            return Ok(false);
        }

        let hour = lecture
            .start_time
            .get(..2)
            .and_then(|hh| hh.parse::<u32>().ok())
            .ok_or_else(|| FilterError::InvalidStartTime {
                title: lecture.title.clone(),
                start_time: lecture.start_time.clone(),
            })?;

        Ok(hour < WEEKDAY_CUTOFF_HOUR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(holidays: &[&str]) -> LectureFilter {
        let holidays: Vec<String> = holidays.iter().map(ToString::to_string).collect();
        LectureFilter::new(6, 62, &holidays, AgeRangeExtractor::new(2024).unwrap())
    }

    fn lecture(title: &str, day: &str, date: &str, start: &str) -> Lecture {
        Lecture {
            title: title.to_string(),
            day_of_week: day.to_string(),
            start_date: date.to_string(),
            start_time: start.to_string(),
            status: ReceptionStatus::Possible,
            ..Lecture::default()
        }
    }

    #[test]
    fn closed_lectures_are_excluded() {
        let mut lectures = vec![lecture("미술놀이", "토요일", "2021-07-03", "10:00")];
        lectures[0].status = ReceptionStatus::Closed;

        let summary = filter(&[]).apply(&mut lectures).unwrap();

        assert!(lectures[0].is_excluded());
        assert_eq!(summary.excluded_by_status, 1);
        assert_eq!(summary.remaining(), 0);
    }

    #[test]
    fn weekday_cutoff_boundary() {
        let mut lectures = vec![
            lecture("미술놀이", "월요일", "2021-07-05", "15:59"),
            lecture("미술놀이", "월요일", "2021-07-05", "16:00"),
            lecture("미술놀이", "토요일", "2021-07-03", "09:00"),
        ];

        let summary = filter(&[]).apply(&mut lectures).unwrap();

        assert!(lectures[0].is_excluded());
        assert!(!lectures[1].is_excluded());
        assert!(!lectures[2].is_excluded());
        assert_eq!(summary.excluded_by_schedule, 1);
    }

    #[test]
    fn holidays_lift_the_weekday_policy() {
        let mut lectures = vec![lecture("미술놀이", "월요일", "2021-08-16", "10:00")];
        filter(&["2021-08-16"]).apply(&mut lectures).unwrap();
        assert!(!lectures[0].is_excluded());
    }

    #[test]
    fn age_and_months_ranges() {
        let mut lectures = vec![
            lecture("튼튼 발레 (5~7세)", "토요일", "2021-07-03", "10:00"),
            lecture("오감놀이 (12~24개월)", "토요일", "2021-07-03", "10:00"),
            lecture("키즈 쿠킹 (48~72개월)", "토요일", "2021-07-03", "10:00"),
            lecture("주니어 수영 (초2~초4)", "일요일", "2021-07-04", "10:00"),
        ];

        let summary = filter(&[]).apply(&mut lectures).unwrap();

        assert!(!lectures[0].is_excluded());
        assert!(lectures[1].is_excluded());
        assert!(!lectures[2].is_excluded());
        assert!(lectures[3].is_excluded());
        assert_eq!(summary.excluded_by_age, 2);
    }

    #[test]
    fn unknown_age_is_kept_and_reported() {
        let mut lectures = vec![lecture("주말 가족 요리교실", "토요일", "2021-07-03", "10:00")];

        let summary = filter(&[]).apply(&mut lectures).unwrap();

        assert!(!lectures[0].is_excluded());
        assert_eq!(summary.unknown_age_titles, vec!["주말 가족 요리교실".to_string()]);
    }

    #[test]
    fn exclusion_is_counted_once() {
        let mut lectures = vec![lecture("오감놀이 (12~24개월)", "화요일", "2021-07-06", "10:00")];
        lectures[0].status = ReceptionStatus::Closed;

        let summary = filter(&[]).apply(&mut lectures).unwrap();

        assert!(lectures[0].is_excluded());
        assert_eq!(summary.excluded(), 1);
        assert_eq!(summary.excluded_by_status, 1);
        assert_eq!(summary.excluded_by_schedule, 0);
        assert_eq!(summary.excluded_by_age, 0);
    }

    #[test]
    fn already_excluded_stays_excluded() {
        let mut lectures = vec![lecture("튼튼 발레 (5~7세)", "토요일", "2021-07-03", "10:00")];
        lectures[0].exclude();

        filter(&[]).apply(&mut lectures).unwrap();
        assert!(lectures[0].is_excluded());
    }

    #[test]
    fn unreadable_start_time_is_an_error() {
        let mut lectures = vec![lecture("미술놀이", "수요일", "2021-07-07", "오전")];
        let err = filter(&[]).apply(&mut lectures).unwrap_err();
        assert!(matches!(err, FilterError::InvalidStartTime { .. }));
    }
}
