//! 강좌명 기반 연령/개월수 범위 추출
//!
//! Course titles carry eligibility only as free text ("5세이상", "12~24개월",
//! "3세~초등", "(4세)", "초1~초3", "2019~2020년생" ...). The extractor runs an
//! ordered battery of pattern rules over the title and returns the first match:
//!
//! 1. denylisted title keywords -> unsatisfiable range `[99, 99]`
//! 2. per unit (years, then months):
//!    open-ended lower bound, two-sided range, "~초등", "~초G", "(N)"
//! 3. grade-to-grade range ("초A~초B")
//! 4. birth-year range ("2018~2020년생")
//! 5. fixed phrase table ("(초등)", "(모든연령)" ...)
//! 6. nothing matched -> `Unknown` with the permissive range `[0, ∞)`
//!
//! The extractor holds no mutable state; the same title always yields the same range.

use chrono::Datelike;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Titles containing any of these are adult-oriented programs listed in kids categories.
pub const EXCLUDED_TITLE_KEYWORDS: [&str; 6] = [
    "키즈발레",
    "발레리나",
    "앨리스 스토리텔링 발레",
    "트윈클 동화발레",
    "밸리댄스",
    "[광주국제영어마을",
];

/// Age given to titles hit by the denylist; no child can satisfy it.
pub const EXCLUDED_AGE: u32 = 99;

/// 초등학교 졸업 나이 (세는 나이)
pub const ELEMENTARY_SCHOOL_END_AGE: u32 = 13;

/// 초등학교 1학년 = 8세
pub const GRADE_TO_AGE_OFFSET: u32 = 7;

const MONTHS_PER_YEAR: u32 = 12;

/// 연령제한타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeLimitType {
    /// 알수없음
    Unknown,
    /// 나이 (세)
    Age,
    /// 개월수
    Months,
}

impl AgeLimitType {
    /// Unit suffix used in titles
    const fn suffix(self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Age => "세",
            Self::Months => "개월",
        }
    }

    /// Converts a bound expressed in years into this unit
    const fn from_years(self, years: u32) -> u32 {
        match self {
            Self::Months => years * MONTHS_PER_YEAR,
            Self::Unknown | Self::Age => years,
        }
    }
}

/// Inclusive eligibility interval. `to == None` means no upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeLimitRange {
    pub kind: AgeLimitType,
    pub from: u32,
    pub to: Option<u32>,
}

impl AgeLimitRange {
    pub const fn bounded(kind: AgeLimitType, from: u32, to: u32) -> Self {
        Self { kind, from, to: Some(to) }
    }

    pub const fn open_ended(kind: AgeLimitType, from: u32) -> Self {
        Self { kind, from, to: None }
    }

    /// Result when no rule matched: permissive, not exclusionary
    pub const fn unknown() -> Self {
        Self::open_ended(AgeLimitType::Unknown, 0)
    }

    pub const fn is_unknown(&self) -> bool {
        matches!(self.kind, AgeLimitType::Unknown)
    }

    pub fn contains(&self, value: u32) -> bool {
        value >= self.from && self.to.is_none_or(|to| value <= to)
    }
}

impl fmt::Display for AgeLimitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.kind.suffix();
        match self.to {
            Some(to) => write!(f, "{:?}[{}{unit}~{}{unit}]", self.kind, self.from, to),
            None => write!(f, "{:?}[{}{unit}~]", self.kind, self.from),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgeRangeError {
    #[error("Invalid age rule pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Matched text '{text}' in title '{title}' is not a valid number")]
    InvalidNumber { title: String, text: String },
}

/// Fixed idioms checked after every numeric rule failed.
const FIXED_PHRASES: [(&str, AgeLimitRange); 4] = [
    ("(초등)", AgeLimitRange::bounded(AgeLimitType::Age, 8, ELEMENTARY_SCHOOL_END_AGE)),
    ("(초등반)", AgeLimitRange::bounded(AgeLimitType::Age, 8, ELEMENTARY_SCHOOL_END_AGE)),
    ("(모든연령)", AgeLimitRange::open_ended(AgeLimitType::Age, 0)),
    ("(초등~성인)", AgeLimitRange::open_ended(AgeLimitType::Age, 8)),
];

/// Compiled rules for one unit (세 or 개월), tried in field order
struct UnitRules {
    kind: AgeLimitType,
    /// n세이상, n세 이상, n세~성인, n세~ 성인
    open_ended: Regex,
    /// a~b세, a-b세, a세~b세, a세-b세
    range: Regex,
    /// n세~초등, n세-초등
    until_elementary: Regex,
    /// n세~초3, n세-초3
    until_grade: Regex,
    /// (n세)
    exact: Regex,
}

impl UnitRules {
    fn new(kind: AgeLimitType) -> Result<Self, AgeRangeError> {
        let unit = kind.suffix();
        Ok(Self {
            kind,
            open_ended: compile(&format!(r"([0-9]{{1,2}}){unit}(?: ?이상|~ ?성인)"))?,
            range: compile(&format!(r"([0-9]{{1,2}})(?:{unit})?[~-]([0-9]{{1,2}}){unit}"))?,
            until_elementary: compile(&format!(r"([0-9]{{1,2}}){unit}[~-]초등"))?,
            until_grade: compile(&format!(r"([0-9]{{1,2}}){unit}[~-]초([1-6])"))?,
            exact: compile(&format!(r"\(([0-9]{{1,2}}){unit}\)"))?,
        })
    }

    fn extract(&self, title: &str) -> Result<Option<AgeLimitRange>, AgeRangeError> {
        if let Some(caps) = self.open_ended.captures(title) {
            let from = capture_number(title, &caps, 1)?;
            return Ok(Some(AgeLimitRange::open_ended(self.kind, from)));
        }

        if let Some(caps) = self.range.captures(title) {
            let from = capture_number(title, &caps, 1)?;
            let to = capture_number(title, &caps, 2)?;
            return Ok(Some(AgeLimitRange::bounded(self.kind, from, to)));
        }

        if let Some(caps) = self.until_elementary.captures(title) {
            let from = capture_number(title, &caps, 1)?;
            let to = self.kind.from_years(ELEMENTARY_SCHOOL_END_AGE);
            return Ok(Some(AgeLimitRange::bounded(self.kind, from, to)));
        }

        if let Some(caps) = self.until_grade.captures(title) {
            let from = capture_number(title, &caps, 1)?;
            let grade = capture_number(title, &caps, 2)?;
            let to = self.kind.from_years(grade + GRADE_TO_AGE_OFFSET);
            return Ok(Some(AgeLimitRange::bounded(self.kind, from, to)));
        }

        if let Some(caps) = self.exact.captures(title) {
            let age = capture_number(title, &caps, 1)?;
            return Ok(Some(AgeLimitRange::bounded(self.kind, age, age)));
        }

        Ok(None)
    }
}

/// Title-driven age/month range extractor
pub struct AgeRangeExtractor {
    /// Calendar year used to turn birth years into (Korean) ages
    reference_year: i32,
    unit_rules: [UnitRules; 2],
    /// 초a~초b, 초a-초b
    grade_range: Regex,
    /// 2018~2020년생, 18-20년생, 2018년생~2020년생
    birth_year_range: Regex,
}

impl AgeRangeExtractor {
    pub fn new(reference_year: i32) -> Result<Self, AgeRangeError> {
        Ok(Self {
            reference_year,
            unit_rules: [UnitRules::new(AgeLimitType::Age)?, UnitRules::new(AgeLimitType::Months)?],
            grade_range: compile(r"초([1-6])[~-]초([1-6])")?,
            birth_year_range: compile(r"([0-9]{4}|[0-9]{2})(?:년생|년)? ?[~-] ?([0-9]{4}|[0-9]{2})년생")?,
        })
    }

    /// Extractor whose birth-year conversion uses the current local year
    pub fn for_current_year() -> Result<Self, AgeRangeError> {
        Self::new(chrono::Local::now().year())
    }

    pub const fn reference_year(&self) -> i32 {
        self.reference_year
    }

    /// Returns the eligibility range encoded in `title`.
    pub fn extract(&self, title: &str) -> Result<AgeLimitRange, AgeRangeError> {
        if EXCLUDED_TITLE_KEYWORDS.iter().any(|keyword| title.contains(keyword)) {
            return Ok(AgeLimitRange::bounded(AgeLimitType::Age, EXCLUDED_AGE, EXCLUDED_AGE));
        }

        for rules in &self.unit_rules {
            if let Some(range) = rules.extract(title)? {
                return Ok(range);
            }
        }

        if let Some(caps) = self.grade_range.captures(title) {
            let from = capture_number(title, &caps, 1)?;
            let to = capture_number(title, &caps, 2)?;
            return Ok(AgeLimitRange::bounded(
                AgeLimitType::Age,
                from + GRADE_TO_AGE_OFFSET,
                to + GRADE_TO_AGE_OFFSET,
            ));
        }

        if let Some(caps) = self.birth_year_range.captures(title) {
            let first = self.age_of_birth_year(capture_number(title, &caps, 1)?);
            let second = self.age_of_birth_year(capture_number(title, &caps, 2)?);
            // 출생년도가 빠를수록 나이가 많다
            return Ok(AgeLimitRange::bounded(AgeLimitType::Age, first.min(second), first.max(second)));
        }

        for (phrase, range) in FIXED_PHRASES {
            if title.contains(phrase) {
                return Ok(range);
            }
        }

        Ok(AgeLimitRange::unknown())
    }

    /// 세는 나이: reference year - birth year + 1. Two-digit years are 20xx.
    fn age_of_birth_year(&self, birth_year: u32) -> u32 {
        let birth_year = if birth_year < 100 { 2000 + birth_year } else { birth_year };
        let age = i64::from(self.reference_year) - i64::from(birth_year) + 1;
        u32::try_from(age.max(0)).unwrap_or_default()
    }
}

fn compile(pattern: &str) -> Result<Regex, AgeRangeError> {
    Regex::new(pattern).map_err(|e| AgeRangeError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn capture_number(title: &str, caps: &Captures<'_>, index: usize) -> Result<u32, AgeRangeError> {
    let text = caps.get(index).map_or("", |m| m.as_str());
    text.parse().map_err(|_| AgeRangeError::InvalidNumber {
        title: title.to_string(),
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> AgeRangeExtractor {
        AgeRangeExtractor::new(2024).unwrap()
    }

    #[test]
    fn open_ended_years() {
        let range = extractor().extract("5세이상 누구나").unwrap();
        assert_eq!(range, AgeLimitRange::open_ended(AgeLimitType::Age, 5));
        assert!(range.contains(5));
        assert!(range.contains(99));
        assert!(!range.contains(4));
    }

    #[test]
    fn open_ended_variants() {
        let e = extractor();
        for title in ["7세 이상 발레", "7세~성인 요가", "7세~ 성인 요가"] {
            assert_eq!(
                e.extract(title).unwrap(),
                AgeLimitRange::open_ended(AgeLimitType::Age, 7),
                "{title}"
            );
        }
        assert_eq!(
            e.extract("18개월이상 오감놀이").unwrap(),
            AgeLimitRange::open_ended(AgeLimitType::Months, 18)
        );
    }

    #[test]
    fn two_sided_month_range() {
        assert_eq!(
            extractor().extract("생후 12~24개월 대상").unwrap(),
            AgeLimitRange::bounded(AgeLimitType::Months, 12, 24)
        );
        assert_eq!(
            extractor().extract("[토] 12개월-24개월 베이비 마사지").unwrap(),
            AgeLimitRange::bounded(AgeLimitType::Months, 12, 24)
        );
    }

    #[test]
    fn two_sided_year_range_with_either_separator() {
        let e = extractor();
        assert_eq!(e.extract("창의미술(4~6세)").unwrap(), AgeLimitRange::bounded(AgeLimitType::Age, 4, 6));
        assert_eq!(e.extract("창의미술 4세-6세").unwrap(), AgeLimitRange::bounded(AgeLimitType::Age, 4, 6));
    }

    #[test]
    fn until_elementary_school() {
        let e = extractor();
        assert_eq!(e.extract("3세~초등 쿠킹").unwrap(), AgeLimitRange::bounded(AgeLimitType::Age, 3, 13));
        assert_eq!(
            e.extract("30개월-초등 블록놀이").unwrap(),
            AgeLimitRange::bounded(AgeLimitType::Months, 30, 156)
        );
    }

    #[test]
    fn until_specific_grade() {
        let e = extractor();
        assert_eq!(e.extract("5세~초2 수학놀이").unwrap(), AgeLimitRange::bounded(AgeLimitType::Age, 5, 9));
        assert_eq!(
            e.extract("36개월~초1 체육").unwrap(),
            AgeLimitRange::bounded(AgeLimitType::Months, 36, 96)
        );
    }

    #[test]
    fn exact_value_in_parentheses() {
        assert_eq!(extractor().extract("(4세)").unwrap(), AgeLimitRange::bounded(AgeLimitType::Age, 4, 4));
        assert_eq!(
            extractor().extract("트니트니 (18개월)").unwrap(),
            AgeLimitRange::bounded(AgeLimitType::Months, 18, 18)
        );
    }

    #[test]
    fn grade_to_grade() {
        assert_eq!(extractor().extract("초2~초4 대상").unwrap(), AgeLimitRange::bounded(AgeLimitType::Age, 9, 11));
        assert_eq!(extractor().extract("논술 초1-초3").unwrap(), AgeLimitRange::bounded(AgeLimitType::Age, 8, 10));
    }

    #[test]
    fn birth_year_range_orders_bounds() {
        let e = extractor();
        // 2024 - 2020 + 1 = 5, 2024 - 2019 + 1 = 6
        assert_eq!(e.extract("2019~2020년생 놀이").unwrap(), AgeLimitRange::bounded(AgeLimitType::Age, 5, 6));
        assert_eq!(e.extract("20-19년생 놀이").unwrap(), AgeLimitRange::bounded(AgeLimitType::Age, 5, 6));
        assert_eq!(e.extract("2019년생~2020년생").unwrap(), AgeLimitRange::bounded(AgeLimitType::Age, 5, 6));
    }

    #[test]
    fn fixed_phrases() {
        let e = extractor();
        assert_eq!(e.extract("주산 (초등)").unwrap(), AgeLimitRange::bounded(AgeLimitType::Age, 8, 13));
        assert_eq!(e.extract("바둑(초등반)").unwrap(), AgeLimitRange::bounded(AgeLimitType::Age, 8, 13));
        assert_eq!(e.extract("가족 요리(모든연령)").unwrap(), AgeLimitRange::open_ended(AgeLimitType::Age, 0));
        assert_eq!(e.extract("탁구(초등~성인)").unwrap(), AgeLimitRange::open_ended(AgeLimitType::Age, 8));
    }

    #[test]
    fn denylist_beats_any_age_text() {
        let e = extractor();
        assert_eq!(e.extract("키즈발레 5세이상").unwrap(), AgeLimitRange::bounded(AgeLimitType::Age, 99, 99));
        assert_eq!(e.extract("밸리댄스 (4세)").unwrap(), AgeLimitRange::bounded(AgeLimitType::Age, 99, 99));
    }

    #[test]
    fn no_match_is_permissive_unknown() {
        let range = extractor().extract("엄마랑 아기랑 오감놀이").unwrap();
        assert!(range.is_unknown());
        assert_eq!(range.from, 0);
        assert_eq!(range.to, None);
        assert!(range.contains(0));
        assert!(range.contains(u32::MAX));
    }

    #[test]
    fn display_shows_unit() {
        assert_eq!(AgeLimitRange::bounded(AgeLimitType::Months, 12, 24).to_string(), "Months[12개월~24개월]");
        assert_eq!(AgeLimitRange::open_ended(AgeLimitType::Age, 5).to_string(), "Age[5세~]");
    }
}
