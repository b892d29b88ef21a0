//! culturelecture-scrape - 문화센터 강좌 수집기
//!
//! Collects children's culture-center lectures from three retail chains,
//! keeps the ones a given child can attend and writes them to a CSV file.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{LectureCollector, LectureFilter, run};
pub use domain::{AgeLimitRange, AgeLimitType, AgeRangeExtractor, Lecture, ReceptionStatus};
pub use infrastructure::{AppConfig, CsvExporter};
