//! CSV export of the lectures that survived filtering
//!
//! Output is UTF-8 with a BOM so spreadsheet programs pick the right encoding.
//! When the previous run's file can be loaded, a 13th column tells whether
//! each row is new, changed or unchanged since then.

use chrono::{DateTime, Local};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::Lecture;
use crate::infrastructure::config::ExportConfig;

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const CSV_HEADER: [&str; 12] = [
    "점포",
    "강좌그룹",
    "강좌명",
    "강사명",
    "개강일",
    "시작시간",
    "종료시간",
    "요일",
    "수강료",
    "강좌횟수",
    "접수상태",
    "상세페이지",
];

pub const DIFF_HEADER: &str = "최근에 수집된 강좌와 비교";

const URL_COLUMN: usize = 11;

/// Columns that must all match for a row to count as unchanged (요일/접수상태 are ignored)
const COMPARED_COLUMNS: [usize; 10] = [0, 1, 2, 3, 4, 5, 6, 8, 9, URL_COLUMN];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),
}

/// 최근에 수집된 강좌와 비교
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// The snapshot holds nothing to compare against
    NoComparison,
    Unchanged,
    Changed,
    New,
}

impl ChangeStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoComparison => "-",
            Self::Unchanged => "변경사항 없음",
            Self::Changed => "변경됨",
            Self::New => "신규",
        }
    }
}

fn lecture_record(lecture: &Lecture) -> [&str; 12] {
    [
        &lecture.store_name,
        &lecture.group,
        &lecture.title,
        &lecture.teacher,
        &lecture.start_date,
        &lecture.start_time,
        &lecture.end_time,
        &lecture.day_of_week,
        &lecture.price,
        &lecture.count,
        lecture.status.as_str(),
        &lecture.detail_page_url,
    ]
}

/// Rows of a previous export
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    rows: Vec<Vec<String>>,
}

impl Snapshot {
    /// Reads the previous export; absence or a read failure only disables the comparison.
    pub fn load(path: &Path) -> Option<Self> {
        if !path.exists() {
            info!(
                "최근에 수집된 문화센터 강좌 자료({})가 존재하지 않습니다. 새로 수집된 강좌는 이전에 수집된 강좌와의 변경사항을 추적할 수 없습니다.",
                path.display()
            );
            return None;
        }

        match File::open(path).map_err(csv::Error::from).and_then(Self::from_reader) {
            Ok(snapshot) => {
                info!("최근에 수집된 문화센터 강좌 자료({})를 로드하였습니다.", path.display());
                Some(snapshot)
            }
            Err(e) => {
                warn!(
                    "최근에 수집된 문화센터 강좌 자료({})를 로드할 수 없습니다. 새로 수집된 강좌는 이전에 수집된 강좌와의 변경사항을 추적할 수 없습니다: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let mut row: Vec<String> = record?.iter().map(ToString::to_string).collect();
            if rows.is_empty() {
                if let Some(first) = row.first_mut() {
                    *first = first.trim_start_matches('\u{feff}').to_string();
                }
            }
            rows.push(row);
        }

        Ok(Self { rows })
    }

    fn has_comparable_rows(&self) -> bool {
        let single_cell = self.rows.len() == 1 && self.rows[0].len() == 1;
        !single_cell && self.rows.iter().any(|row| row.len() > URL_COLUMN)
    }

    pub fn classify(&self, lecture: &Lecture) -> ChangeStatus {
        if !self.has_comparable_rows() {
            return ChangeStatus::NoComparison;
        }

        let current = lecture_record(lecture);
        let comparable = self.rows.iter().filter(|row| row.len() > URL_COLUMN);

        let mut url_seen = false;
        for row in comparable {
            if COMPARED_COLUMNS.iter().all(|&i| row[i] == current[i]) {
                return ChangeStatus::Unchanged;
            }
            url_seen |= row[URL_COLUMN] == current[URL_COLUMN];
        }

        if url_seen { ChangeStatus::Changed } else { ChangeStatus::New }
    }
}

/// Result of one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub rows: usize,
    /// Whether the diff column was written
    pub compared: bool,
}

pub struct CsvExporter {
    output_dir: PathBuf,
    file_prefix: String,
    snapshot_path: PathBuf,
}

impl CsvExporter {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            file_prefix: config.file_prefix.clone(),
            snapshot_path: config.snapshot_file.clone(),
        }
    }

    /// `<prefix>-YYYYMMDDHHMMSS.csv` in the output directory
    pub fn output_path(&self, at: DateTime<Local>) -> PathBuf {
        self.output_dir
            .join(format!("{}-{}.csv", self.file_prefix, at.format("%Y%m%d%H%M%S")))
    }

    /// Writes every non-excluded lecture to a timestamped file.
    pub fn export(&self, lectures: &[Lecture]) -> Result<ExportReport, ExportError> {
        let snapshot = Snapshot::load(&self.snapshot_path);
        self.export_at(lectures, snapshot.as_ref(), Local::now())
    }

    pub fn export_at(
        &self,
        lectures: &[Lecture],
        snapshot: Option<&Snapshot>,
        at: DateTime<Local>,
    ) -> Result<ExportReport, ExportError> {
        let path = self.output_path(at);
        info!("수집된 문화센터 강좌 자료를 CSV 파일로 저장합니다.");

        let io_error = |source: io::Error| ExportError::Io {
            path: path.clone(),
            source,
        };

        let mut file = File::create(&path).map_err(io_error)?;
        file.write_all(UTF8_BOM).map_err(io_error)?;

        let mut writer = csv::Writer::from_writer(file);
        let mut header: Vec<&str> = CSV_HEADER.to_vec();
        if snapshot.is_some() {
            header.push(DIFF_HEADER);
        }
        writer.write_record(&header)?;

        let mut rows = 0;
        for lecture in lectures.iter().filter(|l| !l.is_excluded()) {
            let mut record: Vec<&str> = lecture_record(lecture).to_vec();
            if let Some(snapshot) = snapshot {
                record.push(snapshot.classify(lecture).as_str());
            }
            writer.write_record(&record)?;
            rows += 1;
        }

        writer.flush().map_err(io_error)?;

        info!("수집된 문화센터 강좌 자료({}건)를 CSV 파일({})로 저장하였습니다.", rows, path.display());
        Ok(ExportReport {
            path,
            rows,
            compared: snapshot.is_some(),
        })
    }
}
