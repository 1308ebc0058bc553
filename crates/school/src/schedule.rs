//! Course schedule import from spreadsheets and per-student lookup.
//!
//! Expected columns, after one header row:
//! `course_code, name, credit, semester, weekday, start_time, end_time[, classroom[, building]]`

use calamine::{Data, Reader, Xlsx};
use chrono::{Duration, NaiveDate, Utc};
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::{ScheduleError, StoreError};
use crate::models::course::{Course, CourseSchedule, CourseStatus, EnrolmentStatus, StudentCourse};
use crate::storage::Store;

const MIN_COLUMNS: usize = 7;
const DEFAULT_START_WEEK: u32 = 1;
const DEFAULT_END_WEEK: u32 = 16;

/// One parsed spreadsheet row.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRow {
    pub course_code: String,
    pub name: String,
    pub credit: f64,
    pub semester: String,
    pub weekday: u8,
    pub start_time: String,
    pub end_time: String,
    pub classroom: String,
    pub building: String,
}

impl ScheduleRow {
    /// Returns `None` for rows too short to describe a course slot.
    /// Unreadable numbers fall back to zero.
    pub fn parse(cells: &[String]) -> Option<Self> {
        if cells.len() < MIN_COLUMNS {
            return None;
        }
        let cell = |i: usize| cells.get(i).map(|c| c.trim().to_string()).unwrap_or_default();

        Some(Self {
            course_code: cell(0),
            name: cell(1),
            credit: cell(2).parse().unwrap_or(0.0),
            semester: cell(3),
            weekday: cell(4).parse().unwrap_or(0),
            start_time: cell(5),
            end_time: cell(6),
            classroom: cell(7),
            building: cell(8),
        })
    }
}

/// A worksheet cell as the text a user sees in it.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => text.clone(),
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", *value as i64)
        }
        Data::DateTime(serial) => excel_serial_text(serial.as_f64()),
        other => other.to_string(),
    }
}

/// Excel stores times as fractions of a day since 1899-12-30. Time-only
/// values render as `HH:MM`, anything with a date part as `YYYY-MM-DD HH:MM`.
fn excel_serial_text(serial: f64) -> String {
    let minutes = (serial * 24.0 * 60.0).round() as i64;
    let (days, minute_of_day) = (minutes.div_euclid(1440), minutes.rem_euclid(1440));
    let time = format!("{:02}:{:02}", minute_of_day / 60, minute_of_day % 60);
    if days == 0 {
        return time;
    }

    match NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.checked_add_signed(Duration::days(days)))
    {
        Some(date) => format!("{} {}", date.format("%Y-%m-%d"), time),
        None => serial.to_string(),
    }
}

pub struct ScheduleService {
    store: Arc<dyn Store>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn import_csv(&self, user_id: u64, bytes: &[u8]) -> Result<usize, ScheduleError> {
        let rows = {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_reader(bytes);

            let mut rows: Vec<Vec<String>> = Vec::new();
            for record in reader.records() {
                rows.push(record?.iter().map(str::to_string).collect());
            }
            rows
        };
        self.import_rows(user_id, rows).await
    }

    /// Reads the first worksheet of an .xlsx workbook.
    pub async fn import_excel(&self, user_id: u64, bytes: &[u8]) -> Result<usize, ScheduleError> {
        let rows: Vec<Vec<String>> = {
            let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
            let range = workbook
                .worksheet_range_at(0)
                .ok_or(ScheduleError::EmptyWorkbook)??;

            range
                .rows()
                .map(|row| row.iter().map(cell_text).collect())
                .collect()
        };
        self.import_rows(user_id, rows).await
    }

    /// Enrols the student of `user_id` in every course listed in `rows` and
    /// records one weekly slot per row. Returns the number of imported rows.
    pub async fn import_rows(
        &self,
        user_id: u64,
        rows: Vec<Vec<String>>,
    ) -> Result<usize, ScheduleError> {
        let student = self.student_of(user_id).await?;
        let mut imported = 0;

        for cells in rows.iter().skip(1) {
            let Some(row) = ScheduleRow::parse(cells) else {
                debug!(?cells, "skipping short schedule row");
                continue;
            };

            let now = Utc::now();
            let course = match self.store.find_course_by_code(&row.course_code).await {
                Ok(course) => course,
                Err(StoreError::NotFound(_)) => {
                    self.store
                        .create_course(Course {
                            id: 0,
                            course_code: row.course_code.clone(),
                            name: row.name.clone(),
                            description: String::new(),
                            credit: row.credit,
                            semester: row.semester.clone(),
                            status: CourseStatus::Open,
                            created_at: now,
                            updated_at: now,
                        })
                        .await?
                }
                Err(err) => return Err(err.into()),
            };

            self.store
                .enrol(StudentCourse {
                    id: 0,
                    student_id: student,
                    course_id: course.id,
                    score: None,
                    status: EnrolmentStatus::Enrolled,
                    created_at: now,
                    updated_at: now,
                })
                .await?;

            self.store
                .create_schedule(CourseSchedule {
                    id: 0,
                    course_id: course.id,
                    teacher_id: 0,
                    classroom: row.classroom,
                    building: row.building,
                    weekday: row.weekday,
                    start_week: DEFAULT_START_WEEK,
                    end_week: DEFAULT_END_WEEK,
                    start_time: row.start_time,
                    end_time: row.end_time,
                    created_at: now,
                    updated_at: now,
                })
                .await?;
            imported += 1;
        }

        info!(user_id, imported, "imported course schedule");
        Ok(imported)
    }

    /// All weekly slots of every course the student is enrolled in.
    pub async fn student_schedule(&self, user_id: u64) -> Result<Vec<CourseSchedule>, ScheduleError> {
        let student = self.student_of(user_id).await?;
        let enrolments = self.store.student_courses(student, None).await?;

        let mut schedules = Vec::new();
        for enrolment in enrolments {
            match self.store.course_schedules(enrolment.course_id).await {
                Ok(slots) => schedules.extend(slots),
                Err(err) => debug!(course_id = enrolment.course_id, %err, "skipping course"),
            }
        }
        Ok(schedules)
    }

    async fn student_of(&self, user_id: u64) -> Result<u64, ScheduleError> {
        match self.store.find_student_by_user(user_id).await {
            Ok(student) => Ok(student.id),
            Err(StoreError::NotFound(_)) => Err(ScheduleError::NotAStudent(user_id)),
            Err(err) => Err(err.into()),
        }
    }
}
