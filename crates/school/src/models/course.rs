use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    NotStarted,
    Open,
    Finished,
}

#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: u64,
    pub course_code: String,
    pub name: String,
    pub description: String,
    pub credit: f64,
    pub semester: String,
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One weekly slot of a course.
#[derive(Debug, Clone, Serialize)]
pub struct CourseSchedule {
    pub id: u64,
    pub course_id: u64,
    pub teacher_id: u64,
    pub classroom: String,
    pub building: String,
    /// 1 (Monday) through 7 (Sunday).
    pub weekday: u8,
    pub start_week: u32,
    pub end_week: u32,
    /// "HH:MM"
    pub start_time: String,
    pub end_time: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrolmentStatus {
    Dropped,
    Enrolled,
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentCourse {
    pub id: u64,
    pub student_id: u64,
    pub course_id: u64,
    pub score: Option<f64>,
    pub status: EnrolmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
