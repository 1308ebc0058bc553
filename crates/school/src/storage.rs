//! Record storage used by the auth and schedule services.
//!
//! Every store assigns ids on create and enforces the uniqueness of the
//! natural keys (username, student number, teacher number, course code).

pub mod memory;

use async_trait::async_trait;

use crate::errors::StoreResult;
use crate::models::course::{Course, CourseSchedule, StudentCourse};
use crate::models::user::{Student, Teacher, User};

pub use memory::MemoryStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user, ignoring `user.id`, and return the stored record
    async fn create_user(&self, user: User) -> StoreResult<User>;
    async fn find_user(&self, id: u64) -> StoreResult<User>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<User>;
    async fn update_user(&self, user: &User) -> StoreResult<()>;
    async fn delete_user(&self, id: u64) -> StoreResult<()>;
}

#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn create_student(&self, student: Student) -> StoreResult<Student>;
    async fn find_student(&self, id: u64) -> StoreResult<Student>;
    async fn find_student_by_user(&self, user_id: u64) -> StoreResult<Student>;
    async fn find_student_by_number(&self, student_no: &str) -> StoreResult<Student>;
    async fn update_student(&self, student: &Student) -> StoreResult<()>;
    async fn delete_student(&self, id: u64) -> StoreResult<()>;
}

#[async_trait]
pub trait TeacherStore: Send + Sync {
    async fn create_teacher(&self, teacher: Teacher) -> StoreResult<Teacher>;
    async fn find_teacher_by_user(&self, user_id: u64) -> StoreResult<Teacher>;
    async fn find_teacher_by_number(&self, teacher_no: &str) -> StoreResult<Teacher>;
    async fn update_teacher(&self, teacher: &Teacher) -> StoreResult<()>;
    async fn delete_teacher(&self, id: u64) -> StoreResult<()>;
}

#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn create_course(&self, course: Course) -> StoreResult<Course>;
    async fn find_course(&self, id: u64) -> StoreResult<Course>;
    async fn find_course_by_code(&self, course_code: &str) -> StoreResult<Course>;
    async fn update_course(&self, course: &Course) -> StoreResult<()>;
    async fn delete_course(&self, id: u64) -> StoreResult<()>;
    /// Courses whose code or name contains `keyword`
    async fn search_courses(&self, keyword: &str) -> StoreResult<Vec<Course>>;

    /// Enrol a student. Enrolling twice in the same course returns the
    /// existing record.
    async fn enrol(&self, enrolment: StudentCourse) -> StoreResult<StudentCourse>;
    /// Enrolments of a student, optionally restricted to one semester
    async fn student_courses(
        &self,
        student_id: u64,
        semester: Option<&str>,
    ) -> StoreResult<Vec<StudentCourse>>;

    async fn create_schedule(&self, schedule: CourseSchedule) -> StoreResult<CourseSchedule>;
    async fn course_schedules(&self, course_id: u64) -> StoreResult<Vec<CourseSchedule>>;
}

/// Everything the services need from storage.
pub trait Store: UserStore + StudentStore + TeacherStore + CourseStore {}

impl<T> Store for T where T: UserStore + StudentStore + TeacherStore + CourseStore {}
