use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{CourseStore, StudentStore, TeacherStore, UserStore};
use crate::errors::{StoreError, StoreResult};
use crate::models::course::{Course, CourseSchedule, StudentCourse};
use crate::models::user::{Student, Teacher, User};

#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<u64, T>,
    next_id: u64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T: Clone> Table<T> {
    fn insert(&mut self, assign: impl FnOnce(&mut T, u64), mut row: T) -> T {
        let id = self.next_id;
        self.next_id += 1;
        assign(&mut row, id);
        self.rows.insert(id, row.clone());
        row
    }

    fn get(&self, id: u64, kind: &str) -> StoreResult<T> {
        self.rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", kind, id)))
    }

    fn find(&self, kind: &str, key: &str, pred: impl Fn(&T) -> bool) -> StoreResult<T> {
        self.rows
            .values()
            .find(|row| pred(row))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", kind, key)))
    }

    fn any(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.rows.values().any(pred)
    }

    fn replace(&mut self, id: u64, row: T, kind: &str) -> StoreResult<()> {
        match self.rows.get_mut(&id) {
            Some(slot) => {
                *slot = row;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("{} {}", kind, id))),
        }
    }

    fn remove(&mut self, id: u64, kind: &str) -> StoreResult<()> {
        self.rows
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", kind, id)))
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: Table<User>,
    students: Table<Student>,
    teachers: Table<Teacher>,
    courses: Table<Course>,
    enrolments: Table<StudentCourse>,
    schedules: Table<CourseSchedule>,
}

/// Process-local store. Suitable for tests and single-node demos; all data
/// is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!("username {}", user.username)));
        }
        Ok(tables.users.insert(|u, id| u.id = id, user))
    }

    async fn find_user(&self, id: u64) -> StoreResult<User> {
        self.tables.read().await.users.get(id, "user")
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<User> {
        self.tables
            .read()
            .await
            .users
            .find("user", username, |u| u.username == username)
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .any(|u| u.id != user.id && u.username == user.username)
        {
            return Err(StoreError::Conflict(format!("username {}", user.username)));
        }
        tables.users.replace(user.id, user.clone(), "user")
    }

    async fn delete_user(&self, id: u64) -> StoreResult<()> {
        self.tables.write().await.users.remove(id, "user")
    }
}

#[async_trait]
impl StudentStore for MemoryStore {
    async fn create_student(&self, student: Student) -> StoreResult<Student> {
        let mut tables = self.tables.write().await;
        if tables
            .students
            .any(|s| s.user_id == student.user_id || s.student_no == student.student_no)
        {
            return Err(StoreError::Conflict(format!(
                "student {}",
                student.student_no
            )));
        }
        Ok(tables.students.insert(|s, id| s.id = id, student))
    }

    async fn find_student(&self, id: u64) -> StoreResult<Student> {
        self.tables.read().await.students.get(id, "student")
    }

    async fn find_student_by_user(&self, user_id: u64) -> StoreResult<Student> {
        self.tables
            .read()
            .await
            .students
            .find("student of user", &user_id.to_string(), |s| s.user_id == user_id)
    }

    async fn find_student_by_number(&self, student_no: &str) -> StoreResult<Student> {
        self.tables
            .read()
            .await
            .students
            .find("student", student_no, |s| s.student_no == student_no)
    }

    async fn update_student(&self, student: &Student) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .students
            .replace(student.id, student.clone(), "student")
    }

    async fn delete_student(&self, id: u64) -> StoreResult<()> {
        self.tables.write().await.students.remove(id, "student")
    }
}

#[async_trait]
impl TeacherStore for MemoryStore {
    async fn create_teacher(&self, teacher: Teacher) -> StoreResult<Teacher> {
        let mut tables = self.tables.write().await;
        if tables
            .teachers
            .any(|t| t.user_id == teacher.user_id || t.teacher_no == teacher.teacher_no)
        {
            return Err(StoreError::Conflict(format!(
                "teacher {}",
                teacher.teacher_no
            )));
        }
        Ok(tables.teachers.insert(|t, id| t.id = id, teacher))
    }

    async fn find_teacher_by_user(&self, user_id: u64) -> StoreResult<Teacher> {
        self.tables
            .read()
            .await
            .teachers
            .find("teacher of user", &user_id.to_string(), |t| t.user_id == user_id)
    }

    async fn find_teacher_by_number(&self, teacher_no: &str) -> StoreResult<Teacher> {
        self.tables
            .read()
            .await
            .teachers
            .find("teacher", teacher_no, |t| t.teacher_no == teacher_no)
    }

    async fn update_teacher(&self, teacher: &Teacher) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .teachers
            .replace(teacher.id, teacher.clone(), "teacher")
    }

    async fn delete_teacher(&self, id: u64) -> StoreResult<()> {
        self.tables.write().await.teachers.remove(id, "teacher")
    }
}

#[async_trait]
impl CourseStore for MemoryStore {
    async fn create_course(&self, course: Course) -> StoreResult<Course> {
        let mut tables = self.tables.write().await;
        if tables.courses.any(|c| c.course_code == course.course_code) {
            return Err(StoreError::Conflict(format!("course {}", course.course_code)));
        }
        Ok(tables.courses.insert(|c, id| c.id = id, course))
    }

    async fn find_course(&self, id: u64) -> StoreResult<Course> {
        self.tables.read().await.courses.get(id, "course")
    }

    async fn find_course_by_code(&self, course_code: &str) -> StoreResult<Course> {
        self.tables
            .read()
            .await
            .courses
            .find("course", course_code, |c| c.course_code == course_code)
    }

    async fn update_course(&self, course: &Course) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .courses
            .replace(course.id, course.clone(), "course")
    }

    async fn delete_course(&self, id: u64) -> StoreResult<()> {
        self.tables.write().await.courses.remove(id, "course")
    }

    async fn search_courses(&self, keyword: &str) -> StoreResult<Vec<Course>> {
        let tables = self.tables.read().await;
        Ok(tables
            .courses
            .rows
            .values()
            .filter(|c| c.course_code.contains(keyword) || c.name.contains(keyword))
            .cloned()
            .collect())
    }

    async fn enrol(&self, enrolment: StudentCourse) -> StoreResult<StudentCourse> {
        let mut tables = self.tables.write().await;
        if let Ok(existing) = tables.enrolments.find("enrolment", "", |e| {
            e.student_id == enrolment.student_id && e.course_id == enrolment.course_id
        }) {
            return Ok(existing);
        }
        Ok(tables.enrolments.insert(|e, id| e.id = id, enrolment))
    }

    async fn student_courses(
        &self,
        student_id: u64,
        semester: Option<&str>,
    ) -> StoreResult<Vec<StudentCourse>> {
        let tables = self.tables.read().await;
        Ok(tables
            .enrolments
            .rows
            .values()
            .filter(|e| e.student_id == student_id)
            .filter(|e| match semester {
                Some(semester) => tables
                    .courses
                    .rows
                    .get(&e.course_id)
                    .is_some_and(|c| c.semester == semester),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn create_schedule(&self, schedule: CourseSchedule) -> StoreResult<CourseSchedule> {
        let mut tables = self.tables.write().await;
        if !tables.courses.rows.contains_key(&schedule.course_id) {
            return Err(StoreError::NotFound(format!("course {}", schedule.course_id)));
        }
        Ok(tables.schedules.insert(|s, id| s.id = id, schedule))
    }

    async fn course_schedules(&self, course_id: u64) -> StoreResult<Vec<CourseSchedule>> {
        let tables = self.tables.read().await;
        Ok(tables
            .schedules
            .rows
            .values()
            .filter(|s| s.course_id == course_id)
            .cloned()
            .collect())
    }
}
