use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::{AuthError, StoreError};
use crate::models::user::{Student, Teacher, User, UserStatus, UserType};
use crate::password::PasswordHasher;
use crate::storage::Store;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub user_type: UserType,
    /// Required when registering a student
    #[serde(default, rename = "student_id")]
    pub student_no: String,
    /// Required when registering a teacher
    #[serde(default, rename = "teacher_id")]
    pub teacher_no: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub office: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Account registration and credential checks.
pub struct AuthService {
    store: Arc<dyn Store>,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }

    /// Create the account and, for students and teachers, the matching
    /// profile row.
    pub async fn register(&self, req: RegisterRequest) -> Result<User, AuthError> {
        require("username", &req.username)?;
        require("password", &req.password)?;
        match req.user_type {
            UserType::Student => require("student_id", &req.student_no)?,
            UserType::Teacher => require("teacher_id", &req.teacher_no)?,
            UserType::Admin => {}
        }

        match self.store.find_user_by_username(&req.username).await {
            Ok(_) => return Err(AuthError::UserExists),
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
        self.ensure_number_free(&req).await?;

        let password_hash = self.hasher.hash(&req.password).await?;
        let now = Utc::now();
        let user = self
            .store
            .create_user(User {
                id: 0,
                username: req.username.clone(),
                password_hash,
                real_name: req.real_name.clone(),
                email: req.email.clone(),
                phone: req.phone.clone(),
                user_type: req.user_type,
                status: UserStatus::Active,
                created_at: now,
                updated_at: now,
            })
            .await
            .map_err(|err| match err {
                StoreError::Conflict(_) => AuthError::UserExists,
                other => other.into(),
            })?;

        // a user without its profile must not survive a failed registration
        if let Err(err) = self.create_profile(&user, req).await {
            if let Err(cleanup) = self.store.delete_user(user.id).await {
                warn!(user_id = user.id, %cleanup, "failed to roll back user after profile error");
            }
            return Err(match err {
                StoreError::Conflict(key) => AuthError::NumberTaken(key),
                other => other.into(),
            });
        }

        info!(user_id = user.id, username = %user.username, "registered user");
        Ok(user)
    }

    async fn ensure_number_free(&self, req: &RegisterRequest) -> Result<(), AuthError> {
        let lookup = match req.user_type {
            UserType::Student => self
                .store
                .find_student_by_number(&req.student_no)
                .await
                .map(|_| format!("student {}", req.student_no)),
            UserType::Teacher => self
                .store
                .find_teacher_by_number(&req.teacher_no)
                .await
                .map(|_| format!("teacher {}", req.teacher_no)),
            UserType::Admin => return Ok(()),
        };

        match lookup {
            Ok(key) => Err(AuthError::NumberTaken(key)),
            Err(StoreError::NotFound(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn create_profile(&self, user: &User, req: RegisterRequest) -> Result<(), StoreError> {
        let now = user.created_at;
        match user.user_type {
            UserType::Student => {
                self.store
                    .create_student(Student {
                        id: 0,
                        user_id: user.id,
                        student_no: req.student_no,
                        grade: req.grade,
                        class: req.class,
                        major: req.major,
                        department: req.department,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
            }
            UserType::Teacher => {
                self.store
                    .create_teacher(Teacher {
                        id: 0,
                        user_id: user.id,
                        teacher_no: req.teacher_no,
                        title: req.title,
                        department: req.department,
                        office: req.office,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
            }
            UserType::Admin => {}
        }
        Ok(())
    }

    pub async fn login(&self, req: LoginRequest) -> Result<User, AuthError> {
        require("username", &req.username)?;
        require("password", &req.password)?;

        let user = self
            .store
            .find_user_by_username(&req.username)
            .await
            .map_err(|_| AuthError::UserNotFound)?;

        if user.status == UserStatus::Disabled {
            return Err(AuthError::UserDisabled);
        }

        if !self.hasher.verify(&req.password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }
}

fn require(field: &str, value: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::InvalidRequest(format!("{} is required", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StudentStore, TeacherStore, UserStore};

    fn service() -> (Arc<MemoryStore>, AuthService) {
        let store = Arc::new(MemoryStore::new());
        let service = AuthService::new(store.clone(), PasswordHasher::new(4));
        (store, service)
    }

    fn student(username: &str, student_no: &str) -> RegisterRequest {
        serde_json::from_value(serde_json::json!({
            "username": username,
            "password": "pa55word",
            "user_type": 0,
            "student_id": student_no,
            "grade": "2024",
            "major": "Physics",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_register_student_creates_profile() {
        let (store, service) = service();
        let user = service.register(student("alice", "S001")).await.unwrap();

        assert_eq!(user.user_type, UserType::Student);
        assert_ne!(user.password_hash, "pa55word");
        let profile = store.find_student_by_user(user.id).await.unwrap();
        assert_eq!(profile.student_no, "S001");
        assert_eq!(profile.major, "Physics");
    }

    #[tokio::test]
    async fn test_register_teacher_creates_profile() {
        let (store, service) = service();
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "prof",
            "password": "pa55word",
            "user_type": 1,
            "teacher_id": "T100",
            "office": "B-204",
        }))
        .unwrap();

        let user = service.register(req).await.unwrap();
        let profile = store.find_teacher_by_user(user.id).await.unwrap();
        assert_eq!(profile.teacher_no, "T100");
        assert_eq!(profile.office, "B-204");
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let (_, service) = service();
        service.register(student("alice", "S001")).await.unwrap();
        let err = service.register(student("alice", "S002")).await.unwrap_err();
        assert!(matches!(err, AuthError::UserExists));
    }

    #[tokio::test]
    async fn test_register_duplicate_student_number_leaves_no_user() {
        let (store, service) = service();
        service.register(student("alice", "S001")).await.unwrap();

        let err = service.register(student("bob", "S001")).await.unwrap_err();
        assert!(matches!(err, AuthError::NumberTaken(_)));
        assert!(store.find_user_by_username("bob").await.is_err());

        let login = service
            .login(LoginRequest {
                username: "bob".to_string(),
                password: "pa55word".to_string(),
            })
            .await;
        assert!(matches!(login, Err(AuthError::UserNotFound)));

        let user = service.register(student("bob", "S002")).await.unwrap();
        assert_eq!(store.find_student_by_user(user.id).await.unwrap().student_no, "S002");
    }

    #[tokio::test]
    async fn test_register_duplicate_teacher_number() {
        let (store, service) = service();
        let now = Utc::now();
        store
            .create_teacher(Teacher {
                id: 0,
                user_id: 999,
                teacher_no: "T100".to_string(),
                title: String::new(),
                department: String::new(),
                office: String::new(),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "prof",
            "password": "pa55word",
            "user_type": 1,
            "teacher_id": "T100",
        }))
        .unwrap();
        let err = service.register(req).await.unwrap_err();
        assert!(matches!(err, AuthError::NumberTaken(_)));
        assert!(store.find_user_by_username("prof").await.is_err());
    }

    #[tokio::test]
    async fn test_register_student_requires_number() {
        let (_, service) = service();
        let err = service.register(student("alice", "")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_login_outcomes() {
        let (store, service) = service();
        service.register(student("alice", "S001")).await.unwrap();

        let login = |username: &str, password: &str| LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let user = service.login(login("alice", "pa55word")).await.unwrap();
        assert_eq!(user.username, "alice");

        assert!(matches!(
            service.login(login("alice", "wrong")).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login(login("nobody", "pa55word")).await,
            Err(AuthError::UserNotFound)
        ));

        let mut disabled = user.clone();
        disabled.status = UserStatus::Disabled;
        store.update_user(&disabled).await.unwrap();
        assert!(matches!(
            service.login(login("alice", "pa55word")).await,
            Err(AuthError::UserDisabled)
        ));
    }
}
