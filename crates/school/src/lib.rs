pub mod auth;
pub mod errors;
pub mod models;
pub mod password;
pub mod relay;
pub mod schedule;
pub mod storage;
pub mod token;
