pub mod auth;
pub mod backup;
pub mod certificates;
pub mod core;
pub mod homework;
pub mod logs;
pub mod preferences;
pub mod users;
