pub mod common;
pub mod courses;
pub mod lessons;
pub mod progress;
pub mod reports;
pub mod tests;
pub mod users;
