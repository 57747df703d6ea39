// src/handlers/mod.rs

pub mod auth;
pub mod generation;
pub mod question_set;
pub mod test_history;
