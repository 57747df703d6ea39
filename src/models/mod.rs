// src/models/mod.rs

pub mod question;
pub mod question_set;
pub mod test_history;
pub mod user;
