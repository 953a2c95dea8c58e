//! The resources this API serves.

pub mod reviews;
pub mod tours;
pub mod users;
