pub mod query;
pub mod seed;
pub mod token;
