pub mod mapping;
pub mod query;
