pub mod config;
pub mod errors;
pub mod freshness;
pub mod model;
pub mod storage;
