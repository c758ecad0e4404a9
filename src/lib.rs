pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod plot;
pub mod point;
pub mod publisher;
pub mod report;
pub mod series;
pub mod store;
pub mod table;
