pub mod anomaly;
pub mod blacklist;
pub mod config;
pub mod db;
pub mod ingest;
pub mod pipeline;
pub mod risk;
pub mod trading;
