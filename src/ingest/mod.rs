pub mod address;
pub mod creator;
pub mod fetcher;
pub mod normalizer;
pub mod types;
