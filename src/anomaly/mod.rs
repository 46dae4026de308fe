pub mod corpus;
pub mod engine;
pub mod forest;
pub mod types;
