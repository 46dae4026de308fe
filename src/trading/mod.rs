pub mod binance;
pub mod executor;
