use std::sync::Arc;

use crate::config::{TradeMode, TradingConfig};
use crate::ingest::types::Pair;

use super::binance::{OrderAck, OrderVenue};

#[derive(Debug, Clone, PartialEq)]
pub enum TradeOutcome {
    Simulated { symbol: String, quantity: f64 },
    Placed(OrderAck),
    Failed { symbol: String, error: String },
}

/// Fire-and-forget market buys. Never retries and never returns an error.
pub struct TradeExecutor {
    mode: TradeMode,
    venue: Arc<dyn OrderVenue>,
    quote_suffix: String,
    quantity: f64,
}

impl TradeExecutor {
    pub fn new(config: &TradingConfig, venue: Arc<dyn OrderVenue>) -> Self {
        Self {
            mode: config.mode,
            venue,
            quote_suffix: config.quote_suffix.clone(),
            quantity: config.quantity,
        }
    }

    pub fn symbol_for(&self, pair: &Pair) -> String {
        format!("{}{}", pair.base_token_name.to_uppercase(), self.quote_suffix)
    }

    pub async fn place_buy(&self, pair: &Pair) -> TradeOutcome {
        let symbol = self.symbol_for(pair);

        match self.mode {
            TradeMode::Test => {
                tracing::info!(
                    symbol = %symbol,
                    quantity = self.quantity,
                    "Test mode: simulated market buy"
                );
                TradeOutcome::Simulated {
                    symbol,
                    quantity: self.quantity,
                }
            }
            TradeMode::Production => match self.venue.market_buy(&symbol, self.quantity).await {
                Ok(ack) => {
                    tracing::info!(
                        symbol = %symbol,
                        order_id = ack.order_id,
                        quantity = self.quantity,
                        "Order placed"
                    );
                    TradeOutcome::Placed(ack)
                }
                Err(e) => {
                    tracing::error!(symbol = %symbol, error = %e, "Order failed");
                    TradeOutcome::Failed {
                        symbol,
                        error: e.to_string(),
                    }
                }
            },
        }
    }
}
