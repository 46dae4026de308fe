use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::address::{self, Address};
use super::creator::CreatorLookup;
use super::types::{DropReason, Pair, PairCandidate};

/// Maps raw aggregator payloads onto [`Pair`] records.
pub struct Normalizer {
    whitelist: HashSet<String>,
    creators: Arc<dyn CreatorLookup>,
}

impl Normalizer {
    pub fn new(chain_whitelist: &[String], creators: Arc<dyn CreatorLookup>) -> Self {
        Self {
            whitelist: chain_whitelist.iter().map(|c| c.to_lowercase()).collect(),
            creators,
        }
    }

    /// Decode a raw batch, drop invalid records and attach creator addresses.
    pub async fn normalize(&self, raw: &[Value]) -> Vec<Pair> {
        let now = Utc::now();
        let mut dropped: HashMap<DropReason, usize> = HashMap::new();
        let mut pairs = Vec::with_capacity(raw.len());

        for record in raw {
            match decode_pair(record, &self.whitelist, now) {
                Ok(candidate) => {
                    let creator = self
                        .creators
                        .creator_of(&candidate.chain, &candidate.base_token_address)
                        .await;
                    pairs.push(candidate.with_creator(creator));
                }
                Err(reason) => *dropped.entry(reason).or_default() += 1,
            }
        }

        if !dropped.is_empty() {
            let summary: Vec<String> = dropped
                .iter()
                .map(|(reason, n)| format!("{}={}", reason.as_str(), n))
                .collect();
            tracing::debug!(dropped = ?summary, "Dropped malformed pairs");
        }

        pairs
    }
}

/// Decode one raw pair record. Pure; never panics on malformed input.
pub fn decode_pair(
    raw: &Value,
    whitelist: &HashSet<String>,
    now: DateTime<Utc>,
) -> Result<PairCandidate, DropReason> {
    if !raw.is_object() {
        return Err(DropReason::NotAnObject);
    }

    let pair_address = address_at(raw, &["pairAddress"]).ok_or(DropReason::InvalidPairAddress)?;
    let base_token_address =
        address_at(raw, &["baseToken", "address"]).ok_or(DropReason::InvalidBaseToken)?;
    let quote_token_address =
        address_at(raw, &["quoteToken", "address"]).ok_or(DropReason::InvalidQuoteToken)?;

    let base_token_name = string_at(raw, &["baseToken", "name"])
        .map(|n| n.to_lowercase())
        .ok_or(DropReason::MissingName)?;

    let price = number_at(raw, &["priceUsd"]).ok_or(DropReason::InvalidPrice)?;
    let liquidity = number_at(raw, &["liquidity", "usd"]).ok_or(DropReason::InvalidLiquidity)?;
    let volume_24h = number_at(raw, &["volume", "h24"]).ok_or(DropReason::InvalidVolume)?;

    let chain = string_at(raw, &["chainId"])
        .map(|c| c.to_lowercase())
        .ok_or(DropReason::MissingChain)?;
    if !whitelist.contains(&chain) {
        return Err(DropReason::ChainNotWhitelisted);
    }
    let exchange = string_at(raw, &["dexId"]).ok_or(DropReason::MissingExchange)?;

    let created_at = lookup(raw, &["pairCreatedAt"])
        .and_then(coerce_number)
        .and_then(|ms| DateTime::from_timestamp_millis(ms as i64));

    Ok(PairCandidate {
        pair_address,
        base_token_name,
        base_token_address,
        quote_token_address,
        price,
        liquidity,
        volume_24h,
        chain,
        exchange,
        created_at,
        timestamp: now,
    })
}

fn lookup<'a>(raw: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(raw, |node, key| node.get(key))
}

fn string_at(raw: &Value, path: &[&str]) -> Option<String> {
    lookup(raw, path)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn address_at(raw: &Value, path: &[&str]) -> Option<Address> {
    lookup(raw, path).and_then(Value::as_str).and_then(address::validate)
}

/// Non-negative finite number from either a JSON number or a numeric string.
fn number_at(raw: &Value, path: &[&str]) -> Option<f64> {
    lookup(raw, path)
        .and_then(coerce_number)
        .filter(|v| *v >= 0.0)
}

fn coerce_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}
