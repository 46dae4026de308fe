use bigdecimal::BigDecimal;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;

use crate::blacklist::types::{BlacklistEntry, BlacklistKind};
use crate::ingest::types::Pair;

/// Insert a blacklist entry. ON CONFLICT DO NOTHING keeps the first reason and timestamp.
pub async fn insert_blacklist_entry(pool: &PgPool, entry: &BlacklistEntry) -> eyre::Result<bool> {
    let result = sqlx::query(
        "INSERT INTO blacklist (address, type, reason, listed_at)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (address) DO NOTHING",
    )
    .bind(&entry.address)
    .bind(entry.kind.as_str())
    .bind(&entry.reason)
    .bind(entry.listed_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Load every blacklisted address with its kind.
pub async fn fetch_blacklist(pool: &PgPool) -> eyre::Result<Vec<(String, BlacklistKind)>> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT address, type FROM blacklist")
        .fetch_all(pool)
        .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for (address, kind) in rows {
        match BlacklistKind::parse(&kind) {
            Some(kind) => entries.push((address, kind)),
            None => tracing::warn!(address = %address, kind = %kind, "Unknown blacklist type, ignoring"),
        }
    }
    Ok(entries)
}

/// Delete blacklist entries listed before a cutoff.
pub async fn delete_blacklist_before(pool: &PgPool, cutoff: DateTime<Utc>) -> eyre::Result<u64> {
    let result = sqlx::query("DELETE FROM blacklist WHERE listed_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Upsert a batch of pairs using multi-row INSERT ... ON CONFLICT DO UPDATE.
/// Chunks into groups of 1000 to stay within PostgreSQL parameter limits.
pub async fn upsert_pairs_batch(pool: &PgPool, pairs: &[Pair]) -> eyre::Result<u64> {
    if pairs.is_empty() {
        return Ok(0);
    }

    let rows = latest_per_pair(pairs)
        .into_iter()
        .map(|p| {
            Ok((
                p,
                to_numeric(p.price)?,
                to_numeric(p.liquidity)?,
                to_numeric(p.volume_24h)?,
            ))
        })
        .collect::<eyre::Result<Vec<_>>>()?;

    let mut written = 0u64;
    for chunk in rows.chunks(1000) {
        let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
            "INSERT INTO pairs (pair_address, base_token_name, base_token_address, \
             quote_token_address, price, liquidity, volume_24h, chain, exchange, \
             created_at, timestamp, creator_address) ",
        );

        query_builder.push_values(chunk, |mut b, (p, price, liquidity, volume)| {
            b.push_bind(p.pair_address.as_str())
                .push_bind(&p.base_token_name)
                .push_bind(p.base_token_address.as_str())
                .push_bind(p.quote_token_address.as_str())
                .push_bind(price)
                .push_bind(liquidity)
                .push_bind(volume)
                .push_bind(&p.chain)
                .push_bind(&p.exchange)
                .push_bind(p.created_at)
                .push_bind(p.timestamp)
                .push_bind(p.creator_address.as_str());
        });

        query_builder.push(
            " ON CONFLICT (pair_address) DO UPDATE SET \
             base_token_name = EXCLUDED.base_token_name, \
             base_token_address = EXCLUDED.base_token_address, \
             quote_token_address = EXCLUDED.quote_token_address, \
             price = EXCLUDED.price, \
             liquidity = EXCLUDED.liquidity, \
             volume_24h = EXCLUDED.volume_24h, \
             chain = EXCLUDED.chain, \
             exchange = EXCLUDED.exchange, \
             created_at = EXCLUDED.created_at, \
             timestamp = EXCLUDED.timestamp, \
             creator_address = EXCLUDED.creator_address",
        );
        written += query_builder.build().execute(pool).await?.rows_affected();
    }

    Ok(written)
}

/// Collapse repeated pair addresses to their last observation, keeping first-seen order.
/// A single upsert statement may not touch the same row twice.
pub(crate) fn latest_per_pair(pairs: &[Pair]) -> Vec<&Pair> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<&Pair> = Vec::with_capacity(pairs.len());
    for pair in pairs {
        match index.get(pair.pair_address.as_str()) {
            Some(&i) => out[i] = pair,
            None => {
                index.insert(pair.pair_address.as_str(), out.len());
                out.push(pair);
            }
        }
    }
    out
}

/// Decimal from the shortest representation that round-trips `value`.
fn to_numeric(value: f64) -> eyre::Result<BigDecimal> {
    if !value.is_finite() {
        return Err(eyre::eyre!("Cannot store {} as NUMERIC", value));
    }
    BigDecimal::from_str(&value.to_string())
        .map_err(|e| eyre::eyre!("Cannot store {} as NUMERIC: {}", value, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::fixtures::pair;

    #[test]
    fn latest_per_pair_keeps_last_observation() {
        let mut second = pair('1', '2', "tok");
        second.price = 2.0;
        let batch = vec![pair('1', '2', "tok"), pair('3', '4', "other"), second];

        let rows = latest_per_pair(&batch);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].price, 2.0);
        assert_eq!(rows[1].base_token_name, "other");
    }

    #[test]
    fn non_finite_values_are_rejected_as_numeric() {
        assert!(to_numeric(f64::NAN).is_err());
        assert_eq!(to_numeric(1.5).unwrap(), BigDecimal::from_str("1.5").unwrap());
    }

    #[test]
    fn numeric_keeps_reported_digits() {
        assert_eq!(to_numeric(1e-7).unwrap(), BigDecimal::from_str("0.0000001").unwrap());
        assert_eq!(to_numeric(0.1).unwrap(), BigDecimal::from_str("0.1").unwrap());
        assert_eq!(
            to_numeric(123456.789).unwrap(),
            BigDecimal::from_str("123456.789").unwrap()
        );
    }

    #[test]
    fn free_text_pair_columns_are_unbounded() {
        let schema = include_str!("../../migrations/0001_init.sql");
        for column in ["base_token_name", "chain", "exchange"] {
            let line = schema
                .lines()
                .find(|l| l.trim_start().starts_with(&format!("{} ", column)))
                .unwrap();
            assert!(line.contains(" TEXT NOT NULL"), "{}", line);
        }
    }
}
