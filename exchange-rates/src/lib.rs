//! Exchange Rate Table
//!
//! An immutable snapshot of every known currency and its rate against the
//! current base currency. All mutations (rebasing, merging a fresh snapshot
//! from a rate API, adding or toggling a currency) produce a *new* table, so
//! callers can validate the result, persist it in one transaction, and only
//! then publish it to readers.
//!
//! # Rate semantics
//! `exchange_rate` is the number of units of a currency that one unit of the
//! base buys. The base itself is always `1.0`.
//!
//! # Example
//! ```
//! use exchange_rates::{RateTable, default_currencies};
//!
//! let table = RateTable::from_currencies(default_currencies(chrono::Utc::now())).unwrap();
//! let eur = table.convert("USD", "EUR", 100.0).unwrap();
//! assert_eq!(eur, 92.0);
//! ```

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ─────────────────────────────────────────────────────────────────────────────
// Precision
// ─────────────────────────────────────────────────────────────────────────────

/// Number of decimal places every stored rate and converted amount keeps.
pub const RATE_DECIMALS: u32 = 6;

const RATE_SCALE: f64 = 1_000_000.0;

/// Rounds half away from zero to [`RATE_DECIMALS`] places.
pub fn round_rate(value: f64) -> f64 {
    (value * RATE_SCALE).round() / RATE_SCALE
}

/// Canonical form of a currency code (`" eur"` → `"EUR"`).
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by rate table operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateError {
    #[error("Unknown or inactive currency: {0}")]
    UnknownCurrency(String),

    #[error("Amount must be a non-negative finite number, got {0}")]
    InvalidAmount(f64),

    #[error("Invalid exchange rate for {code}: {rate}")]
    InvalidRate { code: String, rate: f64 },

    #[error("Rate table must have exactly one base currency, found {0}")]
    BaseCount(usize),

    #[error("Currency already exists: {0}")]
    DuplicateCurrency(String),

    #[error("Base currency {0} cannot be deactivated")]
    BaseDeactivation(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Currency record
// ─────────────────────────────────────────────────────────────────────────────

/// One row of the rate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Currency {
    /// ISO-like code, always upper case
    #[schema(example = "EUR")]
    pub code: String,
    #[schema(example = "Euro")]
    pub name: String,
    #[schema(example = "€")]
    pub symbol: String,
    pub is_active: bool,
    pub is_base: bool,
    /// Units of this currency per one unit of the base
    #[schema(example = 0.92)]
    pub exchange_rate: f64,
    pub last_updated: DateTime<Utc>,
}

impl Currency {
    /// Creates an active, non-base currency.
    pub fn new(
        code: &str,
        name: impl Into<String>,
        symbol: impl Into<String>,
        exchange_rate: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            code: normalize_code(code),
            name: name.into(),
            symbol: symbol.into(),
            is_active: true,
            is_base: false,
            exchange_rate,
            last_updated: now,
        }
    }

    /// Creates the base currency, rate 1.
    pub fn base(code: &str, name: &str, symbol: &str, now: DateTime<Utc>) -> Self {
        Self {
            is_base: true,
            ..Self::new(code, name, symbol, 1.0, now)
        }
    }
}

/// Currencies seeded into an empty store, with USD as base.
pub fn default_currencies(now: DateTime<Utc>) -> Vec<Currency> {
    vec![
        Currency::base("USD", "US Dollar", "$", now),
        Currency::new("EUR", "Euro", "€", 0.92, now),
        Currency::new("GBP", "British Pound", "£", 0.79, now),
        Currency::new("INR", "Indian Rupee", "₹", 83.12, now),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Refresh report
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of merging a rate snapshot into a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RefreshReport {
    /// Base currency the snapshot was keyed by
    pub base: String,
    /// Currencies whose rate was replaced
    pub updated: Vec<String>,
    /// Known currencies absent from the snapshot (rate left unchanged)
    pub missing: Vec<String>,
    /// Known currencies with a non-positive or non-finite rate in the snapshot
    pub invalid: Vec<String>,
}

impl RefreshReport {
    /// True when every non-base currency received a usable rate.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rate table
// ─────────────────────────────────────────────────────────────────────────────

/// Validated set of currencies with exactly one base.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    currencies: BTreeMap<String, Currency>,
    base_code: String,
}

impl RateTable {
    /// Builds a table, enforcing the single-base and positive-rate invariants.
    pub fn from_currencies(currencies: Vec<Currency>) -> Result<Self, RateError> {
        let mut map = BTreeMap::new();
        for mut currency in currencies {
            currency.code = normalize_code(&currency.code);
            if !is_valid_rate(currency.exchange_rate) {
                return Err(RateError::InvalidRate {
                    code: currency.code,
                    rate: currency.exchange_rate,
                });
            }
            if map.contains_key(&currency.code) {
                return Err(RateError::DuplicateCurrency(currency.code));
            }
            map.insert(currency.code.clone(), currency);
        }

        let bases: Vec<&Currency> = map.values().filter(|c| c.is_base).collect();
        if bases.len() != 1 {
            return Err(RateError::BaseCount(bases.len()));
        }
        let base = bases[0];
        if base.exchange_rate != 1.0 {
            return Err(RateError::InvalidRate {
                code: base.code.clone(),
                rate: base.exchange_rate,
            });
        }
        let base_code = base.code.clone();

        Ok(Self {
            currencies: map,
            base_code,
        })
    }

    /// The current base currency.
    pub fn base(&self) -> &Currency {
        &self.currencies[&self.base_code]
    }

    pub fn base_code(&self) -> &str {
        &self.base_code
    }

    /// Looks up a currency regardless of whether it is active.
    pub fn get(&self, code: &str) -> Option<&Currency> {
        self.currencies.get(&normalize_code(code))
    }

    /// All currencies ordered by code.
    pub fn currencies(&self) -> impl Iterator<Item = &Currency> {
        self.currencies.values()
    }

    pub fn to_vec(&self) -> Vec<Currency> {
        self.currencies.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }

    /// Rate of an active currency relative to the base.
    pub fn rate(&self, code: &str) -> Result<f64, RateError> {
        match self.get(code) {
            Some(c) if c.is_active => Ok(c.exchange_rate),
            _ => Err(RateError::UnknownCurrency(normalize_code(code))),
        }
    }

    /// Converts `amount` through the base currency, rounded to six places.
    pub fn convert(&self, from: &str, to: &str, amount: f64) -> Result<f64, RateError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(RateError::InvalidAmount(amount));
        }
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        Ok(round_rate(amount / from_rate * to_rate))
    }

    /// Makes `new_base` the base and re-expresses every rate against it.
    ///
    /// Each rate is divided by the new base's old rate and rounded, which
    /// keeps the cross rates between the remaining currencies unchanged.
    pub fn rebase(&self, new_base: &str, now: DateTime<Utc>) -> Result<Self, RateError> {
        let new_base = normalize_code(new_base);
        let pivot = self.rate(&new_base)?;
        if new_base == self.base_code {
            return Ok(self.clone());
        }

        let mut currencies = BTreeMap::new();
        for (code, currency) in &self.currencies {
            let is_base = *code == new_base;
            let exchange_rate = if is_base {
                1.0
            } else {
                round_rate(currency.exchange_rate / pivot)
            };
            if !is_valid_rate(exchange_rate) {
                return Err(RateError::InvalidRate {
                    code: code.clone(),
                    rate: exchange_rate,
                });
            }
            currencies.insert(
                code.clone(),
                Currency {
                    is_base,
                    exchange_rate,
                    last_updated: now,
                    ..currency.clone()
                },
            );
        }

        Ok(Self {
            currencies,
            base_code: new_base,
        })
    }

    /// Merges a snapshot of `code → rate` (keyed by the current base).
    ///
    /// Currencies missing from the snapshot, or with an unusable rate, keep
    /// their previous value and are listed in the report. Codes present in
    /// the snapshot but unknown to the table are ignored.
    pub fn apply_snapshot(
        &self,
        snapshot: &HashMap<String, f64>,
        now: DateTime<Utc>,
    ) -> (Self, RefreshReport) {
        let normalized: HashMap<String, f64> = snapshot
            .iter()
            .map(|(code, rate)| (normalize_code(code), *rate))
            .collect();

        let mut report = RefreshReport {
            base: self.base_code.clone(),
            ..RefreshReport::default()
        };
        let mut next = self.clone();

        for (code, currency) in next.currencies.iter_mut() {
            if currency.is_base {
                continue;
            }
            match normalized.get(code).map(|rate| round_rate(*rate)) {
                Some(rate) if is_valid_rate(rate) => {
                    currency.exchange_rate = rate;
                    currency.last_updated = now;
                    report.updated.push(code.clone());
                }
                Some(_) => report.invalid.push(code.clone()),
                None => report.missing.push(code.clone()),
            }
        }

        (next, report)
    }

    /// Returns a table that additionally contains `currency` (never as base).
    pub fn with_currency(&self, mut currency: Currency) -> Result<Self, RateError> {
        currency.code = normalize_code(&currency.code);
        if self.currencies.contains_key(&currency.code) {
            return Err(RateError::DuplicateCurrency(currency.code));
        }
        // A positive rate below the stored precision rounds to zero.
        let rate = round_rate(currency.exchange_rate);
        if !is_valid_rate(rate) {
            return Err(RateError::InvalidRate {
                code: currency.code,
                rate: currency.exchange_rate,
            });
        }
        currency.is_base = false;
        currency.exchange_rate = rate;

        let mut next = self.clone();
        next.currencies.insert(currency.code.clone(), currency);
        Ok(next)
    }

    /// Returns a table with `code` activated or deactivated.
    pub fn with_active(
        &self,
        code: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, RateError> {
        let code = normalize_code(code);
        if !active && code == self.base_code {
            return Err(RateError::BaseDeactivation(code));
        }
        let mut next = self.clone();
        let currency = next
            .currencies
            .get_mut(&code)
            .ok_or_else(|| RateError::UnknownCurrency(code.clone()))?;
        currency.is_active = active;
        currency.last_updated = now;
        Ok(next)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RateTable {
        RateTable::from_currencies(default_currencies(Utc::now())).unwrap()
    }

    fn within_tolerance(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-6 * a.abs().max(1.0)
    }

    #[test]
    fn test_round_rate() {
        assert_eq!(round_rate(1.23456789), 1.234568);
        assert_eq!(round_rate(0.0000004), 0.0);
        assert_eq!(round_rate(2.0), 2.0);
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" eur "), "EUR");
    }

    #[test]
    fn test_convert_usd_to_eur() {
        assert_eq!(table().convert("USD", "EUR", 100.0).unwrap(), 92.0);
    }

    #[test]
    fn test_convert_is_case_insensitive() {
        assert_eq!(table().convert("usd", "eur", 100.0).unwrap(), 92.0);
    }

    #[test]
    fn test_convert_negative_amount_fails() {
        let result = table().convert("USD", "EUR", -1.0);
        assert!(matches!(result, Err(RateError::InvalidAmount(_))));
    }

    #[test]
    fn test_convert_unknown_currency_fails() {
        let result = table().convert("USD", "XYZ", 1.0);
        assert_eq!(result, Err(RateError::UnknownCurrency("XYZ".into())));
    }

    #[test]
    fn test_inactive_currency_is_not_found() {
        let table = table().with_active("GBP", false, Utc::now()).unwrap();
        assert!(matches!(
            table.rate("GBP"),
            Err(RateError::UnknownCurrency(_))
        ));
        assert!(table.get("GBP").is_some());
    }

    #[test]
    fn test_conversion_round_trip() {
        let table = table();
        let codes = ["USD", "EUR", "GBP", "INR"];
        for from in codes {
            for to in codes {
                for amount in [0.0, 1.0, 25.0, 1234.56] {
                    let there = table.convert(from, to, amount).unwrap();
                    let back = table.convert(to, from, there).unwrap();
                    assert!(
                        (back - amount).abs() <= 1e-6 * amount.max(1.0) * 10.0,
                        "{from}->{to}->{from} of {amount} gave {back}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_rebase_preserves_cross_rates() {
        let before = table();
        let after = before.rebase("EUR", Utc::now()).unwrap();

        assert_eq!(after.base_code(), "EUR");
        assert_eq!(after.rate("EUR").unwrap(), 1.0);
        assert!(!after.get("USD").unwrap().is_base);

        let ratio_before = before.rate("GBP").unwrap() / before.rate("INR").unwrap();
        let ratio_after = after.rate("GBP").unwrap() / after.rate("INR").unwrap();
        assert!(within_tolerance(ratio_before, ratio_after));
    }

    #[test]
    fn test_repeated_rebase_is_stable() {
        let start = table();
        let round_trip = start
            .rebase("INR", Utc::now())
            .and_then(|t| t.rebase("GBP", Utc::now()))
            .and_then(|t| t.rebase("USD", Utc::now()))
            .unwrap();

        assert_eq!(round_trip.base_code(), "USD");
        for code in ["EUR", "GBP", "INR"] {
            let a = start.rate(code).unwrap();
            let b = round_trip.rate(code).unwrap();
            assert!((a - b).abs() / a < 1e-4, "{code}: {a} vs {b}");
        }
    }

    #[test]
    fn test_rebase_to_inactive_currency_fails() {
        let table = table().with_active("INR", false, Utc::now()).unwrap();
        assert!(table.rebase("INR", Utc::now()).is_err());
    }

    #[test]
    fn test_apply_snapshot_reports_missing() {
        let snapshot = HashMap::from([("eur".to_string(), 0.95), ("INR".to_string(), -3.0)]);
        let (next, report) = table().apply_snapshot(&snapshot, Utc::now());

        assert_eq!(next.rate("EUR").unwrap(), 0.95);
        assert_eq!(next.rate("GBP").unwrap(), 0.79);
        assert_eq!(next.rate("INR").unwrap(), 83.12);
        assert_eq!(report.updated, vec!["EUR".to_string()]);
        assert_eq!(report.missing, vec!["GBP".to_string()]);
        assert_eq!(report.invalid, vec!["INR".to_string()]);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_apply_snapshot_rejects_rate_rounding_to_zero() {
        let snapshot = HashMap::from([
            ("EUR".to_string(), 0.0000004),
            ("GBP".to_string(), 0.8),
            ("INR".to_string(), 83.0),
        ]);
        let (next, report) = table().apply_snapshot(&snapshot, Utc::now());

        assert_eq!(report.invalid, vec!["EUR".to_string()]);
        assert!(!report.updated.contains(&"EUR".to_string()));
        assert_eq!(next.rate("EUR").unwrap(), 0.92);
        assert_eq!(next.convert("EUR", "USD", 1.0).unwrap(), round_rate(1.0 / 0.92));
    }

    #[test]
    fn test_apply_snapshot_never_touches_base() {
        let snapshot = HashMap::from([("USD".to_string(), 3.0)]);
        let (next, _) = table().apply_snapshot(&snapshot, Utc::now());
        assert_eq!(next.rate("USD").unwrap(), 1.0);
    }

    #[test]
    fn test_table_requires_single_base() {
        let mut currencies = default_currencies(Utc::now());
        currencies[1].is_base = true;
        assert_eq!(
            RateTable::from_currencies(currencies),
            Err(RateError::BaseCount(2))
        );
    }

    #[test]
    fn test_table_rejects_non_positive_rate() {
        let mut currencies = default_currencies(Utc::now());
        currencies[2].exchange_rate = 0.0;
        assert!(matches!(
            RateTable::from_currencies(currencies),
            Err(RateError::InvalidRate { .. })
        ));
    }

    #[test]
    fn test_with_currency_rejects_duplicate() {
        let result = table().with_currency(Currency::new("eur", "Euro", "€", 0.9, Utc::now()));
        assert_eq!(result, Err(RateError::DuplicateCurrency("EUR".into())));
    }

    #[test]
    fn test_with_currency_rejects_rate_rounding_to_zero() {
        let result = table().with_currency(Currency::new("XTN", "Tiny", "t", 0.0000001, Utc::now()));
        assert!(matches!(
            result,
            Err(RateError::InvalidRate { ref code, .. }) if code == "XTN"
        ));
    }

    #[test]
    fn test_base_cannot_be_deactivated() {
        let result = table().with_active("USD", false, Utc::now());
        assert_eq!(result, Err(RateError::BaseDeactivation("USD".into())));
    }
}
