use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::feed::gate::{QuoteRecord, RateRecord};
use crate::store::{BoundedHistory, InfoRegister};

/// Keep-alive message. Tagged so clients can never mistake it for an empty
/// data update.
pub const KEEPALIVE_MESSAGE: &str = r#"{"ping":true}"#;

/// Profit-estimate columns shown on the dashboard: principal in IDR paired
/// with the all-in break-even cost for that tier.
const PROFIT_TIER_20JT: (u64, i64) = (20_000_000, 19_315_000);
const PROFIT_TIER_30JT: (u64, i64) = (30_000_000, 28_980_000);

const RUPIAH_CACHE_CAPACITY: usize = 4096;

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMessage {
    pub history: Vec<RateRow>,
    pub usd_idr_history: Vec<QuoteRow>,
    pub treasury_info: String,
}

/// A rate record formatted for display. Rates carry dotted thousands
/// separators; `status` is the direction glyph.
#[derive(Debug, Serialize, Deserialize)]
pub struct RateRow {
    pub buying_rate: String,
    pub selling_rate: String,
    pub status: String,
    pub created_at: String,
    pub jt20: String,
    pub jt30: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuoteRow {
    pub price: String,
    pub time: String,
}

/// Bounded memoization of rupiah-formatted integers. Purely a display
/// optimization: the cache is cleared wholesale when full and no correctness
/// property depends on it.
pub struct RupiahCache {
    entries: Mutex<HashMap<u64, String>>,
}

impl RupiahCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn format(&self, value: u64) -> String {
        let mut entries = self.entries.lock().unwrap();
        if let Some(formatted) = entries.get(&value) {
            return formatted.clone();
        }
        if entries.len() >= RUPIAH_CACHE_CAPACITY {
            entries.clear();
        }
        let formatted = format_rupiah(value);
        entries.insert(value, formatted.clone());
        formatted
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl Default for RupiahCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes the current state of all three sources into one JSON message.
/// Rate rows go out in history (append) order, oldest first.
pub fn build_snapshot(
    rate_history: &BoundedHistory<RateRecord>,
    quote_history: &BoundedHistory<QuoteRecord>,
    info: &InfoRegister,
    cache: &RupiahCache,
) -> String {
    let history = rate_history
        .snapshot()
        .iter()
        .map(|record| rate_row(record, cache))
        .collect();

    let usd_idr_history = quote_history
        .snapshot()
        .into_iter()
        .map(|record| QuoteRow {
            price: record.price,
            time: record.observed_at,
        })
        .collect();

    let message = SnapshotMessage {
        history,
        usd_idr_history,
        treasury_info: info.get(),
    };

    // SnapshotMessage contains only strings and vectors of structs, which
    // always serialize.
    serde_json::to_string(&message).unwrap_or_else(|_| KEEPALIVE_MESSAGE.to_string())
}

fn rate_row(record: &RateRecord, cache: &RupiahCache) -> RateRow {
    RateRow {
        buying_rate: cache.format(record.buying_rate),
        selling_rate: cache.format(record.selling_rate),
        status: record.direction.glyph().to_string(),
        created_at: record.observed_at.clone(),
        jt20: profit_estimate(PROFIT_TIER_20JT, record, cache),
        jt30: profit_estimate(PROFIT_TIER_30JT, record, cache),
    }
}

/// Estimated profit for buying `principal` worth of gold at the buying rate
/// and selling it back at the selling rate, minus the tier's break-even cost.
fn profit_estimate((principal, cost): (u64, i64), record: &RateRecord, cache: &RupiahCache) -> String {
    if record.buying_rate == 0 || record.selling_rate == 0 {
        return "-".to_string();
    }

    let gross = principal as f64 / record.buying_rate as f64 * record.selling_rate as f64;
    let value = gross as i64 - cost;

    if value > 0 {
        format!("+{} 🟢", cache.format(value as u64))
    } else if value < 0 {
        format!("-{} 🔴", cache.format(value.unsigned_abs()))
    } else {
        "0 ➖".to_string()
    }
}

/// Formats an integer with dotted thousands separators: 1850000 → "1.850.000".
fn format_rupiah(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - offset) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}
