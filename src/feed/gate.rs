use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

/// Movement of the buying rate relative to the previous accepted observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    /// Display glyph used by the dashboard.
    pub fn glyph(&self) -> &'static str {
        match self {
            Direction::Up => "🚀",
            Direction::Down => "🔻",
            Direction::Flat => "➖",
        }
    }
}

/// A raw rate observation as it comes off the feed, before the gate has
/// decided whether it is newsworthy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateObservation {
    pub buying_rate: u64,
    pub selling_rate: u64,
    pub observed_at: String,
}

/// An accepted rate observation. Immutable once appended to history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRecord {
    pub buying_rate: u64,
    pub selling_rate: u64,
    pub direction: Direction,
    pub observed_at: String,
}

/// An accepted currency quote. The price string keeps the source's native
/// formatting verbatim; dedup works on string equality, not parsed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub price: String,
    pub observed_at: String,
}

/// Change detection for the rate feed.
///
/// Deduplicates on the feed's `observed_at` identifier and computes the
/// direction against the last accepted buying rate. The seen-set is bounded:
/// once it grows past capacity the oldest identifiers are forgotten, which is
/// fine because feed identifiers are monotonic in practice.
pub struct RateGate {
    seen: HashSet<String>,
    seen_order: VecDeque<String>,
    seen_capacity: usize,
    last_accepted_buy: Option<u64>,
}

impl RateGate {
    pub fn new(seen_capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
            seen_capacity,
            last_accepted_buy: None,
        }
    }

    /// Decides whether the observation enters history. Returns the accepted
    /// record, or `None` for duplicates and invalid data.
    pub fn evaluate(&mut self, observation: RateObservation) -> Option<RateRecord> {
        // Zero or missing numerics never enter history.
        if observation.buying_rate == 0 || observation.selling_rate == 0 {
            return None;
        }
        if observation.observed_at.is_empty() {
            return None;
        }
        if self.seen.contains(&observation.observed_at) {
            return None;
        }

        let direction = match self.last_accepted_buy {
            Some(last) if observation.buying_rate > last => Direction::Up,
            Some(last) if observation.buying_rate < last => Direction::Down,
            _ => Direction::Flat,
        };

        self.remember(observation.observed_at.clone());
        self.last_accepted_buy = Some(observation.buying_rate);

        Some(RateRecord {
            buying_rate: observation.buying_rate,
            selling_rate: observation.selling_rate,
            direction,
            observed_at: observation.observed_at,
        })
    }

    fn remember(&mut self, observed_at: String) {
        if self.seen_order.len() == self.seen_capacity {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(observed_at.clone());
        self.seen_order.push_back(observed_at);
    }
}

/// Change detection for the quote feed: keep a price iff it differs from the
/// immediate tail of the quote history. Older entries are not consulted, so
/// oscillating values are preserved.
pub struct QuoteGate;

impl QuoteGate {
    pub fn should_keep(candidate_price: &str, last_kept: Option<&QuoteRecord>) -> bool {
        if parse_price(candidate_price).is_none() {
            return false;
        }
        match last_kept {
            Some(last) => last.price != candidate_price,
            None => true,
        }
    }
}

/// Parses a source-formatted price ("16.250,00") to a number. The page can
/// serve placeholder text instead of a quote; anything that does not parse
/// is not a price and never enters history.
fn parse_price(price: &str) -> Option<f64> {
    let normalized = price.trim().replace('.', "").replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    normalized.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(buy: u64, sell: u64, at: &str) -> RateObservation {
        RateObservation {
            buying_rate: buy,
            selling_rate: sell,
            observed_at: at.to_string(),
        }
    }

    #[test]
    fn test_duplicate_observed_at_rejected() {
        let mut gate = RateGate::new(10);
        assert!(gate.evaluate(obs(100, 110, "T1")).is_some());
        assert!(gate.evaluate(obs(105, 115, "T1")).is_none());
    }

    #[test]
    fn test_direction_sequence() {
        let mut gate = RateGate::new(10);
        let rates = [100, 100, 105, 103];
        let mut directions = Vec::new();
        for (i, buy) in rates.iter().enumerate() {
            let record = gate.evaluate(obs(*buy, buy + 10, &format!("T{}", i))).unwrap();
            directions.push(record.direction);
        }
        assert_eq!(
            directions,
            vec![Direction::Flat, Direction::Flat, Direction::Up, Direction::Down]
        );
    }

    #[test]
    fn test_rejected_duplicate_does_not_shift_baseline() {
        let mut gate = RateGate::new(10);
        gate.evaluate(obs(100, 110, "T1")).unwrap();
        // Duplicate with a higher rate is rejected and must not become the
        // comparison baseline.
        assert!(gate.evaluate(obs(200, 210, "T1")).is_none());
        let record = gate.evaluate(obs(105, 115, "T2")).unwrap();
        assert_eq!(record.direction, Direction::Up);
    }

    #[test]
    fn test_zero_rates_rejected() {
        let mut gate = RateGate::new(10);
        assert!(gate.evaluate(obs(0, 110, "T1")).is_none());
        assert!(gate.evaluate(obs(100, 0, "T2")).is_none());
        assert!(gate.evaluate(obs(100, 110, "")).is_none());
    }

    #[test]
    fn test_seen_set_is_bounded() {
        let mut gate = RateGate::new(3);
        for i in 0..5 {
            gate.evaluate(obs(100 + i, 110, &format!("T{}", i))).unwrap();
        }
        assert_eq!(gate.seen.len(), 3);
        // T0 and T1 have been forgotten; re-submitting T0 is accepted again.
        assert!(gate.evaluate(obs(100, 110, "T0")).is_some());
        // T4 is still remembered.
        assert!(gate.evaluate(obs(104, 110, "T4")).is_none());
    }

    #[test]
    fn test_quote_gate_keeps_new_price() {
        assert!(QuoteGate::should_keep("16.200", None));

        let last = QuoteRecord {
            price: "16.200".to_string(),
            observed_at: "10:00:00".to_string(),
        };
        assert!(!QuoteGate::should_keep("16.200", Some(&last)));
        assert!(QuoteGate::should_keep("16.250", Some(&last)));
        assert!(!QuoteGate::should_keep("", Some(&last)));
    }

    #[test]
    fn test_non_numeric_quote_rejected() {
        // Placeholder text the page serves before a real quote loads.
        assert!(!QuoteGate::should_keep("Loading...", None));

        let last = QuoteRecord {
            price: "16.200".to_string(),
            observed_at: "10:00:00".to_string(),
        };
        assert!(!QuoteGate::should_keep("N/A", Some(&last)));
        assert!(!QuoteGate::should_keep("—", Some(&last)));
    }

    #[test]
    fn test_parse_price_formats() {
        assert_eq!(parse_price("16.250,00"), Some(16250.00));
        assert_eq!(parse_price("16.200"), Some(16200.0));
        assert_eq!(parse_price(" 16.312,50 "), Some(16312.50));
        assert_eq!(parse_price("Loading..."), None);
        assert_eq!(parse_price(""), None);
    }

    #[test]
    fn test_quote_oscillation_preserved() {
        let mut history: Vec<QuoteRecord> = Vec::new();
        for price in ["16.200", "16.250", "16.200"] {
            if QuoteGate::should_keep(price, history.last()) {
                history.push(QuoteRecord {
                    price: price.to_string(),
                    observed_at: "10:00:00".to_string(),
                });
            }
        }
        // The third value equals the first but differs from the tail, so it
        // is kept.
        assert_eq!(history.len(), 3);
    }
}
