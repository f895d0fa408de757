//! Rolling market metrics per symbol.
//!
//! Keeps a 24h window of `(t, mid, volume)` samples per symbol and derives
//! the signals the top guard reads: short returns, 24h high, a simple RSI
//! and a volume surge score. Each `update` appends, evicts and recomputes
//! under the symbol's map entry lock, so one symbol's update-then-read is
//! atomic while different symbols proceed in parallel.

use std::collections::VecDeque;

use dashmap::DashMap;
use serde::Serialize;
use tracing::trace;

use crate::error::{RiskError, RiskResult};

const WINDOW_MS: u64 = 24 * 60 * 60 * 1000;
const ONE_MINUTE_MS: u64 = 60_000;
const FIVE_MINUTES_MS: u64 = 5 * ONE_MINUTE_MS;
/// Samples required before RSI is reported.
const RSI_MIN_SAMPLES: usize = 15;
/// Max deltas averaged by RSI.
const RSI_MAX_DELTAS: usize = 30;
const VOLUME_EMA_ALPHA: f64 = 0.2;

/// Derived metrics for one symbol at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub mid: f64,
    /// `mid / mid_1m_ago - 1`, 0 without history.
    pub ret_1m: f64,
    /// `mid / mid_5m_ago - 1`, 0 without history.
    pub ret_5m: f64,
    pub rsi_5m: Option<f64>,
    pub local_high_24h: f64,
    pub volume_zscore_5m: f64,
    pub sample_count: usize,
    pub updated_at_ms: u64,
}

impl MarketSnapshot {
    /// Distance below the 24h high in bps. A missing high counts as the mid.
    pub fn distance_from_high_bps(&self) -> f64 {
        let high = if self.local_high_24h > 0.0 {
            self.local_high_24h
        } else {
            self.mid
        };
        if high <= 0.0 {
            return 10_000.0;
        }
        (high - self.mid) / high * 10_000.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    t_ms: u64,
    mid: f64,
    volume: f64,
}

#[derive(Debug, Default)]
struct SymbolHistory {
    samples: VecDeque<Sample>,
    volume_ema: Option<f64>,
    last: Option<MarketSnapshot>,
}

impl SymbolHistory {
    fn evict(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(WINDOW_MS);
        while self.samples.front().is_some_and(|s| s.t_ms < cutoff) {
            self.samples.pop_front();
        }
    }

    /// Latest sample at or before `cutoff`.
    fn mid_at_or_before(&self, cutoff: u64) -> Option<f64> {
        self.samples
            .iter()
            .rev()
            .find(|s| s.t_ms <= cutoff)
            .map(|s| s.mid)
    }

    fn return_over(&self, mid: f64, now_ms: u64, lookback_ms: u64) -> f64 {
        if now_ms < lookback_ms {
            return 0.0;
        }
        match self.mid_at_or_before(now_ms - lookback_ms) {
            Some(past) if past > 0.0 => mid / past - 1.0,
            _ => 0.0,
        }
    }

    fn high(&self, mid: f64) -> f64 {
        self.samples.iter().map(|s| s.mid).fold(mid, f64::max)
    }

    fn rsi(&self) -> Option<f64> {
        if self.samples.len() < RSI_MIN_SAMPLES {
            return None;
        }

        let (mut gains, mut losses, mut count) = (0.0, 0.0, 0usize);
        let mids: Vec<f64> = self
            .samples
            .iter()
            .rev()
            .take(RSI_MAX_DELTAS + 1)
            .map(|s| s.mid)
            .collect();
        // mids is newest first
        for pair in mids.windows(2) {
            let diff = pair[0] - pair[1];
            if diff > 0.0 {
                gains += diff;
            } else {
                losses -= diff;
            }
            count += 1;
        }
        if count == 0 {
            return None;
        }

        let avg_gain = gains / count as f64;
        let avg_loss = losses / count as f64;
        if avg_loss == 0.0 {
            return Some(100.0);
        }
        Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
    }

    /// Volume over the last 5m relative to its EMA. Advances the EMA once.
    fn volume_zscore(&mut self, now_ms: u64) -> f64 {
        let cutoff = now_ms.saturating_sub(FIVE_MINUTES_MS);
        let vol_5m: f64 = self
            .samples
            .iter()
            .rev()
            .take_while(|s| s.t_ms >= cutoff)
            .map(|s| s.volume)
            .sum();

        let ema = match self.volume_ema {
            None => vol_5m,
            Some(prev) => VOLUME_EMA_ALPHA * vol_5m + (1.0 - VOLUME_EMA_ALPHA) * prev,
        };
        self.volume_ema = Some(ema);

        if ema <= 0.0 {
            return 0.0;
        }
        (vol_5m - ema) / ema
    }
}

/// Rolling per-symbol market history.
#[derive(Debug, Default)]
pub struct MetricsStore {
    history: DashMap<String, SymbolHistory>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample and return the recomputed snapshot.
    ///
    /// Rejects non-finite or non-positive mids, negative volume, and
    /// timestamps older than the symbol's latest sample.
    pub fn update(
        &self,
        symbol: &str,
        mid: f64,
        volume: f64,
        now_ms: u64,
    ) -> RiskResult<MarketSnapshot> {
        if !mid.is_finite() || mid <= 0.0 {
            return Err(RiskError::invalid("mid", mid));
        }
        if !volume.is_finite() || volume < 0.0 {
            return Err(RiskError::invalid("volume", volume));
        }

        let mut entry = self.history.entry(symbol.to_string()).or_default();
        let hist = entry.value_mut();

        if let Some(last) = hist.samples.back() {
            if now_ms < last.t_ms {
                return Err(RiskError::TimeRegression {
                    symbol: symbol.to_string(),
                    now_ms,
                    last_ms: last.t_ms,
                });
            }
        }

        // Returns look at history before this sample
        let ret_1m = hist.return_over(mid, now_ms, ONE_MINUTE_MS);
        let ret_5m = hist.return_over(mid, now_ms, FIVE_MINUTES_MS);

        hist.samples.push_back(Sample {
            t_ms: now_ms,
            mid,
            volume,
        });
        hist.evict(now_ms);

        let snapshot = MarketSnapshot {
            mid,
            ret_1m,
            ret_5m,
            rsi_5m: hist.rsi(),
            local_high_24h: hist.high(mid),
            volume_zscore_5m: hist.volume_zscore(now_ms),
            sample_count: hist.samples.len(),
            updated_at_ms: now_ms,
        };

        trace!(
            symbol,
            ret_1m = snapshot.ret_1m,
            ret_5m = snapshot.ret_5m,
            rsi = ?snapshot.rsi_5m,
            vol_z = snapshot.volume_zscore_5m,
            samples = snapshot.sample_count,
            "Metrics updated"
        );

        hist.last = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Last computed snapshot, if the symbol has been updated.
    pub fn snapshot(&self, symbol: &str) -> Option<MarketSnapshot> {
        self.history.get(symbol).and_then(|h| h.last.clone())
    }

    pub fn sample_count(&self, symbol: &str) -> usize {
        self.history.get(symbol).map(|h| h.samples.len()).unwrap_or(0)
    }

    /// Drop all history for a symbol (e.g. on pair rotation).
    pub fn remove(&self, symbol: &str) -> bool {
        self.history.remove(symbol).is_some()
    }

    pub fn symbol_count(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const SEC: u64 = 1000;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_first_update_has_zero_returns() {
        let store = MetricsStore::new();
        let snap = store.update("ZEC", 100.0, 0.0, 1_000 * SEC).unwrap();
        assert_eq!(snap.ret_1m, 0.0);
        assert_eq!(snap.ret_5m, 0.0);
        assert_eq!(snap.local_high_24h, 100.0);
        assert_eq!(snap.rsi_5m, None);
        assert_eq!(snap.sample_count, 1);
    }

    #[test]
    fn test_returns_use_sample_at_or_before_cutoff() {
        let store = MetricsStore::new();
        let t0 = 10_000 * SEC;
        store.update("ZEC", 100.0, 0.0, t0).unwrap();
        store.update("ZEC", 101.0, 0.0, t0 + 200 * SEC).unwrap();
        let snap = store.update("ZEC", 102.0, 0.0, t0 + 300 * SEC).unwrap();

        assert!(approx(snap.ret_5m, 102.0 / 100.0 - 1.0));
        assert!(approx(snap.ret_1m, 102.0 / 101.0 - 1.0));
    }

    #[test]
    fn test_high_and_eviction() {
        let store = MetricsStore::new();
        let t0 = 10_000 * SEC;
        store.update("UNI", 120.0, 0.0, t0).unwrap();
        let snap = store.update("UNI", 100.0, 0.0, t0 + SEC).unwrap();
        assert_eq!(snap.local_high_24h, 120.0);
        assert!(approx(snap.distance_from_high_bps(), (120.0 - 100.0) / 120.0 * 10_000.0));

        // 24h later the 120 sample is gone
        let snap = store
            .update("UNI", 90.0, 0.0, t0 + WINDOW_MS + 500)
            .unwrap();
        assert_eq!(snap.local_high_24h, 100.0);
        assert_eq!(snap.sample_count, 2);
    }

    #[test]
    fn test_rsi_requires_history() {
        let store = MetricsStore::new();
        let t0 = 10_000 * SEC;
        for i in 0..14 {
            let snap = store
                .update("V", 100.0 + i as f64, 0.0, t0 + i * SEC)
                .unwrap();
            assert_eq!(snap.rsi_5m, None);
        }
        let snap = store.update("V", 200.0, 0.0, t0 + 14 * SEC).unwrap();
        assert_eq!(snap.rsi_5m, Some(100.0));
    }

    #[test]
    fn test_rsi_balanced_moves() {
        let store = MetricsStore::new();
        let t0 = 10_000 * SEC;
        let mut snap = None;
        for i in 0..15u64 {
            let mid = if i % 2 == 0 { 100.0 } else { 101.0 };
            snap = Some(store.update("V", mid, 0.0, t0 + i * SEC).unwrap());
        }
        let rsi = snap.and_then(|s| s.rsi_5m).unwrap();
        assert!(approx(rsi, 50.0));
    }

    #[test]
    fn test_volume_zscore_ema() {
        let store = MetricsStore::new();
        let t0 = 10_000 * SEC;
        let first = store.update("Z", 100.0, 10.0, t0).unwrap();
        assert_eq!(first.volume_zscore_5m, 0.0);

        // vol5m = 20, ema = 0.2*20 + 0.8*10 = 12
        let second = store.update("Z", 100.0, 10.0, t0 + SEC).unwrap();
        assert!(approx(second.volume_zscore_5m, 8.0 / 12.0));

        let quiet = MetricsStore::new();
        assert_eq!(quiet.update("Q", 1.0, 0.0, t0).unwrap().volume_zscore_5m, 0.0);
    }

    #[test]
    fn test_rejects_bad_input() {
        let store = MetricsStore::new();
        assert!(matches!(
            store.update("Z", f64::NAN, 0.0, 1),
            Err(RiskError::InvalidInput { field: "mid", .. })
        ));
        assert!(store.update("Z", -1.0, 0.0, 1).is_err());
        assert!(store.update("Z", 1.0, f64::INFINITY, 1).is_err());

        store.update("Z", 1.0, 0.0, 5_000).unwrap();
        assert!(matches!(
            store.update("Z", 1.0, 0.0, 4_000),
            Err(RiskError::TimeRegression { .. })
        ));
        assert_eq!(store.sample_count("Z"), 1);
    }

    #[test]
    fn test_snapshot_and_remove() {
        let store = MetricsStore::new();
        assert!(store.snapshot("Z").is_none());
        store.update("Z", 5.0, 1.0, 1_000).unwrap();
        assert_eq!(store.snapshot("Z").map(|s| s.mid), Some(5.0));
        assert!(store.remove("Z"));
        assert!(!store.remove("Z"));
        assert_eq!(store.symbol_count(), 0);
    }

    #[test]
    fn test_concurrent_symbols() {
        let store = Arc::new(MetricsStore::new());
        let handles: Vec<_> = ["A", "B", "C", "D"]
            .into_iter()
            .map(|sym| {
                let s = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50u64 {
                        s.update(sym, 100.0 + i as f64, 1.0, 1_000 + i * SEC).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for sym in ["A", "B", "C", "D"] {
            assert_eq!(store.sample_count(sym), 50);
        }
    }
}
