//! Threshold-voting trade signal generation, transliterated from
//! `pathway_indicators/signal_generator.py::enhanced_signal_generator`.
//!
//! The Python source optionally augments the vote with a bundled
//! `HistGradientBoostingRegressor` model (`ml_model`); no such model ships
//! with this crate, so [`SignalGenerator::with_ml`] accepts an optional
//! scorer trait instead of a pickled sklearn artifact.

use crate::domain::{IndicatorSnapshot, TradeAction, TradeSignal};

const SL_ATR_MULT: f64 = 1.0;
const TP_ATR_MULT: f64 = 1.5;
const LIMIT_ORDER_AT_MULT: f64 = 0.25;
const ML_WEIGHT: u32 = 3;
const ML_THRESHOLD: f64 = 0.0;

/// Eleven-feature vector handed to an optional ML scorer, matching the
/// feature order built in `enhanced_signal_generator`.
#[derive(Debug, Clone, Copy)]
pub struct MlFeatures {
    pub rsi: f64,
    pub cmo: f64,
    pub crsi: f64,
    pub macd_rel: f64,
    pub atr_pct: f64,
    pub sma20_dist: f64,
    pub sma50_dist: f64,
    pub vwap_dist: f64,
    pub bb_pos: f64,
    pub keltner_pos: f64,
    pub volume_rel: f64,
}

/// A scorer standing in for the bundled sklearn model: positive output
/// votes BUY, negative votes SELL, magnitude is ignored beyond sign.
pub trait MlScorer: Send + Sync {
    fn score(&self, features: MlFeatures) -> f64;
}

pub struct SignalGenerator {
    buy_threshold: u32,
    sell_threshold: u32,
    ml: Option<Box<dyn MlScorer>>,
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self { buy_threshold: 5, sell_threshold: 5, ml: None }
    }
}

impl SignalGenerator {
    pub fn new(buy_threshold: u32, sell_threshold: u32) -> Self {
        Self { buy_threshold, sell_threshold, ml: None }
    }

    pub fn with_ml(mut self, scorer: Box<dyn MlScorer>) -> Self {
        self.ml = Some(scorer);
        self
    }

    /// Generates a trade signal for one indicator snapshot. `volumes` is the
    /// trailing volume window used by the (optional) ML feature vector.
    pub fn generate(&self, snapshot: &IndicatorSnapshot, volumes: &[f64]) -> TradeSignal {
        let current_price = snapshot.close;
        let current_volume = snapshot.volume;

        let mut signal = TradeSignal {
            ticker: snapshot.ticker.clone(),
            date: snapshot.window_end.to_rfc3339(),
            close_price: snapshot.close,
            open_price: snapshot.open,
            volume: snapshot.volume,
            high_price: snapshot.high,
            low_price: snapshot.low,
            action: TradeAction::Hold,
            stop_loss: None,
            take_profit: None,
            limit_order: None,
            signal_strength: 0,
            current_price,
            rsi: snapshot.rsi,
            macd: snapshot.macd,
            macd_signal: snapshot.macd_signal,
            macd_hist: snapshot.macd_hist,
            vwap: snapshot.vwap,
            bol_bands: [snapshot.bb_low, snapshot.bb_high],
            sma: [snapshot.sma20, snapshot.sma50],
            crsi: snapshot.crsi,
            klinger: [snapshot.klinger, snapshot.klinger_signal, snapshot.klinger_trend],
            keltner: [snapshot.keltner_mid, snapshot.keltner_high, snapshot.keltner_low],
            cmo: snapshot.cmo,
            reason: String::new(),
            abs_change: snapshot.day_change_abs,
            pct_change: snapshot.day_change_pct,
        };

        // Guard against invalid data: below the window's observed low, or no
        // trading at all, yields HOLD with no reasons attached.
        if current_price < snapshot.window_min_low || current_volume == 0.0 {
            return signal;
        }

        let mut reason = String::new();
        let mut buy = 0u32;
        let mut sell = 0u32;

        if snapshot.macd > snapshot.macd_signal && snapshot.macd_hist > 0.0 {
            buy += 1;
            reason.push_str("macd says BUY, ");
        }
        if snapshot.rsi > 25.0 && snapshot.rsi < 45.0 {
            buy += 1;
            reason.push_str("rsi says BUY, ");
        }
        if snapshot.crsi < 25.0 {
            buy += 1;
            reason.push_str("crsi says BUY, ");
        }
        if snapshot.bb_low != 0.0 && current_price <= snapshot.bb_low {
            buy += 1;
            reason.push_str("bb_low says BUY, ");
        }
        if snapshot.vwap != 0.0 && current_price >= snapshot.vwap * 1.01 {
            buy += 1;
            reason.push_str("vwap says BUY, ");
        }
        if snapshot.keltner_low != 0.0 && current_price <= snapshot.keltner_low {
            buy += 1;
            reason.push_str("keltner_low says BUY, ");
        }
        if snapshot.klinger > snapshot.klinger_signal && snapshot.klinger_trend > 0.0 {
            buy += 1;
            reason.push_str("klinger says BUY, ");
        }
        if snapshot.sma20 != 0.0 && snapshot.sma50 != 0.0 && snapshot.sma20 > snapshot.sma50 {
            buy += 1;
            reason.push_str("sma_trend says BUY, ");
        }
        if snapshot.cmo < -30.0 {
            buy += 1;
            reason.push_str("cmo says BUY, ");
        }

        if snapshot.macd < snapshot.macd_signal && snapshot.macd_hist < 0.0 {
            sell += 1;
            reason.push_str("macd says SELL, ");
        }
        if snapshot.rsi > 55.0 && snapshot.rsi < 75.0 {
            sell += 1;
            reason.push_str("rsi says SELL, ");
        }
        if snapshot.crsi > 75.0 {
            sell += 1;
            reason.push_str("crsi says SELL, ");
        }
        if current_price < snapshot.window_max_high * 0.99 {
            sell += 1;
        }
        if snapshot.bb_high != 0.0 && current_price >= snapshot.bb_high {
            sell += 1;
            reason.push_str("bb_high says SELL, ");
        }
        if snapshot.vwap != 0.0 && current_price <= 0.99 * snapshot.vwap {
            sell += 1;
            reason.push_str("vwap says SELL, ");
        }
        if snapshot.keltner_high != 0.0 && current_price >= snapshot.keltner_high {
            sell += 1;
            reason.push_str("kelt_up says SELL, ");
        }
        if snapshot.klinger < snapshot.klinger_signal && snapshot.klinger_trend < 0.0 {
            sell += 1;
            reason.push_str("klinger says SELL, ");
        }
        if snapshot.sma20 != 0.0 && snapshot.sma50 != 0.0 && snapshot.sma20 < snapshot.sma50 {
            sell += 1;
            reason.push_str("sma says SELL, ");
        }
        if snapshot.cmo > 30.0 {
            sell += 1;
            reason.push_str("cmo says SELL, ");
        }

        let mut buy_threshold = self.buy_threshold;
        let mut sell_threshold = self.sell_threshold;

        if let Some(scorer) = &self.ml {
            let vol_avg = if !volumes.is_empty() {
                volumes.iter().sum::<f64>() / volumes.len() as f64
            } else {
                1.0
            };
            let bb_range = snapshot.bb_high - snapshot.bb_low;
            let keltner_range = snapshot.keltner_high - snapshot.keltner_low;

            let features = MlFeatures {
                rsi: snapshot.rsi,
                cmo: snapshot.cmo,
                crsi: snapshot.crsi,
                macd_rel: if current_price != 0.0 { snapshot.macd / current_price * 100.0 } else { 0.0 },
                atr_pct: if current_price != 0.0 { snapshot.atr14 / current_price * 100.0 } else { 0.0 },
                sma20_dist: if snapshot.sma20 != 0.0 {
                    (current_price - snapshot.sma20) / snapshot.sma20 * 100.0
                } else {
                    0.0
                },
                sma50_dist: if snapshot.sma50 != 0.0 {
                    (current_price - snapshot.sma50) / snapshot.sma50 * 100.0
                } else {
                    0.0
                },
                vwap_dist: if snapshot.vwap != 0.0 {
                    (current_price - snapshot.vwap) / snapshot.vwap * 100.0
                } else {
                    0.0
                },
                bb_pos: if bb_range != 0.0 { (current_price - snapshot.bb_low) / bb_range } else { 0.5 },
                keltner_pos: if keltner_range != 0.0 {
                    (current_price - snapshot.keltner_low) / keltner_range
                } else {
                    0.5
                },
                volume_rel: if vol_avg != 0.0 { current_volume / vol_avg } else { 1.0 },
            };

            let prediction = scorer.score(features);
            if prediction > ML_THRESHOLD {
                buy += ML_WEIGHT;
                reason.push_str(&format!("xgb says buy with confidence ({prediction:.4}), "));
            } else if prediction < -ML_THRESHOLD {
                sell += ML_WEIGHT;
                reason.push_str(&format!("xgb says sell with confidence ({prediction:.4}), "));
            }
            sell_threshold += 2;
            buy_threshold += 2;
        }

        if buy >= buy_threshold {
            signal.action = TradeAction::Buy;
            signal.stop_loss = Some(current_price - SL_ATR_MULT * snapshot.atr14);
            signal.take_profit = Some(current_price + TP_ATR_MULT * snapshot.atr14);
            signal.signal_strength = buy;
            signal.limit_order = Some(current_price - LIMIT_ORDER_AT_MULT * snapshot.atr14);
        }

        if sell >= sell_threshold && signal.action != TradeAction::Buy {
            signal.action = TradeAction::Sell;
            signal.stop_loss = None;
            signal.take_profit = None;
            signal.signal_strength = sell;
            signal.limit_order = Some(current_price - LIMIT_ORDER_AT_MULT * snapshot.atr14);
        }

        signal.reason = reason;
        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            ticker: "RELIANCE".to_string(),
            close: 100.0,
            open: 98.0,
            volume: 1000.0,
            high: 101.0,
            low: 97.0,
            macd: 1.0,
            macd_signal: 0.2,
            macd_hist: 0.8,
            rsi: 30.0,
            adl: 0.0,
            sma20: 105.0,
            sma50: 100.0,
            std20: 2.0,
            bb_low: 95.0,
            bb_high: 110.0,
            vwap: 99.0,
            atr14: 2.0,
            cmo: -35.0,
            crsi: 20.0,
            klinger: 5.0,
            klinger_signal: 1.0,
            klinger_trend: 1.0,
            keltner_mid: 100.0,
            keltner_low: 96.0,
            keltner_high: 104.0,
            day_change_abs: 1.0,
            day_change_pct: 1.0,
            window_min_low: 90.0,
            window_max_high: 102.0,
            window_end: "2026-07-27T15:30:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn guard_clause_blocks_signal_below_window_low() {
        let generator = SignalGenerator::default();
        let mut snapshot = base_snapshot();
        snapshot.close = 50.0; // below window_min_low
        let signal = generator.generate(&snapshot, &[]);
        assert_eq!(signal.action, TradeAction::Hold);
        assert!(signal.reason.is_empty());
    }

    #[test]
    fn guard_clause_blocks_signal_on_zero_volume() {
        let generator = SignalGenerator::default();
        let mut snapshot = base_snapshot();
        snapshot.volume = 0.0;
        let signal = generator.generate(&snapshot, &[]);
        assert_eq!(signal.action, TradeAction::Hold);
    }

    #[test]
    fn oversold_confluence_triggers_buy() {
        let generator = SignalGenerator::new(5, 5);
        let snapshot = base_snapshot();
        let signal = generator.generate(&snapshot, &[]);
        assert_eq!(signal.action, TradeAction::Buy);
        assert!(signal.stop_loss.is_some());
        assert!(signal.take_profit.is_some());
    }
}
