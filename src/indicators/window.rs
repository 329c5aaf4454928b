//! Sliding-window host for the technical indicator accumulators.
//!
//! One window per ticker, maintained incrementally: each admitted candle is
//! merged in and every candle older than `WINDOW_DURATION_MINUTES` is
//! retracted out, exercising the accumulators' `merge`/`retract` pair the
//! way the Pathway `windowby(..., sliding(...))` stage would. A snapshot is
//! emitted at most once per hop boundary: emission is gated on a
//! high-water mark (`last_emitted_end`), so a late-arriving candle that
//! floors into an already-emitted bucket is merged into the window but
//! never triggers a second snapshot for that bucket.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{Candle, IndicatorSnapshot};
use crate::indicators::{
    Accumulator, AdlAccumulator, Atr14Accumulator, BollingerBand20Accumulator, CmoAccumulator,
    CrsiAccumulator, DayChangeAccumulator, KeltnerMidAccumulator, KlingerAccumulator, MacdAccumulator,
    ObvAccumulator, RsiAccumulator, Sma20Accumulator, Sma50Accumulator, Std20Accumulator, VwapAccumulator,
};

pub const WINDOW_DURATION_MINUTES: i64 = 900;
pub const WINDOW_HOP_MINUTES: i64 = 5;
const MIN_VALID_YEAR: i32 = 2000;
const MAX_VALID_YEAR: i32 = 2100;

fn is_plausible(ts: DateTime<Utc>) -> bool {
    let year = ts.date_naive().year();
    (MIN_VALID_YEAR..=MAX_VALID_YEAR).contains(&year)
}

#[derive(Default, Clone)]
struct TickerWindow {
    candles: Vec<Candle>,
    day_change: DayChangeAccumulator,
    macd: MacdAccumulator,
    rsi: RsiAccumulator,
    sma20: Sma20Accumulator,
    sma50: Sma50Accumulator,
    std20: Std20Accumulator,
    bollinger: BollingerBand20Accumulator,
    vwap: VwapAccumulator,
    atr14: Atr14Accumulator,
    cmo: CmoAccumulator,
    crsi: CrsiAccumulator,
    klinger: KlingerAccumulator,
    keltner: KeltnerMidAccumulator,
    adl: AdlAccumulator,
    obv: ObvAccumulator,
    last_emitted_end: Option<DateTime<Utc>>,
}

impl TickerWindow {
    fn merge_one(&mut self, c: &Candle) {
        let ts = c.ticker_timestamp;
        self.day_change.merge(&DayChangeAccumulator::from_row((ts, c.close)));
        self.macd.merge(&MacdAccumulator::from_row((ts, c.close)));
        self.rsi.merge(&RsiAccumulator::from_row((ts, c.close)));
        self.sma20.merge(&Sma20Accumulator::from_row((ts, c.close)));
        self.sma50.merge(&Sma50Accumulator::from_row((ts, c.close)));
        self.std20.merge(&Std20Accumulator::from_row((ts, c.close)));
        self.bollinger.merge(&BollingerBand20Accumulator::from_row((ts, c.close)));
        self.vwap.merge(&VwapAccumulator::from_row((ts, c.high, c.low, c.close, c.volume)));
        self.atr14.merge(&Atr14Accumulator::from_row((ts, c.high, c.low, c.close)));
        self.cmo.merge(&CmoAccumulator::from_row((ts, c.close)));
        self.crsi.merge(&CrsiAccumulator::from_row((ts, c.close)));
        self.klinger
            .merge(&KlingerAccumulator::from_row((ts, c.high, c.low, c.close, c.volume)));
        self.keltner.merge(&KeltnerMidAccumulator::from_row((ts, c.close)));
        self.adl.merge(&AdlAccumulator::from_row((ts, c.high, c.low, c.close, c.volume)));
        self.obv.merge(&ObvAccumulator::from_row((ts, c.close, c.volume)));
    }

    fn retract_one(&mut self, c: &Candle) {
        let ts = c.ticker_timestamp;
        self.day_change.retract(&DayChangeAccumulator::from_row((ts, c.close)));
        self.macd.retract(&MacdAccumulator::from_row((ts, c.close)));
        self.rsi.retract(&RsiAccumulator::from_row((ts, c.close)));
        self.sma20.retract(&Sma20Accumulator::from_row((ts, c.close)));
        self.sma50.retract(&Sma50Accumulator::from_row((ts, c.close)));
        self.std20.retract(&Std20Accumulator::from_row((ts, c.close)));
        self.bollinger.retract(&BollingerBand20Accumulator::from_row((ts, c.close)));
        self.vwap.retract(&VwapAccumulator::from_row((ts, c.high, c.low, c.close, c.volume)));
        self.atr14.retract(&Atr14Accumulator::from_row((ts, c.high, c.low, c.close)));
        self.cmo.retract(&CmoAccumulator::from_row((ts, c.close)));
        self.crsi.retract(&CrsiAccumulator::from_row((ts, c.close)));
        self.klinger
            .retract(&KlingerAccumulator::from_row((ts, c.high, c.low, c.close, c.volume)));
        self.keltner.retract(&KeltnerMidAccumulator::from_row((ts, c.close)));
        self.adl.retract(&AdlAccumulator::from_row((ts, c.high, c.low, c.close, c.volume)));
        self.obv.retract(&ObvAccumulator::from_row((ts, c.close, c.volume)));
    }

    fn admit(&mut self, candle: Candle) {
        self.merge_one(&candle);
        self.candles.push(candle);
        self.candles.sort_by_key(|c| c.ticker_timestamp);

        let horizon = candle.ticker_timestamp - Duration::minutes(WINDOW_DURATION_MINUTES);
        while let Some(oldest) = self.candles.first().copied() {
            if oldest.ticker_timestamp < horizon {
                self.retract_one(&oldest);
                self.candles.remove(0);
            } else {
                break;
            }
        }
    }

    fn snapshot(&self, ticker: &str, window_end: DateTime<Utc>) -> Option<IndicatorSnapshot> {
        let last = self.candles.last().copied()?;
        let min_low = self.candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let max_high = self.candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);

        let (macd, macd_signal, macd_hist) = self.macd.compute();
        let (bb_low, bb_high) = self.bollinger.compute();
        let (klinger, klinger_signal, klinger_hist) = self.klinger.compute();
        let keltner_ema = self.keltner.compute();
        let atr = self.atr14.compute();
        let (keltner_mid, keltner_high, keltner_low) = crate::indicators::keltner_bands(keltner_ema, atr, 2.0);
        let (day_change_abs, day_change_pct) = self.day_change.compute();

        Some(IndicatorSnapshot {
            ticker: ticker.to_string(),
            close: last.close,
            open: last.open,
            volume: last.volume,
            high: last.high,
            low: last.low,
            macd,
            macd_signal,
            macd_hist,
            rsi: self.rsi.compute(),
            adl: self.adl.compute(),
            obv: self.obv.compute(),
            sma20: self.sma20.compute(),
            sma50: self.sma50.compute(),
            std20: self.std20.compute(),
            bb_low,
            bb_high,
            vwap: self.vwap.compute(),
            atr14: atr,
            cmo: self.cmo.compute(),
            crsi: self.crsi.compute(),
            klinger,
            klinger_signal,
            klinger_trend: klinger_hist,
            keltner_mid,
            keltner_low,
            keltner_high,
            day_change_abs,
            day_change_pct,
            window_min_low: min_low,
            window_max_high: max_high,
            window_end,
        })
    }
}

/// Durable form of one ticker's window: the raw candles still inside the
/// horizon plus the emission high-water mark. Every accumulator is cheap to
/// rebuild by replaying `candles`, so that's all a snapshot needs to carry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickerWindowState {
    pub candles: Vec<Candle>,
    pub last_emitted_end: Option<DateTime<Utc>>,
}

/// Hosts one sliding window per ticker and emits at most one snapshot per
/// hop boundary crossed.
#[derive(Default)]
pub struct WindowedSeries {
    tickers: HashMap<String, TickerWindow>,
}

fn floor_to_hop(ts: DateTime<Utc>) -> DateTime<Utc> {
    let epoch = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
    let elapsed = ts.signed_duration_since(epoch).num_minutes();
    let bucket = (elapsed / WINDOW_HOP_MINUTES) * WINDOW_HOP_MINUTES;
    epoch + Duration::minutes(bucket)
}

impl WindowedSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits one candle for `ticker`. Returns a snapshot exactly when this
    /// candle's timestamp crosses into a new hop bucket for that ticker;
    /// candles older than the current window horizon are dropped as late
    /// data (their ticker's window has already moved past them).
    pub fn admit(&mut self, ticker: &str, candle: Candle) -> Option<IndicatorSnapshot> {
        if !is_plausible(candle.ticker_timestamp) {
            warn!(ticker, ts = %candle.ticker_timestamp, "dropping candle with implausible timestamp");
            return None;
        }

        let window = self.tickers.entry(ticker.to_string()).or_default();

        if let Some(oldest) = window.candles.first() {
            let horizon = candle.ticker_timestamp - Duration::minutes(WINDOW_DURATION_MINUTES);
            if candle.ticker_timestamp < oldest.ticker_timestamp && candle.ticker_timestamp < horizon {
                return None;
            }
        }

        let bucket = floor_to_hop(candle.ticker_timestamp);
        window.admit(candle);

        let already_emitted = window.last_emitted_end.is_some_and(|high_water_mark| bucket <= high_water_mark);
        if !already_emitted {
            window.last_emitted_end = Some(bucket);
            window.snapshot(ticker, bucket)
        } else {
            None
        }
    }

    /// Exports every ticker's raw candle backlog and emission high-water
    /// mark, for durable snapshotting.
    pub fn export_state(&self) -> HashMap<String, TickerWindowState> {
        self.tickers
            .iter()
            .map(|(ticker, window)| {
                (
                    ticker.clone(),
                    TickerWindowState { candles: window.candles.clone(), last_emitted_end: window.last_emitted_end },
                )
            })
            .collect()
    }

    /// Rebuilds every accumulator by replaying each ticker's saved candles
    /// in order, then restores the emission high-water mark so recovered
    /// state doesn't re-emit a bucket already published before the restart.
    pub fn restore_state(&mut self, state: HashMap<String, TickerWindowState>) {
        for (ticker, saved) in state {
            let window = self.tickers.entry(ticker).or_default();
            for candle in saved.candles {
                window.admit(candle);
            }
            window.last_emitted_end = saved.last_emitted_end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(minute: i64, close: f64) -> Candle {
        Candle {
            ticker_timestamp: Utc.timestamp_opt(1_700_000_000 + minute * 60, 0).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn emits_at_most_once_per_hop_bucket() {
        let mut series = WindowedSeries::new();
        let mut first_bucket_emissions = 0;
        for i in 0..WINDOW_HOP_MINUTES {
            if series.admit("TEST", candle(i, 100.0 + i as f64)).is_some() {
                first_bucket_emissions += 1;
            }
        }
        assert_eq!(first_bucket_emissions, 1);
    }

    #[test]
    fn implausible_timestamp_is_dropped() {
        let mut series = WindowedSeries::new();
        let bad = Candle {
            ticker_timestamp: Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
        };
        assert!(series.admit("TEST", bad).is_none());
    }

    #[test]
    fn late_candle_into_an_already_emitted_bucket_does_not_re_emit() {
        let mut series = WindowedSeries::new();
        assert!(series.admit("TEST", candle(0, 100.0)).is_some());
        assert!(series.admit("TEST", candle(WINDOW_HOP_MINUTES, 101.0)).is_some());

        let late = series.admit("TEST", candle(2, 99.0));
        assert!(late.is_none(), "bucket already at or below the high-water mark must not re-emit");
    }

    #[test]
    fn old_candles_are_evicted_from_the_window() {
        let mut series = WindowedSeries::new();
        series.admit("TEST", candle(0, 100.0));
        let far_future = WINDOW_DURATION_MINUTES + WINDOW_HOP_MINUTES * 2;
        let snapshot = series.admit("TEST", candle(far_future, 200.0));
        let snapshot = snapshot.expect("hop boundary crossed, snapshot expected");
        assert_eq!(snapshot.close, 200.0);
    }

    #[test]
    fn exported_state_restores_into_an_equivalent_window() {
        let mut series = WindowedSeries::new();
        series.admit("TEST", candle(0, 100.0));
        series.admit("TEST", candle(WINDOW_HOP_MINUTES, 101.0));

        let exported = series.export_state();

        let mut restored = WindowedSeries::new();
        restored.restore_state(exported);

        let before = series.tickers.get("TEST").unwrap().snapshot("TEST", Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let after = restored.tickers.get("TEST").unwrap().snapshot("TEST", Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        assert_eq!(before.unwrap().sma20, after.unwrap().sma20);

        // A bucket already emitted before the restart must not re-emit.
        let late = restored.admit("TEST", candle(2, 99.0));
        assert!(late.is_none());
    }
}
