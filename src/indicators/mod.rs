//! Sliding-window technical indicator accumulators.
//!
//! Each accumulator mirrors the `pw.BaseCustomAccumulator` shape used by the
//! Python windowed-reduce pipeline: `from_row` builds a singleton from one
//! candle, `merge`/`retract` fold another accumulator's state in or out as
//! the window slides, and `compute` derives the indicator value from
//! whatever state remains. Transliterated from
//! `pathway_indicators/accumulators.py`.
//!
//! Retraction mirrors Python's `deque.remove(value)`: the first element
//! equal to the retracted value is dropped; a value with no match is
//! ignored. Unlike the Python source, every accumulator here sorts its
//! buffered points by timestamp before computing rather than trusting
//! insertion order, since nothing upstream guarantees arrival order once
//! candles cross async task boundaries.

pub mod signal;
pub mod window;

use chrono::{DateTime, Utc};

pub type Ts = DateTime<Utc>;

/// Shared accumulator contract: build from one row, fold another
/// accumulator's state in (`merge`) or out (`retract`), derive the output.
pub trait Accumulator: Clone {
    type Row;
    type Output;

    fn from_row(row: Self::Row) -> Self;
    fn merge(&mut self, other: &Self);
    fn retract(&mut self, other: &Self);
    fn compute(&self) -> Self::Output;
}

/// Appends `other`'s points, matching `deque.extend`.
fn extend_points<T: Clone>(points: &mut Vec<T>, other: &[T]) {
    points.extend_from_slice(other);
}

/// Removes the first occurrence of each of `other`'s points, matching
/// `deque.remove(value)` tolerating absence.
fn retract_points<T: Clone + PartialEq>(points: &mut Vec<T>, other: &[T]) {
    for val in other {
        if let Some(pos) = points.iter().position(|p| p == val) {
            points.remove(pos);
        }
    }
}

fn sorted_by_ts<T: Clone>(points: &[(Ts, T)]) -> Vec<T> {
    let mut indexed: Vec<&(Ts, T)> = points.iter().collect();
    indexed.sort_by_key(|(ts, _)| *ts);
    indexed.into_iter().map(|(_, v)| v.clone()).collect()
}

fn ema_stream(prices: &[f64], span: f64) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }
    let alpha = 2.0 / (span + 1.0);
    let mut out = Vec::with_capacity(prices.len());
    let mut ema = prices[0];
    out.push(ema);
    for &price in &prices[1..] {
        ema = price * alpha + ema * (1.0 - alpha);
        out.push(ema);
    }
    out
}

/// Wilder-smoothed RSI over `period`, matching `RSIAccumulator.compute_result`
/// and the generic `_rsi_series` helper (same recurrence, parametrized
/// period).
fn rsi_series(prices: &[f64], period: usize) -> f64 {
    if prices.len() < 2 {
        return 50.0;
    }
    let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    if deltas.is_empty() || deltas.len() < period {
        // mirrors dividing by `period` regardless of how many deltas exist
    }
    let head = &deltas[..deltas.len().min(period)];
    let mut avg_gain = head.iter().map(|d| d.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = head.iter().map(|d| (-d).max(0.0)).sum::<f64>() / period as f64;

    for &d in &deltas[period.min(deltas.len())..] {
        avg_gain = (avg_gain * (period - 1) as f64 + d.max(0.0)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + (-d).max(0.0)) / period as f64;
    }

    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

// ---------------------------------------------------------------------
// Day change
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct DayChangeAccumulator {
    points: Vec<(Ts, f64)>,
}

impl Accumulator for DayChangeAccumulator {
    type Row = (Ts, f64);
    type Output = (f64, f64);

    fn from_row(row: Self::Row) -> Self {
        Self { points: vec![row] }
    }

    fn merge(&mut self, other: &Self) {
        extend_points(&mut self.points, &other.points);
    }

    fn retract(&mut self, other: &Self) {
        retract_points(&mut self.points, &other.points);
    }

    fn compute(&self) -> Self::Output {
        if self.points.is_empty() {
            return (0.0, 0.0);
        }
        let mut sorted = self.points.clone();
        sorted.sort_by_key(|(ts, _)| *ts);

        let (latest_date, latest_price) = *sorted.last().unwrap();
        let current_day = latest_date.date_naive();

        let day_start_price = sorted
            .iter()
            .find(|(ts, _)| ts.date_naive() == current_day)
            .map(|(_, price)| *price);

        match day_start_price {
            Some(price) if price != 0.0 => {
                let abs_change = latest_price - price;
                let pct_change = (abs_change / price) * 100.0;
                ((abs_change * 100.0).round() / 100.0, (pct_change * 100.0).round() / 100.0)
            }
            _ => (0.0, 0.0),
        }
    }
}

// ---------------------------------------------------------------------
// MACD
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MacdAccumulator {
    points: Vec<(Ts, f64)>,
}

impl Accumulator for MacdAccumulator {
    type Row = (Ts, f64);
    type Output = (f64, f64, f64);

    fn from_row(row: Self::Row) -> Self {
        Self { points: vec![row] }
    }

    fn merge(&mut self, other: &Self) {
        extend_points(&mut self.points, &other.points);
    }

    fn retract(&mut self, other: &Self) {
        retract_points(&mut self.points, &other.points);
    }

    fn compute(&self) -> Self::Output {
        let prices = sorted_by_ts(&self.points);
        if prices.is_empty() {
            return (0.0, 0.0, 0.0);
        }
        let ema12 = ema_stream(&prices, 12.0);
        let ema26 = ema_stream(&prices, 26.0);
        if ema12.is_empty() || ema26.is_empty() {
            return (0.0, 0.0, 0.0);
        }
        let macd_list: Vec<f64> = ema12.iter().zip(ema26.iter()).map(|(a, b)| a - b).collect();
        let ema9 = ema_stream(&macd_list, 9.0);
        let m = *macd_list.last().unwrap_or(&0.0);
        let s = *ema9.last().unwrap_or(&0.0);
        (m, s, m - s)
    }
}

// ---------------------------------------------------------------------
// RSI
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RsiAccumulator {
    points: Vec<(Ts, f64)>,
}

impl Accumulator for RsiAccumulator {
    type Row = (Ts, f64);
    type Output = f64;

    fn from_row(row: Self::Row) -> Self {
        Self { points: vec![row] }
    }

    fn merge(&mut self, other: &Self) {
        extend_points(&mut self.points, &other.points);
    }

    fn retract(&mut self, other: &Self) {
        retract_points(&mut self.points, &other.points);
    }

    fn compute(&self) -> Self::Output {
        let prices = sorted_by_ts(&self.points);
        rsi_series(&prices, 14)
    }
}

// ---------------------------------------------------------------------
// Accumulation/Distribution Line
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AdlAccumulator {
    points: Vec<(Ts, f64, f64, f64, f64)>,
}

impl Accumulator for AdlAccumulator {
    type Row = (Ts, f64, f64, f64, f64);
    type Output = f64;

    fn from_row(row: Self::Row) -> Self {
        Self { points: vec![row] }
    }

    fn merge(&mut self, other: &Self) {
        extend_points(&mut self.points, &other.points);
    }

    fn retract(&mut self, other: &Self) {
        retract_points(&mut self.points, &other.points);
    }

    fn compute(&self) -> Self::Output {
        let mut sorted = self.points.clone();
        sorted.sort_by_key(|(ts, ..)| *ts);
        let mut adl = 0.0;
        for (_, h, l, c, v) in sorted {
            let denom = if h != l { h - l } else { 1.0 };
            let mfm = ((c - l) - (h - c)) / denom;
            adl += mfm * v;
        }
        adl
    }
}

// ---------------------------------------------------------------------
// Simple moving averages / std dev / Bollinger
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Sma20Accumulator {
    points: Vec<(Ts, f64)>,
}

impl Accumulator for Sma20Accumulator {
    type Row = (Ts, f64);
    type Output = f64;

    fn from_row(row: Self::Row) -> Self {
        Self { points: vec![row] }
    }

    fn merge(&mut self, other: &Self) {
        extend_points(&mut self.points, &other.points);
    }

    fn retract(&mut self, other: &Self) {
        retract_points(&mut self.points, &other.points);
    }

    fn compute(&self) -> Self::Output {
        let prices = sorted_by_ts(&self.points);
        if prices.len() < 20 {
            return 0.0;
        }
        let tail = &prices[prices.len() - 20..];
        tail.iter().sum::<f64>() / 20.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sma50Accumulator {
    points: Vec<(Ts, f64)>,
}

impl Accumulator for Sma50Accumulator {
    type Row = (Ts, f64);
    type Output = f64;

    fn from_row(row: Self::Row) -> Self {
        Self { points: vec![row] }
    }

    fn merge(&mut self, other: &Self) {
        extend_points(&mut self.points, &other.points);
    }

    fn retract(&mut self, other: &Self) {
        retract_points(&mut self.points, &other.points);
    }

    fn compute(&self) -> Self::Output {
        let prices = sorted_by_ts(&self.points);
        if prices.len() < 50 {
            return 0.0;
        }
        let tail = &prices[prices.len() - 50..];
        tail.iter().sum::<f64>() / 50.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Std20Accumulator {
    points: Vec<(Ts, f64)>,
}

impl Accumulator for Std20Accumulator {
    type Row = (Ts, f64);
    type Output = f64;

    fn from_row(row: Self::Row) -> Self {
        Self { points: vec![row] }
    }

    fn merge(&mut self, other: &Self) {
        extend_points(&mut self.points, &other.points);
    }

    fn retract(&mut self, other: &Self) {
        retract_points(&mut self.points, &other.points);
    }

    fn compute(&self) -> Self::Output {
        let prices = sorted_by_ts(&self.points);
        if prices.len() < 20 {
            return 0.0;
        }
        population_std(&prices[prices.len() - 20..])
    }
}

fn population_std(data: &[f64]) -> f64 {
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    let var = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64;
    var.sqrt()
}

#[derive(Debug, Clone, Default)]
pub struct BollingerBand20Accumulator {
    points: Vec<(Ts, f64)>,
}

impl Accumulator for BollingerBand20Accumulator {
    type Row = (Ts, f64);
    type Output = (f64, f64);

    fn from_row(row: Self::Row) -> Self {
        Self { points: vec![row] }
    }

    fn merge(&mut self, other: &Self) {
        extend_points(&mut self.points, &other.points);
    }

    fn retract(&mut self, other: &Self) {
        retract_points(&mut self.points, &other.points);
    }

    fn compute(&self) -> Self::Output {
        let prices = sorted_by_ts(&self.points);
        if prices.len() < 20 {
            return (0.0, 0.0);
        }
        let tail = &prices[prices.len() - 20..];
        let mean = tail.iter().sum::<f64>() / 20.0;
        let std = population_std(tail);
        (mean - 2.0 * std, mean + 2.0 * std)
    }
}

// ---------------------------------------------------------------------
// VWAP
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct VwapAccumulator {
    points: Vec<(Ts, f64, f64, f64, f64)>,
}

impl Accumulator for VwapAccumulator {
    type Row = (Ts, f64, f64, f64, f64);
    type Output = f64;

    fn from_row(row: Self::Row) -> Self {
        Self { points: vec![row] }
    }

    fn merge(&mut self, other: &Self) {
        extend_points(&mut self.points, &other.points);
    }

    fn retract(&mut self, other: &Self) {
        retract_points(&mut self.points, &other.points);
    }

    fn compute(&self) -> Self::Output {
        let mut pv = 0.0;
        let mut v_sum = 0.0;
        for (_, h, l, c, v) in &self.points {
            pv += ((h + l + c) / 3.0) * v;
            v_sum += v;
        }
        if v_sum != 0.0 {
            pv / v_sum
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------
// ATR14
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Atr14Accumulator {
    points: Vec<(Ts, f64, f64, f64)>,
}

impl Accumulator for Atr14Accumulator {
    type Row = (Ts, f64, f64, f64);
    type Output = f64;

    fn from_row(row: Self::Row) -> Self {
        Self { points: vec![row] }
    }

    fn merge(&mut self, other: &Self) {
        extend_points(&mut self.points, &other.points);
    }

    fn retract(&mut self, other: &Self) {
        retract_points(&mut self.points, &other.points);
    }

    fn compute(&self) -> Self::Output {
        if self.points.len() < 2 {
            return 0.0;
        }
        let mut sorted = self.points.clone();
        sorted.sort_by_key(|(ts, ..)| *ts);

        let mut trs = Vec::with_capacity(sorted.len());
        let mut prev_c: Option<f64> = None;
        for (_, h, l, c) in sorted {
            let tr = match prev_c {
                None => h - l,
                Some(pc) => (h - l).max((h - pc).abs()).max((l - pc).abs()),
            };
            trs.push(tr);
            prev_c = Some(c);
        }
        if trs.is_empty() {
            return 0.0;
        }
        if trs.len() >= 14 {
            trs[trs.len() - 14..].iter().sum::<f64>() / 14.0
        } else {
            trs.iter().sum::<f64>() / trs.len() as f64
        }
    }
}

// ---------------------------------------------------------------------
// On-Balance Volume
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ObvAccumulator {
    points: Vec<(Ts, f64, f64)>,
}

impl Accumulator for ObvAccumulator {
    type Row = (Ts, f64, f64);
    type Output = f64;

    fn from_row(row: Self::Row) -> Self {
        Self { points: vec![row] }
    }

    fn merge(&mut self, other: &Self) {
        extend_points(&mut self.points, &other.points);
    }

    fn retract(&mut self, other: &Self) {
        retract_points(&mut self.points, &other.points);
    }

    fn compute(&self) -> Self::Output {
        let mut sorted = self.points.clone();
        sorted.sort_by_key(|(ts, ..)| *ts);
        let mut obv = 0.0;
        let mut prev_c: Option<f64> = None;
        for (_, c, v) in sorted {
            if let Some(pc) = prev_c {
                if c > pc {
                    obv += v;
                } else if c < pc {
                    obv -= v;
                }
            }
            prev_c = Some(c);
        }
        obv
    }
}

// ---------------------------------------------------------------------
// Chande Momentum Oscillator
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CmoAccumulator {
    points: Vec<(Ts, f64)>,
}

impl Accumulator for CmoAccumulator {
    type Row = (Ts, f64);
    type Output = f64;

    fn from_row(row: Self::Row) -> Self {
        Self { points: vec![row] }
    }

    fn merge(&mut self, other: &Self) {
        extend_points(&mut self.points, &other.points);
    }

    fn retract(&mut self, other: &Self) {
        retract_points(&mut self.points, &other.points);
    }

    fn compute(&self) -> Self::Output {
        let prices = sorted_by_ts(&self.points);
        if prices.len() < 2 {
            return 0.0;
        }
        let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
        let relevant = &deltas[deltas.len().saturating_sub(14)..];
        let up: f64 = relevant.iter().filter(|d| **d > 0.0).sum();
        let down: f64 = relevant.iter().filter(|d| **d < 0.0).map(|d| -d).sum();
        let denom = up + down;
        if denom != 0.0 {
            100.0 * (up - down) / denom
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------
// Composite RSI
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CrsiAccumulator {
    points: Vec<(Ts, f64)>,
}

impl Accumulator for CrsiAccumulator {
    type Row = (Ts, f64);
    type Output = f64;

    fn from_row(row: Self::Row) -> Self {
        Self { points: vec![row] }
    }

    fn merge(&mut self, other: &Self) {
        extend_points(&mut self.points, &other.points);
    }

    fn retract(&mut self, other: &Self) {
        retract_points(&mut self.points, &other.points);
    }

    fn compute(&self) -> Self::Output {
        let closes = sorted_by_ts(&self.points);
        let n = closes.len();
        if n < 3 {
            return 50.0;
        }
        let rsi3 = rsi_series(&closes, 3);

        let mut streaks = vec![0i64; n];
        for i in 1..n {
            if closes[i] > closes[i - 1] {
                streaks[i] = (streaks[i - 1] + 1).max(1);
            } else if closes[i] < closes[i - 1] {
                streaks[i] = (streaks[i - 1] - 1).min(-1);
            }
        }
        let streak_floats: Vec<f64> = streaks.iter().map(|s| *s as f64).collect();
        let rsi_streak = rsi_series(&streak_floats, 2);

        let roc = if closes[n - 2] != 0.0 {
            (closes[n - 1] - closes[n - 2]) / closes[n - 2] * 100.0
        } else {
            0.0
        };

        let start = n.saturating_sub(100).max(1);
        let window: Vec<f64> = (start..n)
            .filter(|&i| closes[i - 1] != 0.0)
            .map(|i| (closes[i] - closes[i - 1]) / closes[i - 1] * 100.0)
            .collect();

        let rank = if !window.is_empty() {
            window.iter().filter(|x| **x < roc).count() as f64 / window.len() as f64 * 100.0
        } else {
            50.0
        };

        (rsi3 + rsi_streak + rank) / 3.0
    }
}

// ---------------------------------------------------------------------
// Klinger Volume Oscillator
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct KlingerAccumulator {
    points: Vec<(Ts, f64, f64, f64, f64)>,
}

impl Accumulator for KlingerAccumulator {
    type Row = (Ts, f64, f64, f64, f64);
    type Output = (f64, f64, f64);

    fn from_row(row: Self::Row) -> Self {
        Self { points: vec![row] }
    }

    fn merge(&mut self, other: &Self) {
        extend_points(&mut self.points, &other.points);
    }

    fn retract(&mut self, other: &Self) {
        retract_points(&mut self.points, &other.points);
    }

    fn compute(&self) -> Self::Output {
        if self.points.len() < 3 {
            return (0.0, 0.0, 0.0);
        }
        let mut sorted = self.points.clone();
        sorted.sort_by_key(|(ts, ..)| *ts);

        let mut vf = Vec::with_capacity(sorted.len());
        let mut prev: Option<(f64, f64, f64)> = None;
        for (_, h, l, c, v) in sorted {
            if let Some((ph, pl, pc)) = prev {
                let dm = (h + l + c) - (ph + pl + pc);
                // flat volume force trends up, matching the Python tie-break
                let trend = if dm > 0.0 {
                    1.0
                } else if dm < 0.0 {
                    -1.0
                } else {
                    1.0
                };
                vf.push(trend * v);
            }
            prev = Some((h, l, c));
        }
        if vf.is_empty() {
            return (0.0, 0.0, 0.0);
        }

        let e34 = ema_stream(&vf, 34.0);
        let e55 = ema_stream(&vf, 55.0);
        let min_len = e34.len().min(e55.len());
        let ko: Vec<f64> = (0..min_len)
            .map(|i| e34[i + e34.len() - min_len] - e55[i + e55.len() - min_len])
            .collect();
        let sig = ema_stream(&ko, 13.0);
        let k = *ko.last().unwrap_or(&0.0);
        let s = *sig.last().unwrap_or(&0.0);
        (k, s, k - s)
    }
}

// ---------------------------------------------------------------------
// Keltner midline
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct KeltnerMidAccumulator {
    points: Vec<(Ts, f64)>,
}

impl Accumulator for KeltnerMidAccumulator {
    type Row = (Ts, f64);
    type Output = f64;

    fn from_row(row: Self::Row) -> Self {
        Self { points: vec![row] }
    }

    fn merge(&mut self, other: &Self) {
        extend_points(&mut self.points, &other.points);
    }

    fn retract(&mut self, other: &Self) {
        retract_points(&mut self.points, &other.points);
    }

    fn compute(&self) -> Self::Output {
        let closes = sorted_by_ts(&self.points);
        if closes.is_empty() {
            return 0.0;
        }
        let alpha = 2.0 / 21.0;
        let mut ema = closes[0];
        for &c in &closes[1..] {
            ema = c * alpha + ema * (1.0 - alpha);
        }
        ema
    }
}

/// Builds the (mid, upper, lower) Keltner triple from a midline and ATR,
/// matching `build_keltner_tuple`.
pub fn keltner_bands(mid: f64, atr: f64, mult: f64) -> (f64, f64, f64) {
    (mid, mid + mult * atr, mid - mult * atr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(i: i64) -> Ts {
        Utc.timestamp_opt(1_700_000_000 + i * 60, 0).unwrap()
    }

    #[test]
    fn rsi_below_two_points_is_neutral() {
        assert_eq!(rsi_series(&[100.0], 14), 50.0);
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi_series(&prices, 14), 100.0);
    }

    #[test]
    fn sma20_below_twenty_points_is_zero() {
        let mut acc = Sma20Accumulator::default();
        for i in 0..10 {
            acc.merge(&Sma20Accumulator::from_row((ts(i), 100.0 + i as f64)));
        }
        assert_eq!(acc.compute(), 0.0);
    }

    #[test]
    fn sma20_averages_last_twenty() {
        let mut acc = Sma20Accumulator::default();
        for i in 0..25 {
            acc.merge(&Sma20Accumulator::from_row((ts(i), 10.0)));
        }
        assert_eq!(acc.compute(), 10.0);
    }

    #[test]
    fn bollinger_zero_variance_collapses_bands_to_mean() {
        let mut acc = BollingerBand20Accumulator::default();
        for i in 0..20 {
            acc.merge(&BollingerBand20Accumulator::from_row((ts(i), 50.0)));
        }
        let (low, high) = acc.compute();
        assert_eq!(low, 50.0);
        assert_eq!(high, 50.0);
    }

    #[test]
    fn atr_degrades_to_mean_of_available_below_fourteen_bars() {
        let mut acc = Atr14Accumulator::default();
        acc.merge(&Atr14Accumulator::from_row((ts(0), 10.0, 8.0, 9.0)));
        acc.merge(&Atr14Accumulator::from_row((ts(1), 11.0, 9.0, 10.0)));
        let atr = acc.compute();
        assert!(atr > 0.0);
    }

    #[test]
    fn klinger_flat_volume_force_trends_positive() {
        let mut acc = KlingerAccumulator::default();
        for i in 0..5 {
            acc.merge(&KlingerAccumulator::from_row((ts(i), 10.0, 10.0, 10.0, 100.0)));
        }
        let (k, _, _) = acc.compute();
        assert!(k >= 0.0);
    }

    #[test]
    fn retract_removes_first_matching_point() {
        let mut acc = Sma20Accumulator::default();
        let a = Sma20Accumulator::from_row((ts(0), 10.0));
        let b = Sma20Accumulator::from_row((ts(1), 20.0));
        acc.merge(&a);
        acc.merge(&b);
        acc.retract(&a);
        assert_eq!(acc.points, vec![(ts(1), 20.0)]);
    }

    #[test]
    fn day_change_uses_first_price_of_current_day() {
        let mut acc = DayChangeAccumulator::default();
        let day_start = Utc.with_ymd_and_hms(2026, 7, 27, 9, 15, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 7, 27, 15, 30, 0).unwrap();
        acc.merge(&DayChangeAccumulator::from_row((day_start, 100.0)));
        acc.merge(&DayChangeAccumulator::from_row((later, 110.0)));
        let (abs_change, pct_change) = acc.compute();
        assert_eq!(abs_change, 10.0);
        assert_eq!(pct_change, 10.0);
    }
}
