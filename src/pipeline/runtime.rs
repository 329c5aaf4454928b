//! Streaming dataflow runtime: typed input subjects (CSV replay or live
//! broker polling), windowed reduction, filesystem snapshots, sink fan-out.
//! Grounded on `spec.md` §4.8 and the teacher's `strategy/mod.rs` control
//! loop shape (poll → decide → act).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::domain::{Candle, IndicatorSnapshot, TradeSignal};
use crate::indicators::signal::SignalGenerator;
use crate::indicators::window::{TickerWindowState, WindowedSeries};
use crate::store::MongoStore;

const SNAPSHOT_INTERVAL_SECS: u64 = 60;
const TRADING_START: (u32, u32) = (9, 0);
const TRADING_END: (u32, u32) = (15, 45);
const OUTSIDE_HOURS_SLEEP_SECS: u64 = 60;

/// A source of candles for one ticker. Implemented by CSV replay
/// (backtest) and live broker polling.
#[async_trait]
pub trait CandleSubject: Send + Sync {
    async fn next(&mut self) -> Option<Candle>;
}

/// Reads candles row-by-row from a CSV file, oldest first.
pub struct CsvReplaySubject {
    reader: csv::Reader<std::fs::File>,
}

impl CsvReplaySubject {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(Self { reader: csv::Reader::from_path(path)? })
    }
}

#[async_trait]
impl CandleSubject for CsvReplaySubject {
    async fn next(&mut self) -> Option<Candle> {
        let mut record = csv::StringRecord::new();
        match self.reader.read_record(&mut record) {
            Ok(true) => record.deserialize(None).ok(),
            _ => None,
        }
    }
}

/// Polls a live broker API for the next candle. No concrete broker client
/// ships with this crate (out of scope); callers supply their own.
#[async_trait]
pub trait BrokerPoll: Send + Sync {
    async fn poll_latest(&self, ticker: &str) -> anyhow::Result<Option<Candle>>;
}

pub struct LiveBrokerSubject {
    ticker: String,
    broker: Arc<dyn BrokerPoll>,
}

impl LiveBrokerSubject {
    pub fn new(ticker: impl Into<String>, broker: Arc<dyn BrokerPoll>) -> Self {
        Self { ticker: ticker.into(), broker }
    }
}

fn within_trading_hours(now: chrono::DateTime<Local>) -> bool {
    if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    let start = NaiveTime::from_hms_opt(TRADING_START.0, TRADING_START.1, 0).unwrap();
    let end = NaiveTime::from_hms_opt(TRADING_END.0, TRADING_END.1, 0).unwrap();
    let t = now.time();
    t >= start && t <= end
}

#[async_trait]
impl CandleSubject for LiveBrokerSubject {
    async fn next(&mut self) -> Option<Candle> {
        loop {
            if !within_trading_hours(Local::now()) {
                tokio::time::sleep(std::time::Duration::from_secs(OUTSIDE_HOURS_SLEEP_SECS)).await;
                continue;
            }
            match self.broker.poll_latest(&self.ticker).await {
                Ok(Some(candle)) => return Some(candle),
                Ok(None) => {
                    tokio::time::sleep(std::time::Duration::from_secs(OUTSIDE_HOURS_SLEEP_SECS)).await;
                }
                Err(e) => {
                    warn!(ticker = %self.ticker, error = %e, "broker poll failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_secs(OUTSIDE_HOURS_SLEEP_SECS)).await;
                }
            }
        }
    }
}

/// A durable fan-out target for emitted signals/snapshots.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn write_signal(&self, signal: &TradeSignal) -> anyhow::Result<()>;
}

pub struct MongoSink {
    store: Arc<MongoStore>,
}

impl MongoSink {
    pub fn new(store: Arc<MongoStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Sink for MongoSink {
    async fn write_signal(&self, signal: &TradeSignal) -> anyhow::Result<()> {
        self.store
            .upsert_one(
                crate::store::mongo::INDICATORS,
                mongodb::bson::doc! { "ticker": &signal.ticker, "date": &signal.date },
                signal,
            )
            .await
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct RuntimeSnapshot {
    windows: std::collections::HashMap<String, TickerWindowState>,
}

/// Drives one `CandleSubject` through the `WindowedSeries` reducer, emitting
/// a `TradeSignal` to every configured sink on each window close, and
/// persisting a recovery snapshot every `SNAPSHOT_INTERVAL_SECS`.
pub struct PipelineRuntime {
    series: Mutex<WindowedSeries>,
    signal_generator: SignalGenerator,
    sinks: Vec<Arc<dyn Sink>>,
    snapshot_dir: PathBuf,
}

impl PipelineRuntime {
    pub fn new(signal_generator: SignalGenerator, sinks: Vec<Arc<dyn Sink>>, snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            series: Mutex::new(WindowedSeries::new()),
            signal_generator,
            sinks,
            snapshot_dir: snapshot_dir.into(),
        }
    }

    /// Restores warm state on startup by replaying every ticker's saved
    /// candle backlog back through a fresh `WindowedSeries`. A corrupted
    /// snapshot (unreadable or fails to deserialize) is treated as absent:
    /// state is wiped and the runtime rebuilds from the live/backtest
    /// source instead of failing.
    pub async fn recover(&self) {
        let path = self.snapshot_dir.join("runtime_state.bin");
        match std::fs::read(&path) {
            Ok(bytes) => match bincode::deserialize::<RuntimeSnapshot>(&bytes) {
                Ok(snapshot) => {
                    let ticker_count = snapshot.windows.len();
                    self.series.lock().await.restore_state(snapshot.windows);
                    info!(tickers = ticker_count, "recovered pipeline snapshot");
                }
                Err(e) => {
                    warn!(error = %e, "snapshot corrupted, wiping and rebuilding from source");
                    let _ = std::fs::remove_file(&path);
                }
            },
            Err(_) => debug!("no prior snapshot found, starting cold"),
        }
    }

    async fn persist_snapshot(&self) {
        let windows = self.series.lock().await.export_state();
        let snapshot = RuntimeSnapshot { windows };
        let Ok(bytes) = bincode::serialize(&snapshot) else { return };
        if let Err(e) = std::fs::create_dir_all(&self.snapshot_dir) {
            warn!(error = %e, "failed to create snapshot directory");
            return;
        }
        if let Err(e) = std::fs::write(self.snapshot_dir.join("runtime_state.bin"), bytes) {
            warn!(error = %e, "failed to persist pipeline snapshot");
        }
    }

    /// Drains `subject` until exhausted (backtest) or indefinitely (live),
    /// emitting a window snapshot/signal to every sink whenever the window
    /// closes, and snapshotting state on a fixed timer.
    pub async fn run(&self, ticker: &str, mut subject: Box<dyn CandleSubject>) {
        let mut last_snapshot = tokio::time::Instant::now();

        while let Some(candle) = subject.next().await {
            let emitted = {
                let mut series = self.series.lock().await;
                series.admit(ticker, candle)
            };

            if let Some(snapshot) = emitted {
                self.dispatch(snapshot).await;
            }

            if last_snapshot.elapsed() >= std::time::Duration::from_secs(SNAPSHOT_INTERVAL_SECS) {
                self.persist_snapshot().await;
                last_snapshot = tokio::time::Instant::now();
            }
        }
    }

    async fn dispatch(&self, snapshot: IndicatorSnapshot) {
        let signal = self.signal_generator.generate(&snapshot, &[]);
        for sink in &self.sinks {
            if let Err(e) = sink.write_signal(&signal).await {
                error!(ticker = %signal.ticker, error = %e, "sink write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn trading_hours_exclude_weekends() {
        let saturday = Local.with_ymd_and_hms(2026, 7, 25, 10, 0, 0).unwrap();
        assert!(!within_trading_hours(saturday));
    }

    #[tokio::test]
    async fn persisted_snapshot_survives_recovery_into_a_fresh_runtime() {
        let dir = std::env::temp_dir().join(format!("marketpulse-snapshot-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let runtime = PipelineRuntime::new(SignalGenerator::new(3, 3), vec![], dir.clone());
        {
            let mut series = runtime.series.lock().await;
            series.admit("TEST", Candle {
                ticker_timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 10.0,
            });
        }
        runtime.persist_snapshot().await;

        let recovered = PipelineRuntime::new(SignalGenerator::new(3, 3), vec![], dir.clone());
        recovered.recover().await;

        let restored_emitted = recovered.series.lock().await.admit(
            "TEST",
            Candle {
                ticker_timestamp: Utc.timestamp_opt(1_700_000_000 + 60, 0).unwrap(),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.5,
                volume: 10.0,
            },
        );
        assert!(restored_emitted.is_none(), "candle within the same hop bucket must not re-emit after recovery");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn trading_hours_window_is_0900_to_1545() {
        let before_open = Local.with_ymd_and_hms(2026, 7, 27, 8, 59, 0).unwrap();
        let mid_day = Local.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap();
        let after_close = Local.with_ymd_and_hms(2026, 7, 27, 15, 46, 0).unwrap();
        assert!(!within_trading_hours(before_open));
        assert!(within_trading_hours(mid_day));
        assert!(!within_trading_hours(after_close));
    }
}
