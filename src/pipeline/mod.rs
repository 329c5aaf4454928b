pub mod runtime;

pub use runtime::{BrokerPoll, CandleSubject, CsvReplaySubject, LiveBrokerSubject, PipelineRuntime, Sink};
