//! Gate between a technical signal and the news/twitter sentiment for the
//! same ticker. No conflict predicate is given verbatim in the source; the
//! default here implements §8 scenario 6 literally and is pluggable so a
//! different predicate can be swapped in without touching `AgentRouter`.

use crate::domain::TradeAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy)]
pub struct SentimentReadings {
    pub news: Option<Sentiment>,
    pub twitter_score: Option<f64>,
}

pub trait ConflictPolicy: Send + Sync {
    /// Returns `Some(reason)` if the technical action conflicts with the
    /// sentiment readings and the router should withhold publication.
    fn conflict(&self, action: TradeAction, sentiment: SentimentReadings) -> Option<String>;
}

/// BUY is blocked by bearish news plus weak (<0.3) twitter sentiment; SELL
/// is blocked by bullish news plus strong (>0.7) twitter sentiment.
pub struct DefaultConflictPolicy;

impl ConflictPolicy for DefaultConflictPolicy {
    fn conflict(&self, action: TradeAction, sentiment: SentimentReadings) -> Option<String> {
        match action {
            TradeAction::Buy => {
                if sentiment.news == Some(Sentiment::Bearish) && sentiment.twitter_score.is_some_and(|s| s < 0.3) {
                    return Some("BUY signal conflicts with bearish news and weak twitter sentiment".to_string());
                }
            }
            TradeAction::Sell => {
                if sentiment.news == Some(Sentiment::Bullish) && sentiment.twitter_score.is_some_and(|s| s > 0.7) {
                    return Some("SELL signal conflicts with bullish news and strong twitter sentiment".to_string());
                }
            }
            TradeAction::Hold => {}
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_blocked_by_bearish_news_and_weak_twitter() {
        let policy = DefaultConflictPolicy;
        let reason = policy.conflict(
            TradeAction::Buy,
            SentimentReadings { news: Some(Sentiment::Bearish), twitter_score: Some(0.2) },
        );
        assert!(reason.is_some());
    }

    #[test]
    fn sell_blocked_by_bullish_news_and_strong_twitter() {
        let policy = DefaultConflictPolicy;
        let reason = policy.conflict(
            TradeAction::Sell,
            SentimentReadings { news: Some(Sentiment::Bullish), twitter_score: Some(0.8) },
        );
        assert!(reason.is_some());
    }

    #[test]
    fn buy_with_neutral_sentiment_is_not_blocked() {
        let policy = DefaultConflictPolicy;
        let reason = policy.conflict(
            TradeAction::Buy,
            SentimentReadings { news: Some(Sentiment::Neutral), twitter_score: Some(0.5) },
        );
        assert!(reason.is_none());
    }

    #[test]
    fn missing_twitter_score_never_blocks() {
        let policy = DefaultConflictPolicy;
        let reason = policy.conflict(TradeAction::Buy, SentimentReadings { news: Some(Sentiment::Bearish), twitter_score: None });
        assert!(reason.is_none());
    }
}
