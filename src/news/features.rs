//! Feature extraction: liquidity impact, critical event detection, decision
//! tags. Transliterated from the Python `features.py` module.

use crate::domain::{ArticleFeatures, SentimentLabel, SentimentResult};

struct CriticalEvent {
    key: &'static str,
    keywords: &'static [&'static str],
}

const CRITICAL_EVENTS: &[CriticalEvent] = &[
    CriticalEvent {
        key: "earnings",
        keywords: &["earnings", "quarterly report", "q1", "q2", "q3", "q4", "revenue", "profit"],
    },
    CriticalEvent {
        key: "merger_acquisition",
        keywords: &["merger", "acquisition", "buyout", "takeover", "m&a"],
    },
    CriticalEvent {
        key: "lawsuit",
        keywords: &["lawsuit", "legal action", "sued", "court", "litigation"],
    },
    CriticalEvent {
        key: "product_launch",
        keywords: &["launch", "unveil", "announce", "new product", "release"],
    },
    CriticalEvent {
        key: "executive_change",
        keywords: &["ceo", "cfo", "cto", "resign", "appointed", "steps down", "retire"],
    },
    CriticalEvent {
        key: "regulatory_action",
        keywords: &["sec", "regulation", "regulatory", "compliance", "fine", "penalty"],
    },
    CriticalEvent {
        key: "dividend",
        keywords: &["dividend", "payout", "shareholder return"],
    },
    CriticalEvent {
        key: "stock_split",
        keywords: &["stock split", "share split"],
    },
    CriticalEvent {
        key: "guidance",
        keywords: &["guidance", "outlook", "forecast", "projection"],
    },
    CriticalEvent {
        key: "rating_change",
        keywords: &["upgrade", "downgrade", "rating", "analyst"],
    },
    CriticalEvent {
        key: "partnership",
        keywords: &["partnership", "collaboration", "joint venture", "alliance"],
    },
    CriticalEvent {
        key: "restructuring",
        keywords: &["restructuring", "layoff", "cost cutting", "reorganization"],
    },
];

pub fn calculate_liquidity_impact(sentiment: &SentimentResult) -> String {
    match sentiment.label {
        SentimentLabel::Positive => {
            if sentiment.score > 0.8 {
                "HIGH_POSITIVE"
            } else {
                "MODERATE_POSITIVE"
            }
        }
        SentimentLabel::Negative => {
            if sentiment.score > 0.8 {
                "HIGH_NEGATIVE"
            } else {
                "MODERATE_NEGATIVE"
            }
        }
        SentimentLabel::Neutral => "NEUTRAL",
    }
    .to_string()
}

pub fn detect_critical_events(title: &str, content: &str) -> Vec<String> {
    let text = format!("{title} {content}").to_lowercase();
    CRITICAL_EVENTS
        .iter()
        .filter(|event| event.keywords.iter().any(|kw| text.contains(kw)))
        .map(|event| event.key.to_string())
        .collect()
}

pub fn generate_decisions(
    sentiment: &SentimentResult,
    liquidity_impact: &str,
    critical_events: &[String],
    factor_type: &str,
) -> Vec<String> {
    let mut decisions = Vec::new();

    match sentiment.label {
        SentimentLabel::Positive if sentiment.score > 0.7 => decisions.push("CONSIDER_BUY".to_string()),
        SentimentLabel::Negative if sentiment.score > 0.7 => decisions.push("CONSIDER_SELL".to_string()),
        _ => decisions.push("HOLD_MONITOR".to_string()),
    }

    if liquidity_impact.contains("HIGH") {
        decisions.push("HIGH_VOLATILITY_EXPECTED".to_string());
    }

    let event_alerts: &[(&str, &str)] = &[
        ("earnings", "EARNINGS_ALERT"),
        ("merger_acquisition", "M&A_ALERT"),
        ("lawsuit", "RISK_ALERT"),
        ("regulatory_action", "REGULATORY_ALERT"),
    ];
    for (event, alert) in event_alerts {
        if critical_events.iter().any(|e| e == event) {
            decisions.push(alert.to_string());
        }
    }

    let factor_signal = match factor_type {
        "political" => Some("POLITICAL_FACTOR"),
        "regulatory" => Some("REGULATORY_FACTOR"),
        "economic" => Some("ECONOMIC_FACTOR"),
        _ => None,
    };
    if let Some(signal) = factor_signal {
        decisions.push(signal.to_string());
    }

    decisions
}

pub fn extract_features(
    title: &str,
    content: &str,
    sentiment: &SentimentResult,
    factor_type: &str,
) -> ArticleFeatures {
    let liquidity_impact = calculate_liquidity_impact(sentiment);
    let critical_events = detect_critical_events(title, content);
    let decisions = generate_decisions(sentiment, &liquidity_impact, &critical_events, factor_type);

    ArticleFeatures {
        liquidity_impact,
        critical_events,
        decisions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Confidence;

    fn sentiment(label: SentimentLabel, score: f64) -> SentimentResult {
        SentimentResult {
            label,
            score,
            confidence: Confidence::High,
            class_scores: [0.0, 0.0, 0.0],
        }
    }

    #[test]
    fn liquidity_impact_thresholds() {
        assert_eq!(
            calculate_liquidity_impact(&sentiment(SentimentLabel::Positive, 0.9)),
            "HIGH_POSITIVE"
        );
        assert_eq!(
            calculate_liquidity_impact(&sentiment(SentimentLabel::Positive, 0.6)),
            "MODERATE_POSITIVE"
        );
        assert_eq!(
            calculate_liquidity_impact(&sentiment(SentimentLabel::Neutral, 0.5)),
            "NEUTRAL"
        );
    }

    #[test]
    fn detects_earnings_and_lawsuit_events() {
        let events = detect_critical_events(
            "Company reports Q2 earnings amid ongoing lawsuit",
            "revenue grew and litigation continues",
        );
        assert!(events.contains(&"earnings".to_string()));
        assert!(events.contains(&"lawsuit".to_string()));
    }

    #[test]
    fn generates_earnings_alert_decision() {
        let s = sentiment(SentimentLabel::Positive, 0.9);
        let decisions = generate_decisions(&s, "HIGH_POSITIVE", &["earnings".to_string()], "economic");
        assert!(decisions.contains(&"CONSIDER_BUY".to_string()));
        assert!(decisions.contains(&"HIGH_VOLATILITY_EXPECTED".to_string()));
        assert!(decisions.contains(&"EARNINGS_ALERT".to_string()));
        assert!(decisions.contains(&"ECONOMIC_FACTOR".to_string()));
    }
}
