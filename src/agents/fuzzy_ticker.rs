//! Ticker resolution: exact noise-stripped match against a local instrument
//! CSV, then fuzzy (Levenshtein) fallback, then an optional remote lookup.
//! Grounded on `supporting_functions/ticker_extraction.py::get_bse_tickers`.

use async_trait::async_trait;
use serde::Deserialize;

const FUZZY_MATCH_THRESHOLD: f64 = 0.90;
const NOISE_WORDS: &[&str] = &["LIMITED", "LTD", "PRIVATE", "PVT", "INDIA", "IND", "THE"];

#[derive(Debug, Clone, Deserialize)]
pub struct Instrument {
    pub tradingsymbol: String,
    pub name: String,
    pub exchange: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchType {
    LocalNameFuzzy,
    LocalTickerFuzzy,
    RemoteBridge,
}

#[derive(Debug, Clone)]
pub struct TickerMatch {
    pub ticker: String,
    pub company_name: String,
    pub match_type: MatchType,
    pub confidence: f64,
}

/// Out-of-scope remote symbol lookup (e.g. a search API), used only when
/// the local instrument file has no fuzzy match above threshold.
#[async_trait]
pub trait RemoteTickerLookup: Send + Sync {
    async fn lookup(&self, company: &str) -> Option<String>;
}

pub struct NoRemoteLookup;

#[async_trait]
impl RemoteTickerLookup for NoRemoteLookup {
    async fn lookup(&self, _company: &str) -> Option<String> {
        None
    }
}

fn clean_company_name(name: &str) -> String {
    let mut cleaned = name.to_uppercase();
    for noise in NOISE_WORDS {
        cleaned = cleaned.replace(noise, "");
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct FuzzyTickerResolver {
    instruments: Vec<Instrument>,
    remote: Box<dyn RemoteTickerLookup>,
}

impl FuzzyTickerResolver {
    pub fn new(instruments: Vec<Instrument>, remote: Box<dyn RemoteTickerLookup>) -> Self {
        Self { instruments, remote }
    }

    pub fn load_csv(path: &str, remote: Box<dyn RemoteTickerLookup>) -> anyhow::Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let instruments = reader.deserialize().collect::<Result<Vec<Instrument>, _>>()?;
        Ok(Self::new(instruments, remote))
    }

    fn best_name_match(&self, query: &str) -> Option<(&Instrument, f64)> {
        self.instruments
            .iter()
            .map(|i| (i, strsim::normalized_levenshtein(query, &i.name.to_uppercase())))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
    }

    fn best_ticker_match(&self, query: &str) -> Option<(&Instrument, f64)> {
        self.instruments
            .iter()
            .map(|i| (i, strsim::normalized_levenshtein(query, &i.tradingsymbol.to_uppercase())))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
    }

    /// Resolves `company` to an exchange ticker. Returns `None` if neither
    /// the local fuzzy match nor the remote lookup clears the threshold.
    pub async fn resolve(&self, company: &str) -> Option<TickerMatch> {
        let query = clean_company_name(company);

        if let Some((instrument, score)) = self.best_name_match(&query) {
            if score >= FUZZY_MATCH_THRESHOLD {
                return Some(TickerMatch {
                    ticker: instrument.tradingsymbol.clone(),
                    company_name: instrument.name.clone(),
                    match_type: MatchType::LocalNameFuzzy,
                    confidence: score,
                });
            }
        }

        if let Some((instrument, score)) = self.best_ticker_match(&query) {
            if score >= FUZZY_MATCH_THRESHOLD {
                return Some(TickerMatch {
                    ticker: instrument.tradingsymbol.clone(),
                    company_name: instrument.name.clone(),
                    match_type: MatchType::LocalTickerFuzzy,
                    confidence: score,
                });
            }
        }

        let remote_symbol = self.remote.lookup(company).await?;
        if let Some(instrument) = self.instruments.iter().find(|i| i.tradingsymbol == remote_symbol) {
            return Some(TickerMatch {
                ticker: instrument.tradingsymbol.clone(),
                company_name: instrument.name.clone(),
                match_type: MatchType::RemoteBridge,
                confidence: 1.0,
            });
        }
        Some(TickerMatch {
            ticker: remote_symbol.clone(),
            company_name: format!("Remote: {remote_symbol}"),
            match_type: MatchType::RemoteBridge,
            confidence: 0.90,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> FuzzyTickerResolver {
        FuzzyTickerResolver::new(
            vec![
                Instrument { tradingsymbol: "RELIANCE".into(), name: "RELIANCE INDUSTRIES LIMITED".into(), exchange: "BSE".into() },
                Instrument { tradingsymbol: "TCS".into(), name: "TATA CONSULTANCY SERVICES LIMITED".into(), exchange: "BSE".into() },
            ],
            Box::new(NoRemoteLookup),
        )
    }

    #[tokio::test]
    async fn resolves_noisy_company_name_via_local_fuzzy_match() {
        let resolver = resolver();
        let result = resolver.resolve("Reliance Industries Ltd").await;
        let result = result.expect("expected a fuzzy match");
        assert_eq!(result.ticker, "RELIANCE");
        assert_eq!(result.match_type, MatchType::LocalNameFuzzy);
    }

    #[tokio::test]
    async fn unmatched_company_with_no_remote_lookup_returns_none() {
        let resolver = resolver();
        let result = resolver.resolve("Completely Unrelated Corp Of Nowhere").await;
        assert!(result.is_none());
    }

    #[test]
    fn clean_company_name_strips_noise_words() {
        assert_eq!(clean_company_name("Reliance Industries Limited"), "RELIANCE INDUSTRIES");
    }
}
