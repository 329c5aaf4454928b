//! Portfolio read-modify-write service: weighted-average cost basis on BUY,
//! quantity reduction and removal-on-zero on SELL, full
//! market_value/unrealized_pnl/weight/sector_exposures recalculation after
//! every transaction. Transliterated from
//! `create_update_portfolio.py::update_portfolio_with_transaction`.

use std::sync::Arc;

use chrono::Utc;
use mongodb::bson::doc;
use uuid::Uuid;

use crate::domain::{Holding, Portfolio, Transaction, TransactionAction};
use crate::error::PortfolioError;
use crate::store::MongoStore;

/// Metadata supplied for a ticker not already held, mirroring the Python
/// `stock_metadata` dict passed alongside a BUY transaction.
#[derive(Debug, Clone, Default)]
pub struct NewHoldingMetadata {
    pub beta: f64,
    pub sector: String,
}

impl Default for Holding {
    fn default() -> Self {
        Self {
            ticker: String::new(),
            quantity: 0.0,
            avg_cost: 0.0,
            current_price: 0.0,
            market_value: 0.0,
            unrealized_pnl: 0.0,
            weight: 0.0,
            beta: 1.0,
            sector: "Unknown".to_string(),
        }
    }
}

pub struct PortfolioService {
    store: Arc<MongoStore>,
}

impl PortfolioService {
    pub fn new(store: Arc<MongoStore>) -> Self {
        Self { store }
    }

    /// Creates a new portfolio document, seeding weights/sector exposures
    /// from any pre-existing holdings.
    pub async fn initialize(
        &self,
        user_id: &str,
        initial_cash: f64,
        currency: &str,
        mut holdings: Vec<Holding>,
    ) -> Result<String, PortfolioError> {
        let holdings_value: f64 = holdings.iter().map(|h| h.market_value).sum();
        let total_value = initial_cash + holdings_value;

        let mut sector_exposures = std::collections::HashMap::new();
        for holding in &mut holdings {
            if total_value > 0.0 {
                holding.weight = holding.market_value / total_value;
            } else {
                holding.weight = 0.0;
            }
            *sector_exposures.entry(holding.sector.clone()).or_insert(0.0) += holding.market_value;
        }
        if total_value > 0.0 {
            for value in sector_exposures.values_mut() {
                *value /= total_value;
            }
        }

        let portfolio = Portfolio {
            portfolio_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            cash: initial_cash,
            total_value,
            currency: currency.to_string(),
            portfolio_beta: 1.0,
            sector_exposures,
            holdings,
            last_updated: Utc::now(),
        };

        self.store
            .insert_one(crate::store::mongo::PORTFOLIOS, &portfolio)
            .await
            .map_err(|e| PortfolioError::Storage(e.to_string()))?;

        Ok(portfolio.portfolio_id)
    }

    /// Applies one transaction to a portfolio via read-modify-write,
    /// recomputing every derived field. `new_holding_meta` supplies
    /// sector/beta for a ticker not already held (BUY only).
    pub async fn apply(
        &self,
        portfolio_id: &str,
        transaction: Transaction,
        new_holding_meta: Option<NewHoldingMetadata>,
    ) -> Result<Portfolio, PortfolioError> {
        let filter = doc! { "portfolio_id": portfolio_id };
        let mut portfolio: Portfolio = self
            .store
            .find_one(crate::store::mongo::PORTFOLIOS, filter.clone())
            .await
            .map_err(|e| PortfolioError::Storage(e.to_string()))?
            .ok_or_else(|| PortfolioError::NotFound(portfolio_id.to_string()))?;

        self.store
            .insert_one(crate::store::mongo::TRANSACTIONS, &transaction)
            .await
            .map_err(|e| PortfolioError::Storage(e.to_string()))?;

        let holding_idx = portfolio.holdings.iter().position(|h| h.ticker == transaction.ticker);

        if holding_idx.is_none() && transaction.action == TransactionAction::Sell {
            return Err(PortfolioError::HoldingNotFound(transaction.ticker.clone()));
        }

        let holding_idx = match holding_idx {
            Some(idx) => idx,
            None => {
                let meta = new_holding_meta.unwrap_or_default();
                portfolio.holdings.push(Holding {
                    ticker: transaction.ticker.clone(),
                    current_price: transaction.price,
                    beta: if meta.beta != 0.0 { meta.beta } else { 1.0 },
                    sector: if meta.sector.is_empty() { "Unknown".to_string() } else { meta.sector },
                    ..Holding::default()
                });
                portfolio.holdings.len() - 1
            }
        };

        let total_cost = transaction.quantity * transaction.price;
        let mut cash = portfolio.cash;
        let mut remove_holding = false;

        match transaction.action {
            TransactionAction::Buy => {
                let cost_with_fees = total_cost + transaction.fees;
                if cash < cost_with_fees {
                    return Err(PortfolioError::InsufficientCash { balance: cash, required: cost_with_fees });
                }
                let holding = &mut portfolio.holdings[holding_idx];
                let new_qty = holding.quantity + transaction.quantity;
                let new_cost_basis = holding.quantity * holding.avg_cost + total_cost;
                holding.avg_cost = if new_qty > 0.0 { new_cost_basis / new_qty } else { 0.0 };
                holding.quantity = new_qty;
                cash -= cost_with_fees;
            }
            TransactionAction::Sell => {
                let holding = &mut portfolio.holdings[holding_idx];
                if holding.quantity < transaction.quantity {
                    return Err(PortfolioError::InsufficientHolding {
                        ticker: transaction.ticker.clone(),
                        have: holding.quantity,
                        requested: transaction.quantity,
                    });
                }
                holding.quantity -= transaction.quantity;
                let proceeds = total_cost - transaction.fees;
                cash += proceeds;
                if holding.quantity == 0.0 {
                    remove_holding = true;
                }
            }
            TransactionAction::Dividend | TransactionAction::Split => {
                // Matches the Python source: only BUY/SELL branch, everything
                // else falls through to the shared post-match recompute below.
            }
        }

        if remove_holding {
            portfolio.holdings.remove(holding_idx);
        } else {
            let holding = &mut portfolio.holdings[holding_idx];
            holding.current_price = transaction.price;
            holding.market_value = holding.quantity * holding.current_price;
            holding.unrealized_pnl = holding.market_value - (holding.quantity * holding.avg_cost);
        }

        let total_holdings_value: f64 = portfolio.holdings.iter().map(|h| h.market_value).sum();
        let total_value = cash + total_holdings_value;

        let mut sector_exposures = std::collections::HashMap::new();
        for holding in &mut portfolio.holdings {
            holding.weight = if total_value > 0.0 { holding.market_value / total_value } else { 0.0 };
            *sector_exposures.entry(holding.sector.clone()).or_insert(0.0) += holding.market_value;
        }
        if total_value > 0.0 {
            for value in sector_exposures.values_mut() {
                *value /= total_value;
            }
        }

        portfolio.cash = cash;
        portfolio.total_value = total_value;
        portfolio.sector_exposures = sector_exposures;
        portfolio.last_updated = Utc::now();

        self.store
            .upsert_one(crate::store::mongo::PORTFOLIOS, filter, &portfolio)
            .await
            .map_err(|e| PortfolioError::Storage(e.to_string()))?;

        Ok(portfolio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buy_msft() -> Transaction {
        Transaction {
            transaction_id: Uuid::new_v4().to_string(),
            portfolio_id: "pf1".to_string(),
            ticker: "MSFT".to_string(),
            action: TransactionAction::Buy,
            quantity: 5.0,
            price: 300.0,
            fees: 10.0,
            timestamp: Utc::now(),
        }
    }

    /// Literal worked example: cash=5000 -> BUY MSFT qty=5 price=300 fees=10
    /// -> cash=3490, holding qty=5 avg_cost=300 market_value=1500
    /// weight=1500/4990, sector_exposures={Technology: 1500/4990}.
    #[test]
    fn buy_recalculates_cash_weight_and_sector_exposure() {
        let mut portfolio = Portfolio {
            portfolio_id: "pf1".to_string(),
            user_id: "u1".to_string(),
            cash: 5000.0,
            total_value: 5000.0,
            currency: "INR".to_string(),
            portfolio_beta: 1.0,
            sector_exposures: std::collections::HashMap::new(),
            holdings: vec![],
            last_updated: Utc::now(),
        };

        let txn = buy_msft();
        let total_cost = txn.quantity * txn.price;
        let cost_with_fees = total_cost + txn.fees;
        portfolio.cash -= cost_with_fees;

        let mut holding = Holding { ticker: "MSFT".to_string(), sector: "Technology".to_string(), ..Holding::default() };
        holding.avg_cost = total_cost / txn.quantity;
        holding.quantity = txn.quantity;
        holding.current_price = txn.price;
        holding.market_value = holding.quantity * holding.current_price;
        holding.unrealized_pnl = holding.market_value - (holding.quantity * holding.avg_cost);
        portfolio.holdings.push(holding);

        let total_holdings_value: f64 = portfolio.holdings.iter().map(|h| h.market_value).sum();
        portfolio.total_value = portfolio.cash + total_holdings_value;
        for h in &mut portfolio.holdings {
            h.weight = h.market_value / portfolio.total_value;
        }

        assert_eq!(portfolio.cash, 3490.0);
        assert_eq!(portfolio.total_value, 4990.0);
        assert_eq!(portfolio.holdings[0].market_value, 1500.0);
        assert!((portfolio.holdings[0].weight - (1500.0 / 4990.0)).abs() < 1e-9);
        assert!(portfolio.check_conservation(1e-9));
    }

    fn portfolio_holding_msft(cash: f64, quantity: f64, avg_cost: f64, price: f64) -> Portfolio {
        let mut holding = Holding { ticker: "MSFT".to_string(), sector: "Technology".to_string(), ..Holding::default() };
        holding.quantity = quantity;
        holding.avg_cost = avg_cost;
        holding.current_price = price;
        holding.market_value = quantity * price;
        holding.unrealized_pnl = holding.market_value - (quantity * avg_cost);
        let total_value = cash + holding.market_value;
        holding.weight = if total_value > 0.0 { holding.market_value / total_value } else { 0.0 };
        Portfolio {
            portfolio_id: "pf1".to_string(),
            user_id: "u1".to_string(),
            cash,
            total_value,
            currency: "INR".to_string(),
            portfolio_beta: 1.0,
            sector_exposures: [("Technology".to_string(), holding.weight)].into_iter().collect(),
            holdings: vec![holding],
            last_updated: Utc::now(),
        }
    }

    /// Full-exit SELL: quantity matches the holding exactly, so the holding
    /// is removed entirely and its value folds back into cash.
    #[test]
    fn full_sell_removes_holding_and_conserves_total_value() {
        let mut portfolio = portfolio_holding_msft(3490.0, 5.0, 300.0, 310.0);

        let proceeds = 5.0 * 310.0 - 5.0;
        portfolio.cash += proceeds;
        portfolio.holdings.clear();
        portfolio.sector_exposures.clear();
        portfolio.total_value = portfolio.cash;

        assert!(portfolio.holdings.is_empty());
        assert_eq!(portfolio.cash, 3490.0 + 1550.0 - 5.0);
        assert!(portfolio.check_conservation(1e-9));
    }

    /// Partial SELL: holding survives with reduced quantity, weight and
    /// market value recomputed against the new total.
    #[test]
    fn partial_sell_reduces_quantity_and_conserves_total_value() {
        let mut portfolio = portfolio_holding_msft(3490.0, 5.0, 300.0, 310.0);

        let sell_qty = 2.0;
        let proceeds = sell_qty * 310.0 - 3.0;
        portfolio.cash += proceeds;
        let holding = &mut portfolio.holdings[0];
        holding.quantity -= sell_qty;
        holding.market_value = holding.quantity * holding.current_price;
        holding.unrealized_pnl = holding.market_value - (holding.quantity * holding.avg_cost);
        portfolio.total_value = portfolio.cash + holding.market_value;
        for h in &mut portfolio.holdings {
            h.weight = h.market_value / portfolio.total_value;
        }

        assert_eq!(portfolio.holdings[0].quantity, 3.0);
        assert!(portfolio.check_conservation(1e-9));
    }

    /// Dividend has no branch of its own (matching the Python source, which
    /// only implements BUY/SELL): cash, quantity and avg_cost are untouched,
    /// only the shared post-match current_price/market_value/unrealized_pnl
    /// recompute runs.
    #[test]
    fn dividend_leaves_cash_and_quantity_unchanged() {
        let mut portfolio = portfolio_holding_msft(3490.0, 5.0, 300.0, 310.0);
        let cash_before = portfolio.cash;
        let quantity_before = portfolio.holdings[0].quantity;

        let refreshed_price = 312.0;
        let holding = &mut portfolio.holdings[0];
        holding.current_price = refreshed_price;
        holding.market_value = holding.quantity * holding.current_price;
        holding.unrealized_pnl = holding.market_value - (holding.quantity * holding.avg_cost);
        portfolio.total_value = portfolio.cash + holding.market_value;
        for h in &mut portfolio.holdings {
            h.weight = h.market_value / portfolio.total_value;
        }

        assert_eq!(portfolio.cash, cash_before);
        assert_eq!(portfolio.holdings[0].quantity, quantity_before);
        assert!(portfolio.check_conservation(1e-9));
    }

    /// Split has no branch of its own either: quantity and avg_cost are
    /// untouched, only the shared post-match recompute runs (using
    /// whatever price the transaction carries, same as every other action).
    #[test]
    fn split_leaves_quantity_and_avg_cost_unchanged() {
        let mut portfolio = portfolio_holding_msft(3490.0, 5.0, 300.0, 310.0);
        let quantity_before = portfolio.holdings[0].quantity;
        let avg_cost_before = portfolio.holdings[0].avg_cost;

        let refreshed_price = 308.0;
        let holding = &mut portfolio.holdings[0];
        holding.current_price = refreshed_price;
        holding.market_value = holding.quantity * holding.current_price;
        holding.unrealized_pnl = holding.market_value - (holding.quantity * holding.avg_cost);
        portfolio.total_value = portfolio.cash + holding.market_value;
        for h in &mut portfolio.holdings {
            h.weight = h.market_value / portfolio.total_value;
        }

        assert_eq!(portfolio.holdings[0].quantity, quantity_before);
        assert_eq!(portfolio.holdings[0].avg_cost, avg_cost_before);
        assert!(portfolio.check_conservation(1e-9));
    }
}
