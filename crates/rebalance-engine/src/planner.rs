//! Rebalance planning.
//!
//! Orchestrates allocation drift, candidate filtering, lot selection, and
//! tax impact estimation into a bounded, prioritized trade list. Planning is
//! estimation-only: lots are consumed later by the execution layer through
//! [`TaxLotLedger::consume`], so re-running a plan against unchanged state
//! produces identical output.

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;
use tracing::{info, warn};

use tax_lots::{AccountingMethod, TaxImpactEstimator, TaxLotLedger, TaxSettings};

use crate::differ::{AllocationDeviation, AllocationDiffer};
use crate::error::EngineError;
use crate::models::{
    RebalanceRecommendation, RebalanceRequest, RebalanceType, RecommendationStatus, TradeAction,
    TradeRecommendation,
};
use crate::turnover::TurnoverCalculator;
use crate::validate::validate_request;

/// Rebalance recommendation engine. Read-heavy: concurrent plans for
/// different portfolios only take the shared read lock, while plans for the
/// same portfolio are serialized through a processing lease - a second
/// request for a portfolio already processing is rejected, not queued, since
/// its inputs may be stale by the time it would run.
pub struct RebalancePlanner {
    settings: TaxSettings,
    ledgers: RwLock<HashMap<i64, TaxLotLedger>>,
    /// Portfolios with a plan currently in `processing`.
    processing: DashMap<i64, ()>,
    next_id: AtomicI64,
}

/// RAII lease on a portfolio's processing slot; released on every exit path,
/// including failures.
struct ProcessingLease<'a> {
    processing: &'a DashMap<i64, ()>,
    portfolio_id: i64,
}

impl Drop for ProcessingLease<'_> {
    fn drop(&mut self) {
        self.processing.remove(&self.portfolio_id);
    }
}

struct Candidate {
    deviation: AllocationDeviation,
    action: TradeAction,
    estimated_value: Decimal,
    /// Primary sort key under TAX_EFFICIENT: absolute estimated tax cost.
    sort_key: Decimal,
}

impl RebalancePlanner {
    pub fn new(settings: TaxSettings) -> Self {
        Self {
            settings,
            ledgers: RwLock::new(HashMap::new()),
            processing: DashMap::new(),
            next_id: AtomicI64::new(0),
        }
    }

    pub fn settings(&self) -> &TaxSettings {
        &self.settings
    }

    /// Register (or replace) the tax lot ledger for a portfolio.
    pub fn insert_ledger(&self, portfolio_id: i64, ledger: TaxLotLedger) {
        self.ledgers
            .write()
            .expect("ledger lock poisoned")
            .insert(portfolio_id, ledger);
    }

    /// Read access to a portfolio's ledger.
    pub fn with_ledger<R>(
        &self,
        portfolio_id: i64,
        f: impl FnOnce(&TaxLotLedger) -> R,
    ) -> Option<R> {
        let ledgers = self.ledgers.read().expect("ledger lock poisoned");
        ledgers.get(&portfolio_id).map(f)
    }

    /// Mutable access to a portfolio's ledger, for the execution layer to
    /// record acquisitions and consume lots after a plan is acted on.
    pub fn with_ledger_mut<R>(
        &self,
        portfolio_id: i64,
        f: impl FnOnce(&mut TaxLotLedger) -> R,
    ) -> Option<R> {
        let mut ledgers = self.ledgers.write().expect("ledger lock poisoned");
        ledgers.get_mut(&portfolio_id).map(f)
    }

    fn acquire_lease(&self, portfolio_id: i64) -> Result<ProcessingLease<'_>, EngineError> {
        use dashmap::mapref::entry::Entry;
        match self.processing.entry(portfolio_id) {
            Entry::Occupied(_) => Err(EngineError::Conflict { portfolio_id }),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(ProcessingLease {
                    processing: &self.processing,
                    portfolio_id,
                })
            }
        }
    }

    /// Produce a rebalance recommendation for a portfolio.
    ///
    /// Invalid requests and processing conflicts are rejected up front with
    /// no record created. Any computation failure past that point yields a
    /// `failed` record with the error captured verbatim and no trade list -
    /// never a partial one. `total_value` and `prices` come from the caller;
    /// market data is an external collaborator.
    pub fn plan(
        &self,
        user_id: i64,
        request: RebalanceRequest,
        total_value: Decimal,
        prices: &HashMap<String, Decimal>,
    ) -> Result<RebalanceRecommendation, EngineError> {
        validate_request(&request).map_err(EngineError::InvalidRequest)?;

        let _lease = self.acquire_lease(request.portfolio_id)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut record = RebalanceRecommendation {
            id,
            user_id,
            portfolio_id: request.portfolio_id,
            target_allocation: request.target_allocation.clone(),
            current_allocation: request.current_allocation.clone(),
            deviation_threshold: request.deviation_threshold,
            rebalance_type: request.rebalance_type,
            include_tax_impact: request.include_tax_impact,
            max_trades: request.max_trades,
            min_trade_size: request.min_trade_size,
            excluded_assets: request.excluded_assets.clone(),
            status: RecommendationStatus::Pending,
            recommendations: None,
            total_value,
            estimated_tax_impact: None,
            estimated_turnover: Decimal::ZERO,
            created_at: Utc::now(),
            completed_at: None,
            error: None,
        };

        record.status = RecommendationStatus::Processing;
        info!(
            portfolio_id = request.portfolio_id,
            recommendation_id = id,
            rebalance_type = %request.rebalance_type,
            "rebalance processing"
        );

        match self.compute(&request, total_value, prices) {
            Ok((recommendations, estimated_tax_impact)) => {
                record.estimated_turnover =
                    TurnoverCalculator::turnover(&recommendations, total_value);
                record.estimated_tax_impact = estimated_tax_impact;
                record.recommendations = Some(recommendations);
                record.status = RecommendationStatus::Completed;
                record.completed_at = Some(Utc::now());
                info!(
                    portfolio_id = request.portfolio_id,
                    recommendation_id = id,
                    "rebalance completed"
                );
            }
            Err(err) => {
                warn!(
                    portfolio_id = request.portfolio_id,
                    recommendation_id = id,
                    error = %err,
                    "rebalance failed"
                );
                record.status = RecommendationStatus::Failed;
                record.error = Some(err.to_string());
            }
        }

        Ok(record)
    }

    fn compute(
        &self,
        request: &RebalanceRequest,
        total_value: Decimal,
        prices: &HashMap<String, Decimal>,
    ) -> Result<(Vec<TradeRecommendation>, Option<Decimal>), EngineError> {
        let ledgers = self
            .ledgers
            .read()
            .map_err(|_| EngineError::Computation("ledger lock poisoned".to_string()))?;
        let ledger = ledgers.get(&request.portfolio_id).ok_or_else(|| {
            EngineError::Computation(format!(
                "no tax lot ledger registered for portfolio {}",
                request.portfolio_id
            ))
        })?;

        // Every symbol in the current allocation must resolve to a position.
        for symbol in request.current_allocation.keys() {
            if ledger.position(symbol).is_none() {
                return Err(EngineError::Computation(format!(
                    "symbol {} in currentAllocation has no position in the ledger",
                    symbol
                )));
            }
        }

        let method = request
            .accounting_method
            .unwrap_or(self.settings.accounting_method);
        let rate = self.settings.capital_gains_rate;

        let deviations = AllocationDiffer::diff(
            &request.current_allocation,
            &request.target_allocation,
            &request.excluded_assets,
        );

        // (deviation, estimated value, demotion note)
        let mut holds: Vec<(AllocationDeviation, Decimal, String)> = Vec::new();

        // Excluded assets still carrying deviation are a reported constraint
        // violation, not a fatal error: surfaced as HOLD for auditability.
        let mut excluded: Vec<&String> = request.excluded_assets.iter().collect();
        excluded.sort();
        for symbol in excluded {
            let current_weight = request
                .current_allocation
                .get(symbol)
                .copied()
                .unwrap_or(Decimal::ZERO);
            let target_weight = request
                .target_allocation
                .get(symbol)
                .copied()
                .unwrap_or(Decimal::ZERO);
            let deviation = target_weight - current_weight;
            if deviation != Decimal::ZERO {
                let estimated_value = deviation.abs() * total_value / Decimal::ONE_HUNDRED;
                holds.push((
                    AllocationDeviation {
                        symbol: symbol.clone(),
                        current_weight,
                        target_weight,
                        deviation,
                    },
                    estimated_value,
                    "excluded from trading".to_string(),
                ));
            }
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        for deviation in deviations {
            let estimated_value = deviation.deviation.abs() * total_value / Decimal::ONE_HUNDRED;

            let participates = match request.rebalance_type {
                RebalanceType::Full => deviation.deviation != Decimal::ZERO,
                RebalanceType::Threshold | RebalanceType::TaxEfficient => {
                    deviation.deviation.abs() > request.deviation_threshold
                }
            };
            if !participates {
                if deviation.deviation == Decimal::ZERO && request.rebalance_type == RebalanceType::Full {
                    continue;
                }
                holds.push((
                    deviation,
                    estimated_value,
                    "within deviation threshold".to_string(),
                ));
                continue;
            }

            let action = if deviation.deviation < Decimal::ZERO {
                TradeAction::Sell
            } else {
                TradeAction::Buy
            };
            candidates.push(Candidate {
                deviation,
                action,
                estimated_value,
                sort_key: Decimal::ZERO,
            });
        }

        // TAX_EFFICIENT re-sorts candidates by ascending absolute tax cost,
        // estimated under HIFO as the minimizing heuristic. Without a rate
        // the realized gain/loss still drives the ordering; with tax impact
        // disabled entirely, deviation-magnitude ordering stands (open
        // product question, resolved conservatively).
        if request.rebalance_type == RebalanceType::TaxEfficient && request.include_tax_impact {
            for candidate in &mut candidates {
                if candidate.action != TradeAction::Sell {
                    continue;
                }
                let price = price_for(prices, &candidate.deviation.symbol)?;
                let quantity = candidate.estimated_value / price;
                if quantity == Decimal::ZERO {
                    continue;
                }
                let estimate = TaxImpactEstimator::estimate(
                    ledger,
                    &candidate.deviation.symbol,
                    quantity,
                    price,
                    AccountingMethod::Hifo,
                    rate,
                )?;
                candidate.sort_key = estimate
                    .tax_impact
                    .unwrap_or(estimate.realized_gain_loss)
                    .abs();
            }
            candidates.sort_by(|a, b| {
                a.sort_key
                    .cmp(&b.sort_key)
                    .then_with(|| {
                        b.deviation
                            .deviation
                            .abs()
                            .cmp(&a.deviation.deviation.abs())
                    })
                    .then_with(|| a.deviation.symbol.cmp(&b.deviation.symbol))
            });
        }

        let mut trades: Vec<TradeRecommendation> = Vec::new();
        let mut tax_total = Decimal::ZERO;
        // Running value budget: the plan never recommends trading more value
        // than the portfolio holds.
        let mut budget = total_value;

        for candidate in candidates {
            if let Some(min_trade_size) = request.min_trade_size {
                if candidate.estimated_value < min_trade_size {
                    holds.push((
                        candidate.deviation,
                        candidate.estimated_value,
                        "below minimum trade size".to_string(),
                    ));
                    continue;
                }
            }
            if let Some(max_trades) = request.max_trades {
                if trades.len() >= max_trades {
                    holds.push((
                        candidate.deviation,
                        candidate.estimated_value,
                        "deferred: trade limit reached".to_string(),
                    ));
                    continue;
                }
            }
            if candidate.estimated_value > budget {
                holds.push((
                    candidate.deviation,
                    candidate.estimated_value,
                    "deferred: exceeds remaining portfolio value".to_string(),
                ));
                continue;
            }

            let tax_impact = if candidate.action == TradeAction::Sell && request.include_tax_impact
            {
                let price = price_for(prices, &candidate.deviation.symbol)?;
                let quantity = candidate.estimated_value / price;
                if quantity > Decimal::ZERO {
                    TaxImpactEstimator::estimate(
                        ledger,
                        &candidate.deviation.symbol,
                        quantity,
                        price,
                        method,
                        rate,
                    )?
                    .tax_impact
                } else {
                    rate.map(|_| Decimal::ZERO)
                }
            } else {
                None
            };
            if let Some(impact) = tax_impact {
                tax_total += impact;
            }

            budget -= candidate.estimated_value;
            trades.push(TradeRecommendation {
                symbol: candidate.deviation.symbol,
                action: candidate.action,
                amount: candidate.estimated_value,
                current_weight: candidate.deviation.current_weight,
                target_weight: candidate.deviation.target_weight,
                estimated_value: candidate.estimated_value,
                tax_impact,
                priority: 0,
                note: None,
            });
        }

        // HOLDs trail the executable trades, largest deviation first.
        holds.sort_by(|a, b| {
            b.0.deviation
                .abs()
                .cmp(&a.0.deviation.abs())
                .then_with(|| a.0.symbol.cmp(&b.0.symbol))
        });
        for (deviation, estimated_value, note) in holds {
            trades.push(TradeRecommendation {
                symbol: deviation.symbol,
                action: TradeAction::Hold,
                amount: Decimal::ZERO,
                current_weight: deviation.current_weight,
                target_weight: deviation.target_weight,
                estimated_value,
                tax_impact: None,
                priority: 0,
                note: Some(note),
            });
        }

        for (index, trade) in trades.iter_mut().enumerate() {
            trade.priority = index as u32 + 1;
        }

        let estimated_tax_impact = if request.include_tax_impact && rate.is_some() {
            Some(tax_total)
        } else {
            None
        };

        Ok((trades, estimated_tax_impact))
    }
}

fn price_for(prices: &HashMap<String, Decimal>, symbol: &str) -> Result<Decimal, EngineError> {
    match prices.get(symbol) {
        Some(price) if *price > Decimal::ZERO => Ok(*price),
        _ => Err(EngineError::Computation(format!(
            "no positive price available for {}",
            symbol
        ))),
    }
}
