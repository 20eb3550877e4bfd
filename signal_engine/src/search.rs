//! search.rs - Brute-force ARMA order selection by AIC
//!
//! Every (p, q) in `0..=p_max × 0..=q_max` except (0, 0) is fitted to the
//! window.  Candidates whose fit is not clean (hard error or warning) are
//! dropped.  The minimum AIC wins; ties keep the earlier candidate in
//! enumeration order (p ascending, then q ascending).  No I/O, no logging.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::arma::{ArmaEstimator, ArmaFit};
use crate::models::{ArmaOrder, FitOutcome};

/// Anything that can fit an ARMA mean of a given order to a window.
pub trait MeanModelFitter: Sync {
    fn fit_mean(&self, window: &[f64], order: ArmaOrder) -> FitOutcome<ArmaFit>;
}

impl MeanModelFitter for ArmaEstimator {
    fn fit_mean(&self, window: &[f64], order: ArmaOrder) -> FitOutcome<ArmaFit> {
        self.fit(window, order)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderGrid {
    pub p_max: usize,
    pub q_max: usize,
}

impl Default for OrderGrid {
    fn default() -> Self {
        Self { p_max: 5, q_max: 5 }
    }
}

impl OrderGrid {
    pub fn new(p_max: usize, q_max: usize) -> Self {
        Self { p_max, q_max }
    }

    /// Candidates in search order; (0, 0) is never produced.
    pub fn candidates(&self) -> impl Iterator<Item = ArmaOrder> + '_ {
        (0..=self.p_max)
            .flat_map(move |p| (0..=self.q_max).map(move |q| ArmaOrder::new(p, q)))
            .filter(|o| !o.is_white_noise())
    }

    pub fn len(&self) -> usize {
        (self.p_max + 1) * (self.q_max + 1) - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SearchOutcome {
    Selected {
        order: ArmaOrder,
        aic: f64,
        attempts: usize,
        failures: usize,
    },
    NoModelFound {
        attempts: usize,
    },
}

impl SearchOutcome {
    pub fn order(&self) -> Option<ArmaOrder> {
        match self {
            SearchOutcome::Selected { order, .. } => Some(*order),
            SearchOutcome::NoModelFound { .. } => None,
        }
    }
}

/// Fold candidate AICs (in enumeration order) into the search result.
fn select(scored: impl Iterator<Item = (ArmaOrder, Option<f64>)>) -> SearchOutcome {
    let mut best: Option<(ArmaOrder, f64)> = None;
    let mut attempts = 0;
    let mut failures = 0;
    for (order, aic) in scored {
        attempts += 1;
        let Some(aic) = aic else {
            failures += 1;
            continue;
        };
        match best {
            Some((_, best_aic)) if aic >= best_aic => {}
            _ => best = Some((order, aic)),
        }
    }
    match best {
        Some((order, aic)) => SearchOutcome::Selected { order, aic, attempts, failures },
        None => SearchOutcome::NoModelFound { attempts },
    }
}

fn clean_aic<M: MeanModelFitter + ?Sized>(fitter: &M, window: &[f64], order: ArmaOrder) -> Option<f64> {
    fitter
        .fit_mean(window, order)
        .into_clean()
        .ok()
        .map(|fit| fit.aic)
        .filter(|aic| aic.is_finite())
}

/// Sequential search over the grid.
pub fn search_order<M: MeanModelFitter + ?Sized>(fitter: &M, window: &[f64], grid: &OrderGrid) -> SearchOutcome {
    select(grid.candidates().map(|order| (order, clean_aic(fitter, window, order))))
}

/// Same result as `search_order`, candidates fitted on the rayon pool.
pub fn par_search_order<M: MeanModelFitter + ?Sized>(fitter: &M, window: &[f64], grid: &OrderGrid) -> SearchOutcome {
    let orders: Vec<ArmaOrder> = grid.candidates().collect();
    let scored: Vec<(ArmaOrder, Option<f64>)> = orders
        .par_iter()
        .map(|&order| (order, clean_aic(fitter, window, order)))
        .collect();
    select(scored.into_iter())
}
