//! Scoring: linear payoff minus a quadratic load-imbalance penalty.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::assignment::Assignment;
use crate::error::CoreError;

/// How the target load per worker is derived from `|tasks| / workers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvgLoadPolicy {
    /// Real-valued division.
    #[default]
    Exact,
    /// Integer division, rounding toward zero.
    Truncated,
}

impl AvgLoadPolicy {
    pub fn average_load(self, task_count: usize, worker_count: u32) -> f64 {
        if worker_count == 0 {
            return 0.0;
        }
        match self {
            Self::Exact => task_count as f64 / worker_count as f64,
            Self::Truncated => (task_count / worker_count as usize) as f64,
        }
    }
}

impl FromStr for AvgLoadPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "truncated" | "truncate" => Ok(Self::Truncated),
            other => Err(CoreError::Validation(format!(
                "Unknown average load policy \"{other}\" (expected \"exact\" or \"truncated\")"
            ))),
        }
    }
}

impl fmt::Display for AvgLoadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
            Self::Truncated => f.write_str("truncated"),
        }
    }
}

/// Objective for one solve call: `Σ payoff − λ · Σ_w (load(w) − avg)²`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Objective {
    balance_weight: f64,
    avg_load: f64,
}

impl Objective {
    pub fn new(balance_weight: f64, avg_load: f64) -> Self {
        Self {
            balance_weight,
            avg_load,
        }
    }

    pub fn avg_load(&self) -> f64 {
        self.avg_load
    }

    pub fn balance_weight(&self) -> f64 {
        self.balance_weight
    }

    /// Weighted squared deviation of a single worker's load.
    pub fn penalty(&self, load: usize) -> f64 {
        let deviation = load as f64 - self.avg_load;
        self.balance_weight * deviation * deviation
    }

    /// Penalty change when a worker goes from `load` to `load + 1`.
    pub fn marginal_penalty(&self, load: usize) -> f64 {
        self.penalty(load + 1) - self.penalty(load)
    }

    pub fn imbalance(&self, loads: &[usize]) -> f64 {
        loads.iter().map(|&load| self.penalty(load)).sum()
    }

    pub fn score(&self, payoff: f64, loads: &[usize]) -> f64 {
        payoff - self.imbalance(loads)
    }

    /// Smallest imbalance reachable when loads can only grow: workers already
    /// above the average can never get closer to it.
    pub fn imbalance_floor(&self, loads: &[usize]) -> f64 {
        loads
            .iter()
            .filter(|&&load| load as f64 > self.avg_load)
            .map(|&load| self.penalty(load))
            .sum()
    }

    /// Score a finished assignment.
    pub fn score_assignment(&self, assignment: &Assignment) -> f64 {
        let loads: Vec<usize> = assignment.loads().into_values().collect();
        self.score(assignment.total_payoff(), &loads)
    }
}
