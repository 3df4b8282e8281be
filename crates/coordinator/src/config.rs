//! Batch configuration loaded from environment variables.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use fleet_core::{AvgLoadPolicy, CoreError, SolverConfig, WorkerId};
use fleet_worker::config::{DEFAULT_FAILURE_PROBABILITY, DEFAULT_WORK_DURATION};
use fleet_worker::{WorkCost, WorkerConfig};

/// Default result collection deadline.
pub const DEFAULT_RESULTS_DEADLINE: Duration = Duration::from_secs(30);

const DEFAULT_TASKS_FILE: &str = "tasks.json";
const DEFAULT_WORKER_COUNT: u32 = 2;

/// Everything one batch run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetConfig {
    /// Catalog path (default: `tasks.json`).
    pub tasks_file: PathBuf,
    /// Number of workers (default: `2`).
    pub worker_count: u32,
    /// One probability per worker, index 0 is worker 1.
    pub failure_probabilities: Vec<f64>,
    /// Collection deadline, measured from the end of publishing.
    pub results_deadline: Duration,
    pub solver: SolverConfig,
    pub work_cost: WorkCost,
    /// Base seed for worker draws; worker `w` uses `seed + w`.
    pub rng_seed: Option<u64>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            tasks_file: PathBuf::from(DEFAULT_TASKS_FILE),
            worker_count: DEFAULT_WORKER_COUNT,
            failure_probabilities: vec![DEFAULT_FAILURE_PROBABILITY; DEFAULT_WORKER_COUNT as usize],
            results_deadline: DEFAULT_RESULTS_DEADLINE,
            solver: SolverConfig::default(),
            work_cost: WorkCost::default(),
            rng_seed: None,
        }
    }
}

impl FleetConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default      |
    /// |--------------------------|--------------|
    /// | `TASKS_FILE`             | `tasks.json` |
    /// | `WORKER_COUNT`           | `2`          |
    /// | `FAILURE_PROBS`          | `0.1`        |
    /// | `RESULTS_DEADLINE_SECS`  | `30`         |
    /// | `SOLVER_TIME_LIMIT_SECS` | `5`          |
    /// | `BALANCE_WEIGHT`         | `1.0`        |
    /// | `AVG_LOAD_POLICY`        | `exact`      |
    /// | `WORK_MS`                | `100`        |
    /// | `WORK_UNIT_MS`           | unset        |
    /// | `RNG_SEED`               | unset        |
    ///
    /// `FAILURE_PROBS` is either one value shared by every worker or a comma
    /// separated list with exactly one value per worker.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through
    /// `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tasks_file = lookup("TASKS_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TASKS_FILE));

        let worker_count: u32 = parse_var(&lookup, "WORKER_COUNT")?.unwrap_or(DEFAULT_WORKER_COUNT);

        let failure_probabilities = match lookup("FAILURE_PROBS") {
            Some(raw) => parse_probabilities(&raw, worker_count)?,
            None => vec![DEFAULT_FAILURE_PROBABILITY; worker_count as usize],
        };

        let results_deadline = parse_var::<_, u64>(&lookup, "RESULTS_DEADLINE_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RESULTS_DEADLINE);

        let rng_seed: Option<u64> = parse_var(&lookup, "RNG_SEED")?;

        let mut solver = SolverConfig::default();
        if let Some(secs) = parse_var::<_, u64>(&lookup, "SOLVER_TIME_LIMIT_SECS")? {
            solver.time_limit = Duration::from_secs(secs);
        }
        if let Some(weight) = parse_var::<_, f64>(&lookup, "BALANCE_WEIGHT")? {
            solver.balance_weight = weight;
        }
        if let Some(policy) = parse_var::<_, AvgLoadPolicy>(&lookup, "AVG_LOAD_POLICY")? {
            solver.avg_load_policy = policy;
        }
        if let Some(seed) = rng_seed {
            solver.seed = seed;
        }
        solver.validate()?;

        let work = parse_var::<_, u64>(&lookup, "WORK_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_WORK_DURATION);
        let work_cost = match parse_var::<_, u64>(&lookup, "WORK_UNIT_MS")? {
            Some(unit) => WorkCost::PerTask {
                unit: Duration::from_millis(unit),
                fallback: work,
            },
            None => WorkCost::Fixed(work),
        };

        Ok(Self {
            tasks_file,
            worker_count,
            failure_probabilities,
            results_deadline,
            solver,
            work_cost,
            rng_seed,
        })
    }

    /// Per-worker settings for workers `1..=worker_count`.
    pub fn worker_configs(&self) -> Result<Vec<WorkerConfig>, CoreError> {
        if self.failure_probabilities.len() != self.worker_count as usize {
            return Err(CoreError::Validation(format!(
                "{} failure probabilities configured for {} workers",
                self.failure_probabilities.len(),
                self.worker_count
            )));
        }
        (1..=self.worker_count)
            .zip(&self.failure_probabilities)
            .map(|(worker_id, &probability)| -> Result<WorkerConfig, CoreError> {
                let mut config = WorkerConfig::new(worker_id)
                    .with_failure_probability(probability)
                    .with_work_cost(self.work_cost);
                if let Some(seed) = self.rng_seed {
                    config = config.with_seed(seed.wrapping_add(u64::from(worker_id)));
                }
                config.validate()?;
                Ok(config)
            })
            .collect()
    }

    pub fn failure_probability(&self, worker_id: WorkerId) -> Option<f64> {
        let index = usize::try_from(worker_id).ok()?.checked_sub(1)?;
        self.failure_probabilities.get(index).copied()
    }
}

/// Parse an optional variable; blank counts as unset.
fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>, CoreError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CoreError::Validation(format!("{name}='{raw}' is invalid: {e}"))),
        _ => Ok(None),
    }
}

/// One value is broadcast to every worker; a list must match the count.
fn parse_probabilities(raw: &str, worker_count: u32) -> Result<Vec<f64>, CoreError> {
    let values = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| -> Result<f64, CoreError> {
            let p: f64 = s.parse().map_err(|e| {
                CoreError::Validation(format!("FAILURE_PROBS entry '{s}' is invalid: {e}"))
            })?;
            if !(0.0..=1.0).contains(&p) {
                return Err(CoreError::Validation(format!(
                    "FAILURE_PROBS entry {p} is outside [0, 1]"
                )));
            }
            Ok(p)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let expected = worker_count as usize;
    match values.len() {
        0 => Err(CoreError::Validation("FAILURE_PROBS is empty".into())),
        1 => Ok(vec![values[0]; expected]),
        n if n == expected => Ok(values),
        n => Err(CoreError::Validation(format!(
            "FAILURE_PROBS has {n} values but WORKER_COUNT is {worker_count}"
        ))),
    }
}
