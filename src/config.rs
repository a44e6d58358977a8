use std::fmt;
use std::time::Duration;

use clap::ValueEnum;

use crate::error::ConfigError;

/// Per-request deadline applied when the caller does not override it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Checks the runtime worker thread count requested on the command line.
pub fn worker_threads(requested: usize) -> Result<usize, ConfigError> {
    if requested == 0 {
        return Err(ConfigError::ZeroThreads);
    }
    Ok(requested)
}

/// Load profile selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    /// `clients` requests per URL every second, each second gated on the
    /// previous one finishing.
    #[value(name = "clients-per-second")]
    RatePaced,
    /// `clients` is a total budget per URL, spread evenly over the duration.
    #[value(name = "clients-per-test")]
    BudgetPaced,
    /// `clients` concurrent requests per URL fired at once, cancelled when
    /// the duration elapses.
    #[value(name = "distributed")]
    Saturation,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Profile::RatePaced => "clients-per-second",
            Profile::BudgetPaced => "clients-per-test",
            Profile::Saturation => "distributed",
        };
        f.write_str(name)
    }
}

/// Validated input for one run of the scheduler.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub urls: Vec<String>,
    pub profile: Profile,
    pub clients: usize,
    pub duration_secs: u64,
    pub timeout: Duration,
    tick: Duration,
}

impl RunConfig {
    pub fn new(
        urls: Vec<String>,
        profile: Profile,
        clients: usize,
        duration_secs: u64,
    ) -> Result<Self, ConfigError> {
        if urls.is_empty() {
            return Err(ConfigError::NoUrls);
        }
        if clients == 0 {
            return Err(ConfigError::ZeroClients);
        }
        if duration_secs == 0 {
            return Err(ConfigError::ZeroDuration);
        }

        for url in &urls {
            if let Err(e) = url::Url::parse(url) {
                tracing::warn!("Target {} does not parse as a URL ({}), its requests will fail", url, e);
            }
        }

        Ok(RunConfig {
            urls,
            profile,
            clients,
            duration_secs,
            timeout: DEFAULT_TIMEOUT,
            tick: Duration::from_secs(1),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        self.timeout = timeout;
        Ok(self)
    }

    /// Shortens the tick below one second. Only meant for exercising the
    /// scheduler quickly; `duration_secs` then counts ticks.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Wall-clock length of the run.
    pub fn duration(&self) -> Duration {
        let ticks = u32::try_from(self.duration_secs).unwrap_or(u32::MAX);
        self.tick.saturating_mul(ticks)
    }

    /// Requests per URL per tick for the budget-paced profile. Computed once
    /// and floored at 1, so short budgets over long runs overshoot.
    pub fn budget_per_tick(&self) -> usize {
        let per_tick = self.clients as u64 / self.duration_secs;
        usize::try_from(per_tick).unwrap_or(usize::MAX).max(1)
    }
}
