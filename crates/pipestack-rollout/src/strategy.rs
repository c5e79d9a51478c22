//! Deployment strategies: the canned CodeDeploy traffic-shift curves.
//!
//! Strategies are provider-defined; this module only names them and maps a
//! requested identifier onto one. Resolution is lenient: an absent or
//! unrecognised identifier resolves to [`DeploymentStrategy::default`]
//! instead of failing. Use [`str::parse`] for the strict variant.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use thiserror::Error;
use tracing::debug;

/// How CodeDeploy shifts Lambda alias traffic to a new version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeploymentStrategy {
    AllAtOnce,
    Canary10Percent30Minutes,
    Canary10Percent15Minutes,
    Canary10Percent10Minutes,
    Canary10Percent5Minutes,
    Linear10PercentEvery10Minutes,
    Linear10PercentEvery3Minutes,
    #[default]
    Linear10PercentEvery2Minutes,
    Linear10PercentEvery1Minute,
}

/// Shape of a strategy's traffic-shift curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficShift {
    /// All traffic moves in one step.
    AllAtOnce,
    /// `percentage` moves first; the rest after `interval_minutes`.
    Canary { percentage: u32, interval_minutes: u32 },
    /// `percentage` more moves every `interval_minutes`.
    Linear { percentage: u32, interval_minutes: u32 },
}

impl fmt::Display for TrafficShift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrafficShift::AllAtOnce => write!(f, "100% at once"),
            TrafficShift::Canary {
                percentage,
                interval_minutes,
            } => write!(f, "{percentage}%, then 100% after {interval_minutes}m"),
            TrafficShift::Linear {
                percentage,
                interval_minutes,
            } => write!(f, "+{percentage}% every {interval_minutes}m"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown deployment strategy '{0}'")]
pub struct StrategyParseError(pub String);

/// Where a resolved strategy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedFrom {
    /// The requested identifier matched a known strategy.
    Requested,
    /// Nothing was requested.
    DefaultAbsent,
    /// The requested identifier matched nothing and was ignored.
    DefaultUnrecognized,
}

/// Outcome of [`DeploymentStrategy::resolve_with_origin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub strategy: DeploymentStrategy,
    pub from: ResolvedFrom,
}

/// Older, platform-neutral spelling of the all-at-once identifier.
const LEGACY_ALL_AT_ONCE: &str = "CodeDeployDefault.AllAtOnce";

static BY_CONFIG_NAME: LazyLock<HashMap<&'static str, DeploymentStrategy>> = LazyLock::new(|| {
    let mut map: HashMap<_, _> = DeploymentStrategy::ALL
        .iter()
        .map(|s| (s.config_name(), *s))
        .collect();
    map.insert(LEGACY_ALL_AT_ONCE, DeploymentStrategy::AllAtOnce);
    map
});

impl DeploymentStrategy {
    /// Every known strategy, in lookup priority order.
    pub const ALL: [DeploymentStrategy; 9] = [
        DeploymentStrategy::AllAtOnce,
        DeploymentStrategy::Canary10Percent30Minutes,
        DeploymentStrategy::Canary10Percent15Minutes,
        DeploymentStrategy::Canary10Percent10Minutes,
        DeploymentStrategy::Canary10Percent5Minutes,
        DeploymentStrategy::Linear10PercentEvery10Minutes,
        DeploymentStrategy::Linear10PercentEvery3Minutes,
        DeploymentStrategy::Linear10PercentEvery2Minutes,
        DeploymentStrategy::Linear10PercentEvery1Minute,
    ];

    /// CodeDeploy deployment config name.
    pub fn config_name(&self) -> &'static str {
        match self {
            DeploymentStrategy::AllAtOnce => "CodeDeployDefault.LambdaAllAtOnce",
            DeploymentStrategy::Canary10Percent30Minutes => {
                "CodeDeployDefault.LambdaCanary10Percent30Minutes"
            }
            DeploymentStrategy::Canary10Percent15Minutes => {
                "CodeDeployDefault.LambdaCanary10Percent15Minutes"
            }
            DeploymentStrategy::Canary10Percent10Minutes => {
                "CodeDeployDefault.LambdaCanary10Percent10Minutes"
            }
            DeploymentStrategy::Canary10Percent5Minutes => {
                "CodeDeployDefault.LambdaCanary10Percent5Minutes"
            }
            DeploymentStrategy::Linear10PercentEvery10Minutes => {
                "CodeDeployDefault.LambdaLinear10PercentEvery10Minutes"
            }
            DeploymentStrategy::Linear10PercentEvery3Minutes => {
                "CodeDeployDefault.LambdaLinear10PercentEvery3Minutes"
            }
            DeploymentStrategy::Linear10PercentEvery2Minutes => {
                "CodeDeployDefault.LambdaLinear10PercentEvery2Minutes"
            }
            DeploymentStrategy::Linear10PercentEvery1Minute => {
                "CodeDeployDefault.LambdaLinear10PercentEvery1Minute"
            }
        }
    }

    pub fn traffic_shift(&self) -> TrafficShift {
        let canary = |interval_minutes| TrafficShift::Canary {
            percentage: 10,
            interval_minutes,
        };
        let linear = |interval_minutes| TrafficShift::Linear {
            percentage: 10,
            interval_minutes,
        };
        match self {
            DeploymentStrategy::AllAtOnce => TrafficShift::AllAtOnce,
            DeploymentStrategy::Canary10Percent30Minutes => canary(30),
            DeploymentStrategy::Canary10Percent15Minutes => canary(15),
            DeploymentStrategy::Canary10Percent10Minutes => canary(10),
            DeploymentStrategy::Canary10Percent5Minutes => canary(5),
            DeploymentStrategy::Linear10PercentEvery10Minutes => linear(10),
            DeploymentStrategy::Linear10PercentEvery3Minutes => linear(3),
            DeploymentStrategy::Linear10PercentEvery2Minutes => linear(2),
            DeploymentStrategy::Linear10PercentEvery1Minute => linear(1),
        }
    }

    /// Exact-match lookup of a deployment config name.
    pub fn lookup(config_name: &str) -> Option<Self> {
        BY_CONFIG_NAME.get(config_name).copied()
    }

    /// Map a requested identifier onto a strategy, falling back to the
    /// default when it is absent or unrecognised.
    pub fn resolve(requested: Option<&str>) -> Self {
        Self::resolve_with_origin(requested).strategy
    }

    pub fn resolve_with_origin(requested: Option<&str>) -> Resolution {
        let Some(requested) = requested else {
            return Resolution {
                strategy: Self::default(),
                from: ResolvedFrom::DefaultAbsent,
            };
        };
        match Self::lookup(requested) {
            Some(strategy) => Resolution {
                strategy,
                from: ResolvedFrom::Requested,
            },
            None => {
                // Kept lenient for compatibility with existing stacks.
                debug!(
                    requested,
                    fallback = Self::default().config_name(),
                    "unrecognised deployment strategy, using default"
                );
                Resolution {
                    strategy: Self::default(),
                    from: ResolvedFrom::DefaultUnrecognized,
                }
            }
        }
    }
}

impl FromStr for DeploymentStrategy {
    type Err = StrategyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| StrategyParseError(s.to_string()))
    }
}

impl TryFrom<String> for DeploymentStrategy {
    type Error = StrategyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeploymentStrategy> for String {
    fn from(strategy: DeploymentStrategy) -> Self {
        strategy.config_name().to_string()
    }
}

impl fmt::Display for DeploymentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_name())
    }
}

/// Shorthand for [`DeploymentStrategy::resolve`].
pub fn resolve(requested: Option<&str>) -> DeploymentStrategy {
    DeploymentStrategy::resolve(requested)
}
