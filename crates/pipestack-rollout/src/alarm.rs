//! Rollback alarm specification.
//!
//! Every alarm parameter is optional on input and defaults on its own:
//! supplying a threshold never changes how the comparison operator,
//! evaluation periods, or poll period are resolved. A zero override counts
//! as absent.

use std::collections::BTreeMap;
use std::time::Duration;

use pipestack_core::resource::{
    CloudWatchAlarm, ComparisonOperator, Dimension, MetricUnit, Statistic,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_COMPARISON_OPERATOR: ComparisonOperator =
    ComparisonOperator::GreaterThanOrEqualToThreshold;
pub const DEFAULT_THRESHOLD: f64 = 1.0;
pub const DEFAULT_EVALUATION_PERIODS: u32 = 1;
pub const DEFAULT_POLL_PERIOD_MINUTES: u32 = 1;

/// The time series a rollback alarm watches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricIdentity {
    pub namespace: String,
    pub metric_name: String,
    pub dimension_name: String,
    pub dimension_value: String,
}

/// Caller overrides for a rollback alarm.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlarmSpecInput {
    pub comparison_operator: Option<ComparisonOperator>,
    pub threshold: Option<f64>,
    /// Periods over which the statistic is compared to the threshold.
    pub evaluation_periods: Option<u32>,
    /// Metric aggregation period, in minutes.
    pub poll_period_minutes: Option<u32>,
}

impl AlarmSpecInput {
    pub fn resolve(&self, metric: MetricIdentity) -> AlarmSpec {
        AlarmSpec {
            comparison_operator: self
                .comparison_operator
                .unwrap_or(DEFAULT_COMPARISON_OPERATOR),
            threshold: self
                .threshold
                .filter(|t| *t != 0.0)
                .unwrap_or(DEFAULT_THRESHOLD),
            evaluation_periods: self
                .evaluation_periods
                .filter(|n| *n != 0)
                .unwrap_or(DEFAULT_EVALUATION_PERIODS),
            poll_period_minutes: self
                .poll_period_minutes
                .filter(|n| *n != 0)
                .unwrap_or(DEFAULT_POLL_PERIOD_MINUTES),
            metric,
        }
    }
}

/// A fully resolved rollback alarm.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmSpec {
    pub comparison_operator: ComparisonOperator,
    pub threshold: f64,
    pub evaluation_periods: u32,
    pub poll_period_minutes: u32,
    pub metric: MetricIdentity,
}

/// A metric query: one namespace/name/dimension, summed counts per period.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: BTreeMap<String, String>,
    pub unit: MetricUnit,
    pub statistic: Statistic,
    pub period: Duration,
}

impl AlarmSpec {
    pub fn metric(&self) -> Metric {
        let identity = &self.metric;
        Metric {
            namespace: identity.namespace.clone(),
            metric_name: identity.metric_name.clone(),
            dimensions: BTreeMap::from([(
                identity.dimension_name.clone(),
                identity.dimension_value.clone(),
            )]),
            unit: MetricUnit::Count,
            statistic: Statistic::Sum,
            period: Duration::from_secs(u64::from(self.poll_period_minutes) * 60),
        }
    }

    /// Threshold alarm over `metric`.
    pub fn to_alarm(&self, metric: &Metric) -> CloudWatchAlarm {
        CloudWatchAlarm {
            alarm_description: None,
            comparison_operator: self.comparison_operator,
            threshold: self.threshold,
            evaluation_periods: self.evaluation_periods,
            namespace: metric.namespace.clone(),
            metric_name: metric.metric_name.clone(),
            dimensions: metric
                .dimensions
                .iter()
                .map(|(name, value)| Dimension {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            period: u32::try_from(metric.period.as_secs()).unwrap_or(u32::MAX),
            statistic: metric.statistic,
            unit: Some(metric.unit),
        }
    }
}
