//! CloudWatch alarm descriptor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How an alarm compares the metric statistic against its threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[default]
    #[serde(alias = "GREATER_THAN_OR_EQUAL_TO_THRESHOLD")]
    GreaterThanOrEqualToThreshold,
    #[serde(alias = "GREATER_THAN_THRESHOLD")]
    GreaterThanThreshold,
    #[serde(alias = "LESS_THAN_THRESHOLD")]
    LessThanThreshold,
    #[serde(alias = "LESS_THAN_OR_EQUAL_TO_THRESHOLD")]
    LessThanOrEqualToThreshold,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown comparison operator: {0}")]
pub struct ComparisonOperatorParseError(pub String);

impl ComparisonOperator {
    pub const ALL: [ComparisonOperator; 4] = [
        ComparisonOperator::GreaterThanOrEqualToThreshold,
        ComparisonOperator::GreaterThanThreshold,
        ComparisonOperator::LessThanThreshold,
        ComparisonOperator::LessThanOrEqualToThreshold,
    ];

    /// Name used by the CloudWatch API.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::GreaterThanOrEqualToThreshold => "GreaterThanOrEqualToThreshold",
            ComparisonOperator::GreaterThanThreshold => "GreaterThanThreshold",
            ComparisonOperator::LessThanThreshold => "LessThanThreshold",
            ComparisonOperator::LessThanOrEqualToThreshold => "LessThanOrEqualToThreshold",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::GreaterThanOrEqualToThreshold => ">=",
            ComparisonOperator::GreaterThanThreshold => ">",
            ComparisonOperator::LessThanThreshold => "<",
            ComparisonOperator::LessThanOrEqualToThreshold => "<=",
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = ComparisonOperatorParseError;

    /// Accepts the API name, the SCREAMING_SNAKE form, or the symbol.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.chars().filter(|c| *c != '_').collect();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(&normalized) || op.symbol() == s)
            .ok_or_else(|| ComparisonOperatorParseError(s.to_string()))
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statistic {
    Sum,
    Average,
    Minimum,
    Maximum,
    SampleCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricUnit {
    Count,
    Seconds,
    Milliseconds,
    Percent,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

/// `AWS::CloudWatch::Alarm` over a single metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CloudWatchAlarm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarm_description: Option<String>,
    pub comparison_operator: ComparisonOperator,
    pub threshold: f64,
    pub evaluation_periods: u32,
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
    /// Seconds.
    pub period: u32,
    pub statistic: Statistic,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<MetricUnit>,
}

impl CloudWatchAlarm {
    pub fn validate(&self) -> Result<(), String> {
        if self.namespace.trim().is_empty() {
            return Err("metric namespace is empty".to_string());
        }
        if self.metric_name.trim().is_empty() {
            return Err("metric name is empty".to_string());
        }
        for dim in &self.dimensions {
            if dim.name.trim().is_empty() || dim.value.trim().is_empty() {
                return Err("metric dimension name and value must be non-empty".to_string());
            }
        }
        if self.evaluation_periods < 1 {
            return Err("evaluation periods must be at least 1".to_string());
        }
        if self.period < 60 || self.period % 60 != 0 {
            return Err(format!("period {}s must be a positive multiple of 60", self.period));
        }
        if !self.threshold.is_finite() {
            return Err(format!("threshold {} is not a finite number", self.threshold));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alarm() -> CloudWatchAlarm {
        CloudWatchAlarm {
            alarm_description: None,
            comparison_operator: ComparisonOperator::default(),
            threshold: 1.0,
            evaluation_periods: 1,
            namespace: "orders".into(),
            metric_name: "CAUGHT_ROLLBACK_ERRORS".into(),
            dimensions: vec![Dimension {
                name: "OrdersApi".into(),
                value: "CAUGHT_ROLLBACK_ERRORS".into(),
            }],
            period: 60,
            statistic: Statistic::Sum,
            unit: Some(MetricUnit::Count),
        }
    }

    #[test]
    fn parses_operator_spellings() {
        let ge = ComparisonOperator::GreaterThanOrEqualToThreshold;
        assert_eq!("GreaterThanOrEqualToThreshold".parse::<ComparisonOperator>().unwrap(), ge);
        assert_eq!("GREATER_THAN_OR_EQUAL_TO_THRESHOLD".parse::<ComparisonOperator>().unwrap(), ge);
        assert_eq!(">=".parse::<ComparisonOperator>().unwrap(), ge);
        assert_eq!(
            "<".parse::<ComparisonOperator>().unwrap(),
            ComparisonOperator::LessThanThreshold
        );
        assert!("sideways".parse::<ComparisonOperator>().is_err());
    }

    #[test]
    fn validates_metric_identity() {
        assert!(alarm().validate().is_ok());

        let mut a = alarm();
        a.namespace = String::new();
        assert!(a.validate().unwrap_err().contains("namespace"));

        let mut a = alarm();
        a.metric_name = " ".into();
        assert!(a.validate().is_err());

        let mut a = alarm();
        a.dimensions[0].name.clear();
        assert!(a.validate().is_err());
    }

    #[test]
    fn validates_periods() {
        let mut a = alarm();
        a.evaluation_periods = 0;
        assert!(a.validate().is_err());

        let mut a = alarm();
        a.period = 0;
        assert!(a.validate().is_err());

        let mut a = alarm();
        a.period = 300;
        assert!(a.validate().is_ok());
    }

    #[test]
    fn serializes_for_template() {
        let value = serde_json::to_value(alarm()).unwrap();
        assert_eq!(value["ComparisonOperator"], "GreaterThanOrEqualToThreshold");
        assert_eq!(value["Statistic"], "Sum");
        assert_eq!(value["Unit"], "Count");
        assert_eq!(value["Dimensions"][0]["Name"], "OrdersApi");
    }
}
