//! pipestack blue/green rollouts: strategies, rollback alarms, container functions.
//!
//! This crate wires Lambda functions for gradual deployment. A deployment
//! strategy picks the CodeDeploy traffic-shift curve, and a rollback alarm
//! on the function's caught-error metric stops the shift and reverts the
//! alias while it fires.
//!
//! # Components
//!
//! - **`strategy`**: Strategy names and lenient resolution
//! - **`alarm`**: Rollback alarm parameters and defaults
//! - **`blue_green`**: Alias, deployment group, and alarm binding
//! - **`lambda`**: Container-image function with a blue/green rollout

pub mod alarm;
pub mod blue_green;
pub mod lambda;
pub mod strategy;

pub use alarm::{AlarmSpec, AlarmSpecInput, Metric, MetricIdentity};
pub use blue_green::{BlueGreenDeployment, BlueGreenProps, DeploymentTarget};
pub use lambda::{BlueGreenConfig, ContainerLambda, ContainerLambdaProps, DatadogConfig};
pub use strategy::{
    DeploymentStrategy, Resolution, ResolvedFrom, StrategyParseError, TrafficShift, resolve,
};
