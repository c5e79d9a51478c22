//! CodeDeploy application and deployment-group descriptors.

use serde::Serialize;

use crate::expr::Expr;

/// CodeDeploy accepts at most this many alarms per deployment group.
pub const MAX_ALARMS_PER_GROUP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComputePlatform {
    Lambda,
    Server,
    #[serde(rename = "ECS")]
    Ecs,
}

/// `AWS::CodeDeploy::Application`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodeDeployApplication {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_name: Option<String>,
    pub compute_platform: ComputePlatform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RollbackEvent {
    DeploymentFailure,
    DeploymentStopOnAlarm,
    DeploymentStopOnRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentStyle {
    pub deployment_type: String,
    pub deployment_option: String,
}

impl DeploymentStyle {
    pub fn blue_green_with_traffic_control() -> Self {
        Self {
            deployment_type: "BLUE_GREEN".to_string(),
            deployment_option: "WITH_TRAFFIC_CONTROL".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlarmRef {
    pub name: Expr,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlarmConfiguration {
    pub enabled: bool,
    pub alarms: Vec<AlarmRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutoRollbackConfiguration {
    pub enabled: bool,
    pub events: Vec<RollbackEvent>,
}

/// `AWS::CodeDeploy::DeploymentGroup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentGroup {
    pub application_name: Expr,
    pub service_role_arn: Expr,
    pub deployment_config_name: String,
    pub deployment_style: DeploymentStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarm_configuration: Option<AlarmConfiguration>,
    pub auto_rollback_configuration: AutoRollbackConfiguration,
}

impl DeploymentGroup {
    /// A Lambda blue/green group that rolls back on failed deployments.
    pub fn blue_green_lambda(
        application_name: Expr,
        service_role_arn: Expr,
        deployment_config_name: impl Into<String>,
    ) -> Self {
        Self {
            application_name,
            service_role_arn,
            deployment_config_name: deployment_config_name.into(),
            deployment_style: DeploymentStyle::blue_green_with_traffic_control(),
            alarm_configuration: None,
            auto_rollback_configuration: AutoRollbackConfiguration {
                enabled: true,
                events: vec![RollbackEvent::DeploymentFailure],
            },
        }
    }

    /// Gate deployments on an alarm: while it fires, CodeDeploy stops the
    /// traffic shift and rolls the alias back.
    pub fn add_alarm(&mut self, alarm_name: Expr) {
        let config = self.alarm_configuration.get_or_insert_with(AlarmConfiguration::default);
        config.enabled = true;
        config.alarms.push(AlarmRef { name: alarm_name });

        let rollback = &mut self.auto_rollback_configuration;
        rollback.enabled = true;
        if !rollback.events.contains(&RollbackEvent::DeploymentStopOnAlarm) {
            rollback.events.push(RollbackEvent::DeploymentStopOnAlarm);
        }
    }

    pub fn alarms(&self) -> &[AlarmRef] {
        self.alarm_configuration
            .as_ref()
            .map(|c| c.alarms.as_slice())
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.deployment_config_name.is_empty() {
            return Err("deployment config name is empty".to_string());
        }
        if self.alarms().len() > MAX_ALARMS_PER_GROUP {
            return Err(format!(
                "{} alarms attached, at most {MAX_ALARMS_PER_GROUP} allowed",
                self.alarms().len()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> DeploymentGroup {
        DeploymentGroup::blue_green_lambda(
            Expr::reference("App"),
            Expr::get_att("Role", "Arn"),
            "CodeDeployDefault.LambdaAllAtOnce",
        )
    }

    #[test]
    fn add_alarm_enables_stop_on_alarm_rollback() {
        let mut g = group();
        assert!(g.alarms().is_empty());
        assert!(g.alarm_configuration.is_none());

        g.add_alarm(Expr::reference("ErrorAlarm"));
        g.add_alarm(Expr::reference("LatencyAlarm"));

        assert_eq!(g.alarms().len(), 2);
        assert_eq!(
            g.auto_rollback_configuration.events,
            vec![RollbackEvent::DeploymentFailure, RollbackEvent::DeploymentStopOnAlarm]
        );
    }

    #[test]
    fn serializes_rollback_events() {
        let mut g = group();
        g.add_alarm(Expr::reference("ErrorAlarm"));
        let value = serde_json::to_value(&g).unwrap();
        assert_eq!(
            value["AutoRollbackConfiguration"]["Events"],
            serde_json::json!(["DEPLOYMENT_FAILURE", "DEPLOYMENT_STOP_ON_ALARM"])
        );
        assert_eq!(value["AlarmConfiguration"]["Alarms"][0]["Name"]["Ref"], "ErrorAlarm");
        assert_eq!(value["DeploymentStyle"]["DeploymentType"], "BLUE_GREEN");
    }

    #[test]
    fn too_many_alarms() {
        let mut g = group();
        for i in 0..=MAX_ALARMS_PER_GROUP {
            g.add_alarm(Expr::reference(format!("Alarm{i}")));
        }
        assert!(g.validate().is_err());
    }
}
