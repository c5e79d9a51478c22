//! Resource descriptors accepted by a [`Stack`](crate::Stack).
//!
//! Each descriptor is a typed view of one CloudFormation resource type's
//! properties. `ResourceProperties` ties them together and serializes to
//! the `{ "Type": ..., "Properties": ... }` pair a template expects;
//! [`Resource`] adds the resource-level attributes.

pub mod cloudwatch;
pub mod codedeploy;
pub mod ecr;
pub mod iam;
pub mod lambda;
pub mod ssm;

use serde::Serialize;

use crate::expr::Expr;

pub use cloudwatch::{CloudWatchAlarm, ComparisonOperator, Dimension, MetricUnit, Statistic};
pub use codedeploy::{CodeDeployApplication, ComputePlatform, DeploymentGroup, RollbackEvent};
pub use ecr::{EcrRepository, TagMutability};
pub use iam::{IamPolicy, IamRole, InlinePolicy, ManagedPolicy};
pub use lambda::{LambdaAlias, LambdaFunction, LambdaVersion};
pub use ssm::SsmParameter;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Type", content = "Properties")]
pub enum ResourceProperties {
    #[serde(rename = "AWS::Lambda::Function")]
    LambdaFunction(LambdaFunction),
    #[serde(rename = "AWS::Lambda::Version")]
    LambdaVersion(LambdaVersion),
    #[serde(rename = "AWS::Lambda::Alias")]
    LambdaAlias(LambdaAlias),
    #[serde(rename = "AWS::CodeDeploy::Application")]
    CodeDeployApplication(CodeDeployApplication),
    #[serde(rename = "AWS::CodeDeploy::DeploymentGroup")]
    DeploymentGroup(DeploymentGroup),
    #[serde(rename = "AWS::CloudWatch::Alarm")]
    CloudWatchAlarm(CloudWatchAlarm),
    #[serde(rename = "AWS::IAM::Role")]
    IamRole(IamRole),
    #[serde(rename = "AWS::IAM::Policy")]
    IamPolicy(IamPolicy),
    #[serde(rename = "AWS::IAM::ManagedPolicy")]
    ManagedPolicy(ManagedPolicy),
    #[serde(rename = "AWS::ECR::Repository")]
    EcrRepository(EcrRepository),
    #[serde(rename = "AWS::SSM::Parameter")]
    SsmParameter(SsmParameter),
}

/// Generates `type_name`, typed accessors, and `From` conversions for
/// every variant. The type strings must match the serde renames above.
macro_rules! resource_kinds {
    ($($variant:ident => $type_name:literal, $as_ref:ident, $as_mut:ident;)*) => {
        impl ResourceProperties {
            pub fn type_name(&self) -> &'static str {
                match self {
                    $(ResourceProperties::$variant(_) => $type_name,)*
                }
            }

            $(
                pub fn $as_ref(&self) -> Option<&$variant> {
                    match self {
                        ResourceProperties::$variant(p) => Some(p),
                        _ => None,
                    }
                }

                pub fn $as_mut(&mut self) -> Option<&mut $variant> {
                    match self {
                        ResourceProperties::$variant(p) => Some(p),
                        _ => None,
                    }
                }
            )*
        }

        $(
            impl From<$variant> for ResourceProperties {
                fn from(props: $variant) -> Self {
                    ResourceProperties::$variant(props)
                }
            }
        )*
    };
}

resource_kinds! {
    LambdaFunction => "AWS::Lambda::Function", as_lambda_function, as_lambda_function_mut;
    LambdaVersion => "AWS::Lambda::Version", as_lambda_version, as_lambda_version_mut;
    LambdaAlias => "AWS::Lambda::Alias", as_lambda_alias, as_lambda_alias_mut;
    CodeDeployApplication => "AWS::CodeDeploy::Application", as_codedeploy_application, as_codedeploy_application_mut;
    DeploymentGroup => "AWS::CodeDeploy::DeploymentGroup", as_deployment_group, as_deployment_group_mut;
    CloudWatchAlarm => "AWS::CloudWatch::Alarm", as_alarm, as_alarm_mut;
    IamRole => "AWS::IAM::Role", as_role, as_role_mut;
    IamPolicy => "AWS::IAM::Policy", as_policy, as_policy_mut;
    ManagedPolicy => "AWS::IAM::ManagedPolicy", as_managed_policy, as_managed_policy_mut;
    EcrRepository => "AWS::ECR::Repository", as_ecr_repository, as_ecr_repository_mut;
    SsmParameter => "AWS::SSM::Parameter", as_ssm_parameter, as_ssm_parameter_mut;
}

impl ResourceProperties {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ResourceProperties::LambdaFunction(p) => p.validate(),
            ResourceProperties::LambdaVersion(_) => Ok(()),
            ResourceProperties::LambdaAlias(p) => p.validate(),
            ResourceProperties::CodeDeployApplication(_) => Ok(()),
            ResourceProperties::DeploymentGroup(p) => p.validate(),
            ResourceProperties::CloudWatchAlarm(p) => p.validate(),
            ResourceProperties::IamRole(p) => p.validate(),
            ResourceProperties::IamPolicy(p) => p.validate(),
            ResourceProperties::ManagedPolicy(p) => p.validate(),
            ResourceProperties::EcrRepository(p) => p.validate(),
            ResourceProperties::SsmParameter(p) => p.validate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

/// Hands alias version changes to CodeDeploy instead of updating in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodeDeployLambdaAliasUpdate {
    pub application_name: Expr,
    pub deployment_group_name: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatePolicy {
    #[serde(rename = "CodeDeployLambdaAliasUpdate")]
    pub code_deploy_lambda_alias_update: CodeDeployLambdaAliasUpdate,
}

/// A resource declaration: properties plus resource-level attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub properties: ResourceProperties,
    pub depends_on: Vec<String>,
    pub deletion_policy: Option<DeletionPolicy>,
    pub update_policy: Option<UpdatePolicy>,
}

impl Resource {
    pub fn new(properties: impl Into<ResourceProperties>) -> Self {
        Self {
            properties: properties.into(),
            depends_on: Vec::new(),
            deletion_policy: None,
            update_policy: None,
        }
    }

    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.properties.type_name()
    }

    /// Render the template entry for this resource.
    pub fn to_template(&self) -> serde_json::Result<serde_json::Value> {
        let mut value = serde_json::to_value(&self.properties)?;
        if let Some(entry) = value.as_object_mut() {
            if !self.depends_on.is_empty() {
                entry.insert("DependsOn".into(), serde_json::to_value(&self.depends_on)?);
            }
            if let Some(policy) = &self.deletion_policy {
                entry.insert("DeletionPolicy".into(), serde_json::to_value(policy)?);
                entry.insert("UpdateReplacePolicy".into(), serde_json::to_value(policy)?);
            }
            if let Some(policy) = &self.update_policy {
                entry.insert("UpdatePolicy".into(), serde_json::to_value(policy)?);
            }
        }
        Ok(value)
    }
}
