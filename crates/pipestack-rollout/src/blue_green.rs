//! Blue/green Lambda deployment with alarm-gated rollback.
//!
//! Binding a target declares, in order: an alias over the function's current
//! version, a CodeDeploy deployment group that shifts that alias according
//! to the resolved strategy, and a threshold alarm on the rollback metric
//! attached to the group. Publishing a new version moves the alias, which
//! CodeDeploy turns into a traffic shift; while the alarm fires CodeDeploy
//! stops the shift and points the alias back at the previous version.
//!
//! Every step is a declaration into the [`Scope`]; the first failure is
//! returned as-is and nothing already declared is undone.

use pipestack_core::resource::codedeploy::ComputePlatform;
use pipestack_core::resource::{
    CodeDeployApplication, DeploymentGroup, IamRole, LambdaAlias,
};
use pipestack_core::resource::{CodeDeployLambdaAliasUpdate, UpdatePolicy};
use pipestack_core::{
    DeclareError, DeclareResult, PolicyDocument, Resource, ResourceRef, Scope,
};
use tracing::{debug, info};

use crate::alarm::{AlarmSpec, AlarmSpecInput, MetricIdentity};
use crate::strategy::DeploymentStrategy;

/// Alias used when the target does not name one.
pub const DEFAULT_ALIAS_NAME: &str = "prod";

/// Managed policy CodeDeploy needs to shift Lambda alias traffic.
pub const CODEDEPLOY_LAMBDA_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AWSCodeDeployRoleForLambdaLimited";

/// A versioned function and the alias traffic is shifted under.
#[derive(Debug, Clone)]
pub struct DeploymentTarget {
    pub function: ResourceRef,
    /// The function's current published version.
    pub version: ResourceRef,
    pub alias_name: Option<String>,
}

/// What to deploy with and what to watch.
#[derive(Debug, Clone)]
pub struct BlueGreenProps {
    pub metric: MetricIdentity,
    /// CodeDeploy deployment config name; resolved leniently.
    pub deployment_strategy: Option<String>,
    pub alarm: AlarmSpecInput,
}

/// Handles to everything a bind declared.
#[derive(Debug, Clone)]
pub struct BlueGreenDeployment {
    pub strategy: DeploymentStrategy,
    pub alias: ResourceRef,
    pub application: ResourceRef,
    pub service_role: ResourceRef,
    pub deployment_group: ResourceRef,
    pub alarm: ResourceRef,
    pub alarm_spec: AlarmSpec,
}

impl BlueGreenDeployment {
    /// Declare the alias, deployment group, and rollback alarm for `target`.
    ///
    /// Resources are named `{id}Alias`, `{id}BGDeploy`, and
    /// `{id}BlueGreenErrorAlarm`; reusing `id` within one scope fails with
    /// [`DeclareError::DuplicateId`].
    pub fn bind<S: Scope + ?Sized>(
        scope: &mut S,
        id: &str,
        target: &DeploymentTarget,
        props: &BlueGreenProps,
    ) -> DeclareResult<Self> {
        let strategy = DeploymentStrategy::resolve(props.deployment_strategy.as_deref());

        let alias_name = target
            .alias_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_ALIAS_NAME);
        let alias = scope.declare(
            &format!("{id}Alias"),
            Resource::new(LambdaAlias {
                name: alias_name.to_string(),
                function_name: target.function.reference(),
                function_version: target.version.get_att("Version"),
            }),
        )?;

        let group_id = format!("{id}BGDeploy");
        let application = scope.declare(
            &format!("{group_id}Application"),
            Resource::new(CodeDeployApplication {
                application_name: None,
                compute_platform: ComputePlatform::Lambda,
            }),
        )?;
        let service_role = scope.declare(
            &format!("{group_id}ServiceRole"),
            Resource::new(
                IamRole::new(PolicyDocument::service_trust(["codedeploy.amazonaws.com"]))
                    .with_managed_policy(CODEDEPLOY_LAMBDA_POLICY_ARN),
            ),
        )?;
        let deployment_group = scope.declare(
            &group_id,
            Resource::new(DeploymentGroup::blue_green_lambda(
                application.reference(),
                service_role.arn(),
                strategy.config_name(),
            )),
        )?;
        scope.resource_mut(&alias)?.update_policy = Some(UpdatePolicy {
            code_deploy_lambda_alias_update: CodeDeployLambdaAliasUpdate {
                application_name: application.reference(),
                deployment_group_name: deployment_group.reference(),
            },
        });
        debug!(%id, alias = alias_name, strategy = %strategy, "deployment group declared");

        let alarm_spec = props.alarm.resolve(props.metric.clone());
        let metric = alarm_spec.metric();
        let alarm = scope.declare(
            &format!("{id}BlueGreenErrorAlarm"),
            Resource::new(alarm_spec.to_alarm(&metric)),
        )?;

        deployment_group_mut(scope, &deployment_group)?.add_alarm(alarm.reference());

        info!(
            %id,
            alias = alias_name,
            strategy = %strategy,
            namespace = %metric.namespace,
            metric = %metric.metric_name,
            "blue/green deployment bound"
        );

        Ok(Self {
            strategy,
            alias,
            application,
            service_role,
            deployment_group,
            alarm,
            alarm_spec,
        })
    }
}

fn deployment_group_mut<'a, S: Scope + ?Sized>(
    scope: &'a mut S,
    reference: &ResourceRef,
) -> DeclareResult<&'a mut DeploymentGroup> {
    let resource = scope.resource_mut(reference)?;
    let actual = resource.type_name();
    resource
        .properties
        .as_deployment_group_mut()
        .ok_or_else(|| DeclareError::KindMismatch {
            id: reference.logical_id().to_string(),
            expected: "AWS::CodeDeploy::DeploymentGroup",
            actual,
        })
}
