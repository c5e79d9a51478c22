//! Container-image Lambda function with a blue/green rollout attached.
//!
//! The function reports caught errors as the `CAUGHT_ROLLBACK_ERRORS` metric
//! in its application's namespace; that metric drives the rollback alarm.

use std::collections::BTreeMap;

use pipestack_core::resource::lambda::{FunctionEnvironment, ImageCode, PackageType};
use pipestack_core::resource::{IamRole, LambdaFunction, LambdaVersion};
use pipestack_core::{
    Arn, DeclareError, DeclareResult, PolicyDocument, PolicyStatement, Resource, ResourceRef,
    Scope,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::alarm::{AlarmSpecInput, MetricIdentity};
use crate::blue_green::{BlueGreenDeployment, BlueGreenProps, DeploymentTarget};
use crate::strategy::DeploymentStrategy;

/// Metric name, and dimension value, the function emits on caught errors.
pub const ROLLBACK_METRIC_NAME: &str = "CAUGHT_ROLLBACK_ERRORS";

pub const DEFAULT_TIMEOUT_SECS: u32 = 30;
pub const DEFAULT_MEMORY_MB: u32 = 1024;
pub const DEFAULT_DD_VERSION: &str = "latest";
pub const DEFAULT_DD_SITE: &str = "datadoghq.com";
pub const DEFAULT_EXEC_WRAPPER: &str = "/opt/datadog_wrapper";

const BASIC_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// Hex digits of the configuration hash kept in the version's logical id.
const VERSION_HASH_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueGreenConfig {
    /// When false the function still gets an alias and deployment group,
    /// but every deployment shifts all traffic at once.
    pub enabled: bool,
    #[serde(default)]
    pub deployment_strategy: Option<String>,
    #[serde(default)]
    pub alias_name: Option<String>,
    #[serde(default)]
    pub alarm: AlarmSpecInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatadogConfig {
    pub dd_env: String,
    pub dd_api_key_secret_arn: String,
    #[serde(default)]
    pub dd_version: Option<String>,
    #[serde(default)]
    pub dd_site: Option<String>,
    #[serde(default)]
    pub aws_lambda_exec_wrapper: Option<String>,
}

/// One `[[lambdas]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerLambdaProps {
    pub name: String,
    pub application_name: String,
    pub ecr_repo_arn: String,
    /// Image tag, or a `sha256:` digest.
    pub ecr_image_tag: String,
    /// Extra environment; wins over the generated variables.
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    pub blue_green: BlueGreenConfig,
    pub datadog: DatadogConfig,
}

impl ContainerLambdaProps {
    /// Function environment: generated variables, then caller overrides.
    pub fn environment(&self) -> BTreeMap<String, String> {
        let dd = &self.datadog;
        let mut vars: BTreeMap<String, String> = [
            ("CLOUDWATCH_ROLLBACK_METRIC_NAME", ROLLBACK_METRIC_NAME),
            ("CLOUDWATCH_NAME_SPACE", self.application_name.as_str()),
            ("CLOUDWATCH_FUNCTION_NAME", self.name.as_str()),
            ("DD_SERVICE", self.application_name.as_str()),
            ("DD_ENV", dd.dd_env.as_str()),
            ("DD_VERSION", or_default(&dd.dd_version, DEFAULT_DD_VERSION)),
            ("DD_SITE", or_default(&dd.dd_site, DEFAULT_DD_SITE)),
            ("DD_API_KEY_SECRET_ARN", dd.dd_api_key_secret_arn.as_str()),
            (
                "AWS_LAMBDA_EXEC_WRAPPER",
                or_default(&dd.aws_lambda_exec_wrapper, DEFAULT_EXEC_WRAPPER),
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        vars.extend(self.env_vars.clone());
        vars
    }

    /// Strategy the deployment group is bound with.
    pub fn deployment_strategy(&self) -> Option<String> {
        if self.blue_green.enabled {
            self.blue_green.deployment_strategy.clone()
        } else {
            Some(DeploymentStrategy::AllAtOnce.config_name().to_string())
        }
    }

    pub fn metric(&self) -> MetricIdentity {
        MetricIdentity {
            namespace: self.application_name.clone(),
            metric_name: ROLLBACK_METRIC_NAME.to_string(),
            dimension_name: self.name.clone(),
            dimension_value: ROLLBACK_METRIC_NAME.to_string(),
        }
    }
}

/// An unset or empty setting takes `default`.
fn or_default<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

/// Handles to a declared container Lambda.
#[derive(Debug, Clone)]
pub struct ContainerLambda {
    pub function: ResourceRef,
    pub role: ResourceRef,
    pub version: ResourceRef,
    pub deployment: BlueGreenDeployment,
}

impl ContainerLambda {
    pub fn declare<S: Scope + ?Sized>(
        scope: &mut S,
        props: &ContainerLambdaProps,
    ) -> DeclareResult<Self> {
        let name = props.name.as_str();
        let repository = Arn::parse(&props.ecr_repo_arn)?;
        let image_uri = repository.ecr_image_uri(&props.ecr_image_tag)?;

        let role = scope.declare(
            &format!("{name}ServiceRole"),
            Resource::new(execution_role(props, &repository)),
        )?;

        let function = LambdaFunction {
            function_name: None,
            package_type: PackageType::Image,
            code: ImageCode {
                image_uri: image_uri.clone(),
            },
            role: role.arn(),
            timeout: DEFAULT_TIMEOUT_SECS,
            memory_size: DEFAULT_MEMORY_MB,
            environment: Some(FunctionEnvironment {
                variables: props.environment(),
            }),
        };
        let hash = configuration_hash(&function)?;
        let function = scope.declare(name, Resource::new(function).depends_on(role.logical_id()))?;

        // A new configuration hash means a new version, which moves the
        // alias and starts a deployment.
        let version = scope.declare(
            &format!("{name}CurrentVersion{hash}"),
            Resource::new(LambdaVersion {
                function_name: function.reference(),
                description: None,
            }),
        )?;

        let deployment = BlueGreenDeployment::bind(
            scope,
            &format!("{name}BlueGreen"),
            &DeploymentTarget {
                function: function.clone(),
                version: version.clone(),
                alias_name: props.blue_green.alias_name.clone(),
            },
            &BlueGreenProps {
                metric: props.metric(),
                deployment_strategy: props.deployment_strategy(),
                alarm: props.blue_green.alarm.clone(),
            },
        )?;

        info!(
            function = name,
            image = %image_uri,
            blue_green = props.blue_green.enabled,
            version = %version.logical_id(),
            "container lambda declared"
        );

        Ok(Self {
            function,
            role,
            version,
            deployment,
        })
    }
}

fn execution_role(props: &ContainerLambdaProps, repository: &Arn) -> IamRole {
    let mut role = IamRole::new(PolicyDocument::service_trust(["lambda.amazonaws.com"]))
        .with_managed_policy(BASIC_EXECUTION_POLICY_ARN);

    role.add_to_policy(
        PolicyStatement::allow()
            .action("secretsmanager:GetSecretValue")
            .resource(props.datadog.dd_api_key_secret_arn.as_str()),
    );
    role.add_to_policy(
        PolicyStatement::allow()
            .sid("cloudWatchPermissions")
            .action("cloudwatch:PutMetricData")
            .resource("*")
            .condition(
                "StringEquals",
                "cloudwatch:namespace",
                props.application_name.as_str(),
            ),
    );
    role.add_to_policy(
        PolicyStatement::allow()
            .actions([
                "ecr:BatchCheckLayerAvailability",
                "ecr:GetDownloadUrlForLayer",
                "ecr:BatchGetImage",
            ])
            .resource(repository.to_string()),
    );
    role.add_to_policy(
        PolicyStatement::allow()
            .action("ecr:GetAuthorizationToken")
            .resource("*"),
    );
    role
}

fn configuration_hash(function: &LambdaFunction) -> DeclareResult<String> {
    let bytes = serde_json::to_vec(function).map_err(|e| DeclareError::Serialize(e.to_string()))?;
    let mut digest = hex::encode(Sha256::digest(&bytes));
    digest.truncate(VERSION_HASH_LEN);
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipestack_core::{Expr, Stack, StackEnv};

    fn props() -> ContainerLambdaProps {
        ContainerLambdaProps {
            name: "OrdersApi".into(),
            application_name: "orders".into(),
            ecr_repo_arn: "arn:aws:ecr:eu-west-1:123456789012:repository/orders/api".into(),
            ecr_image_tag: "v1".into(),
            env_vars: BTreeMap::new(),
            blue_green: BlueGreenConfig {
                enabled: true,
                deployment_strategy: Some(
                    "CodeDeployDefault.LambdaCanary10Percent5Minutes".into(),
                ),
                alias_name: None,
                alarm: AlarmSpecInput::default(),
            },
            datadog: DatadogConfig {
                dd_env: "dev".into(),
                dd_api_key_secret_arn: "arn:aws:secretsmanager:eu-west-1:123456789012:secret:dd"
                    .into(),
                dd_version: None,
                dd_site: None,
                aws_lambda_exec_wrapper: None,
            },
        }
    }

    fn stack() -> Stack {
        Stack::new("lambdas", StackEnv::new("123456789012", "eu-west-1"))
    }

    #[test]
    fn environment_defaults_and_overrides() {
        let mut p = props();
        let env = p.environment();
        assert_eq!(env["CLOUDWATCH_ROLLBACK_METRIC_NAME"], "CAUGHT_ROLLBACK_ERRORS");
        assert_eq!(env["CLOUDWATCH_NAME_SPACE"], "orders");
        assert_eq!(env["CLOUDWATCH_FUNCTION_NAME"], "OrdersApi");
        assert_eq!(env["DD_VERSION"], "latest");
        assert_eq!(env["DD_SITE"], "datadoghq.com");
        assert_eq!(env["AWS_LAMBDA_EXEC_WRAPPER"], "/opt/datadog_wrapper");

        p.datadog.dd_site = Some("datadoghq.eu".into());
        p.env_vars.insert("DD_ENV".into(), "staging".into());
        p.env_vars.insert("FEATURE_X".into(), "on".into());
        let env = p.environment();
        assert_eq!(env["DD_SITE"], "datadoghq.eu");
        assert_eq!(env["DD_ENV"], "staging");
        assert_eq!(env["FEATURE_X"], "on");
    }

    #[test]
    fn empty_datadog_settings_use_defaults() {
        let mut p = props();
        p.datadog.dd_version = Some(String::new());
        p.datadog.dd_site = Some(String::new());
        p.datadog.aws_lambda_exec_wrapper = Some(String::new());
        let env = p.environment();
        assert_eq!(env["DD_VERSION"], DEFAULT_DD_VERSION);
        assert_eq!(env["DD_SITE"], DEFAULT_DD_SITE);
        assert_eq!(env["AWS_LAMBDA_EXEC_WRAPPER"], DEFAULT_EXEC_WRAPPER);
    }

    #[test]
    fn declares_function_role_version_and_rollout() {
        let mut s = stack();
        let lambda = ContainerLambda::declare(&mut s, &props()).unwrap();

        assert_eq!(lambda.function.logical_id(), "OrdersApi");
        assert!(lambda.version.logical_id().starts_with("OrdersApiCurrentVersion"));
        assert_eq!(
            lambda.deployment.strategy,
            DeploymentStrategy::Canary10Percent5Minutes
        );
        assert_eq!(lambda.deployment.alias.logical_id(), "OrdersApiBlueGreenAlias");

        let t = s.synth().unwrap();
        let function = &t["Resources"]["OrdersApi"]["Properties"];
        assert_eq!(function["PackageType"], "Image");
        assert_eq!(
            function["Code"]["ImageUri"],
            "123456789012.dkr.ecr.eu-west-1.amazonaws.com/orders/api:v1"
        );
        assert_eq!(function["Timeout"], 30);
        assert_eq!(function["MemorySize"], 1024);
        assert_eq!(function["Role"]["Fn::GetAtt"][0], "OrdersApiServiceRole");

        let alarm = &t["Resources"]["OrdersApiBlueGreenBlueGreenErrorAlarm"]["Properties"];
        assert_eq!(alarm["Namespace"], "orders");
        assert_eq!(alarm["MetricName"], "CAUGHT_ROLLBACK_ERRORS");
        assert_eq!(alarm["Dimensions"][0]["Name"], "OrdersApi");
        assert_eq!(alarm["Dimensions"][0]["Value"], "CAUGHT_ROLLBACK_ERRORS");
    }

    #[test]
    fn execution_role_statements() {
        let mut s = stack();
        ContainerLambda::declare(&mut s, &props()).unwrap();
        let role = s
            .resource("OrdersApiServiceRole")
            .and_then(|r| r.properties.as_role())
            .unwrap();

        let statements = role.statements();
        let cw = statements
            .iter()
            .find(|st| st.sid.as_deref() == Some("cloudWatchPermissions"))
            .unwrap();
        assert_eq!(cw.actions, vec!["cloudwatch:PutMetricData"]);
        assert_eq!(
            cw.conditions["StringEquals"]["cloudwatch:namespace"],
            serde_json::json!("orders")
        );
        assert!(statements.iter().any(|st| {
            st.actions == vec!["secretsmanager:GetSecretValue"]
                && st.resources
                    == vec![Expr::literal(
                        "arn:aws:secretsmanager:eu-west-1:123456789012:secret:dd",
                    )]
        }));
        assert!(statements.iter().any(|st| {
            st.actions.contains(&"ecr:BatchGetImage".to_string())
                && st.resources
                    == vec![Expr::literal(
                        "arn:aws:ecr:eu-west-1:123456789012:repository/orders/api",
                    )]
        }));
    }

    #[test]
    fn new_image_tag_means_new_version() {
        let mut a = stack();
        let mut b = stack();
        let first = ContainerLambda::declare(&mut a, &props()).unwrap();
        let mut p = props();
        p.ecr_image_tag = "v2".into();
        let second = ContainerLambda::declare(&mut b, &p).unwrap();
        assert_ne!(first.version.logical_id(), second.version.logical_id());

        let mut c = stack();
        let again = ContainerLambda::declare(&mut c, &props()).unwrap();
        assert_eq!(first.version.logical_id(), again.version.logical_id());
    }

    #[test]
    fn disabled_blue_green_is_all_at_once() {
        let mut p = props();
        p.blue_green.enabled = false;
        let mut s = stack();
        let lambda = ContainerLambda::declare(&mut s, &p).unwrap();
        assert_eq!(lambda.deployment.strategy, DeploymentStrategy::AllAtOnce);
    }

    #[test]
    fn invalid_repository_arn() {
        let mut p = props();
        p.ecr_repo_arn = "orders/api".into();
        let err = ContainerLambda::declare(&mut stack(), &p).unwrap_err();
        assert!(matches!(err, DeclareError::InvalidArn(_)));
    }

    #[test]
    fn same_name_twice_collides() {
        let mut s = stack();
        ContainerLambda::declare(&mut s, &props()).unwrap();
        assert!(matches!(
            ContainerLambda::declare(&mut s, &props()),
            Err(DeclareError::DuplicateId { .. })
        ));
    }

    #[test]
    fn deserializes_from_toml_shape() {
        let p: ContainerLambdaProps = serde_json::from_value(serde_json::json!({
            "name": "OrdersApi",
            "application_name": "orders",
            "ecr_repo_arn": "arn:aws:ecr:eu-west-1:123456789012:repository/orders/api",
            "ecr_image_tag": "v1",
            "blue_green": { "enabled": true, "alarm": { "threshold": 3.0 } },
            "datadog": { "dd_env": "dev", "dd_api_key_secret_arn": "arn:aws:secretsmanager:eu-west-1:1:secret:x" }
        }))
        .unwrap();
        assert!(p.env_vars.is_empty());
        assert_eq!(p.blue_green.alarm.threshold, Some(3.0));
        assert_eq!(p.deployment_strategy(), None);
    }
}
