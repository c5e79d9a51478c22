//! Base toolkit policy: what a pipeline needs to run the CDK toolkit
//! against one bootstrapped environment.

use pipestack_core::resource::ManagedPolicy;
use pipestack_core::{DeclareResult, PolicyDocument, PolicyStatement, Resource, ResourceRef, Scope};
use tracing::debug;

use crate::config::EnvironmentConfig;

/// Physical name of the policy. The deploy role is granted access to it by
/// this name, so the two must agree.
pub fn policy_name(app_id: &str, environment_name: &str) -> String {
    format!("{app_id}-{environment_name}-base-toolkit-policy")
}

/// Declare the managed policy; its `Ref` is the policy ARN.
pub fn base_toolkit_policy<S: Scope + ?Sized>(
    scope: &mut S,
    app_id: &str,
    environment: &EnvironmentConfig,
) -> DeclareResult<ResourceRef> {
    let account = scope.account().to_string();
    let region = scope.region().to_string();
    let env = environment.environment_name.as_str();
    let qualifier = environment.bootstrap_qualifier.as_str();

    let cdk_roles = format!("arn:aws:iam::{account}:role/cdk-{qualifier}*");
    let app_roles = format!("arn:aws:iam::{account}:role/{app_id}-{env}*");

    let document = PolicyDocument::new(vec![
        PolicyStatement::allow()
            .sid("AllowAssumeCfExecRole")
            .actions(["sts:AssumeRole", "sts:TagSession"])
            .resources([cdk_roles.clone(), app_roles.clone()]),
        PolicyStatement::allow()
            .sid("AllowSsmBootstrapVersionCheck")
            .action("ssm:*")
            .resource(format!(
                "arn:aws:ssm:{region}:{account}:parameter/cdk-bootstrap/{qualifier}/version"
            )),
        PolicyStatement::allow()
            .sid("PermissionsNeededForPolicyManagement")
            .actions([
                "iam:CreatePolicy",
                "iam:CreatePolicyVersion",
                "iam:DeletePolicyVersion",
                "iam:ListPolicyVersions",
                "iam:GetPolicy",
                "iam:DeletePolicy",
            ])
            .resource(format!("arn:aws:iam::{account}:policy/{app_id}-{env}*")),
        PolicyStatement::allow()
            .sid("PermissionsNeededForRoleManagement")
            .actions([
                "iam:GetRole",
                "iam:CreateRole",
                "iam:GetRolePolicy",
                "iam:AttachRolePolicy",
                "iam:DeleteRolePolicy",
                "iam:DeleteRole",
                "iam:DetachRolePolicy",
                "iam:UntagRole",
                "iam:PutRolePolicy",
                "iam:TagRole",
                "iam:ListRoleTags",
            ])
            .resources([app_roles, cdk_roles.clone()]),
        PolicyStatement::allow()
            .sid("PermissionsNeededForPassRole")
            .action("iam:PassRole")
            .resource(cdk_roles),
    ]);

    // One policy per environment, so the construct id carries the name.
    let reference = scope.declare(
        &format!("{env}-base-toolkit-policy"),
        Resource::new(ManagedPolicy {
            managed_policy_name: Some(policy_name(app_id, env)),
            policy_document: document,
        }),
    )?;
    debug!(environment = env, "base toolkit policy declared");
    Ok(reference)
}
