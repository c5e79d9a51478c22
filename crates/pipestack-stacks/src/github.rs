//! Roles GitHub Actions assumes through the account's OIDC provider.

use std::collections::BTreeMap;

use pipestack_core::resource::IamRole;
use pipestack_core::{
    Conditions, DeclareResult, PolicyDocument, PolicyStatement, Resource, ResourceRef, Scope,
};
use serde_json::json;
use tracing::debug;

use crate::config::{EnvironmentConfig, GithubConfig};

pub const OIDC_PROVIDER_HOST: &str = "token.actions.githubusercontent.com";
const OIDC_AUDIENCE: &str = "sts.amazonaws.com";

pub fn oidc_provider_arn(account: &str) -> String {
    format!("arn:aws:iam::{account}:oidc-provider/{OIDC_PROVIDER_HOST}")
}

fn main_branch_subject(github: &GithubConfig) -> String {
    format!("repo:{}/{}:ref:refs/heads/main", github.owner, github.repo)
}

/// Role the build workflow on `main` uses to push images to the registry.
pub fn ecr_push_role<S: Scope + ?Sized>(
    scope: &mut S,
    github: &GithubConfig,
    registry: &str,
) -> DeclareResult<ResourceRef> {
    let account = scope.account().to_string();
    let region = scope.region().to_string();

    let conditions: Conditions = BTreeMap::from([(
        "StringEquals".to_string(),
        BTreeMap::from([
            (format!("{OIDC_PROVIDER_HOST}:aud"), json!(OIDC_AUDIENCE)),
            (format!("{OIDC_PROVIDER_HOST}:sub"), json!(main_branch_subject(github))),
        ]),
    )]);
    let mut role = IamRole::new(PolicyDocument::web_identity_trust(
        oidc_provider_arn(&account),
        conditions,
    ));
    role.add_to_policy(
        PolicyStatement::allow()
            .actions([
                "ecr:GetAuthorizationToken",
                "ecr:BatchCheckLayerAvailability",
                "ecr:GetDownloadUrlForLayer",
                "ecr:GetRepositoryPolicy",
                "ecr:DescribeRepositories",
                "ecr:ListImages",
                "ecr:DescribeImages",
                "ecr:BatchGetImage",
                "ecr:InitiateLayerUpload",
                "ecr:UploadLayerPart",
                "ecr:CompleteLayerUpload",
                "ecr:PutImage",
            ])
            .resource(format!("arn:aws:ecr:{region}:{account}:repository/{registry}/*")),
    );
    role.add_to_policy(
        PolicyStatement::allow()
            .action("ecr:GetAuthorizationToken")
            .resource("*"),
    );

    let reference = scope.declare("ecr-push-role", Resource::new(role))?;
    debug!(registry, "github ecr push role declared");
    Ok(reference)
}

/// Role the deploy workflow uses for one environment. Trusted from `main`
/// and from the matching GitHub environment.
pub fn deploy_role<S: Scope + ?Sized>(
    scope: &mut S,
    github: &GithubConfig,
    app_id: &str,
    environment: &EnvironmentConfig,
) -> DeclareResult<ResourceRef> {
    let account = scope.account().to_string();
    let region = scope.region().to_string();
    let env = environment.environment_name.as_str();
    let qualifier = environment.bootstrap_qualifier.as_str();

    let conditions: Conditions = BTreeMap::from([
        (
            "StringEquals".to_string(),
            BTreeMap::from([(format!("{OIDC_PROVIDER_HOST}:aud"), json!(OIDC_AUDIENCE))]),
        ),
        (
            "ForAnyValue:StringEquals".to_string(),
            BTreeMap::from([(
                format!("{OIDC_PROVIDER_HOST}:sub"),
                json!([
                    main_branch_subject(github),
                    format!("repo:{}/{}:environment:{env}", github.owner, github.repo),
                ]),
            )]),
        ),
    ]);
    let mut role = IamRole::new(PolicyDocument::web_identity_trust(
        oidc_provider_arn(&account),
        conditions,
    ));

    let cdk_roles = format!("arn:aws:iam::{account}:role/cdk-{qualifier}*");
    let bootstrap_version =
        format!("arn:aws:ssm:{region}:{account}:parameter/cdk-bootstrap/{qualifier}/version");

    let statements = [
        PolicyStatement::allow()
            .actions(["sts:AssumeRole", "sts:TagSession"])
            .resource(cdk_roles.as_str()),
        PolicyStatement::allow()
            .actions([
                "cloudformation:CreateChangeSet",
                "cloudformation:CreateStack",
                "cloudformation:DescribeChangeSet",
                "cloudformation:DeleteChangeSet",
                "cloudformation:DescribeStacks",
                "cloudformation:DescribeStackEvents",
                "cloudformation:ExecuteChangeSet",
                "cloudformation:GetTemplate",
                "cloudformation:ValidateTemplate",
                "cloudformation:DeleteStack",
            ])
            .resource(format!(
                "arn:aws:cloudformation:{region}:{account}:stack/cdk-toolkit-{app_id}-{env}/*"
            )),
        PolicyStatement::allow()
            .action("cloudformation:DescribeStacks")
            .resource(format!(
                "arn:aws:cloudformation:{region}:{account}:stack/{app_id}-{env}*"
            )),
        PolicyStatement::allow()
            .actions([
                "s3:CreateBucket",
                "s3:GetBucketLocation",
                "s3:ListBucket",
                "s3:GetObject",
                "s3:PutObject",
                "s3:PutEncryptionConfiguration",
                "s3:PutLifecycleConfiguration",
                "s3:PutBucketVersioning",
                "s3:PutBucketPublicAccessBlock",
                "s3:PutBucketPolicy",
                "s3:GetBucketPolicy",
                "s3:DeleteBucketPolicy",
            ])
            .resources([
                format!("arn:aws:s3:::cdk-{qualifier}-assets-{account}-{region}"),
                format!("arn:aws:s3:::cdk-{qualifier}-assets-{account}-{region}/*"),
            ]),
        PolicyStatement::allow()
            .actions([
                "iam:CreatePolicy",
                "iam:GetRole",
                "iam:CreateRole",
                "iam:TagRole",
                "iam:UntagRole",
                "iam:AttachRolePolicy",
                "iam:GetRolePolicy",
                "iam:DeleteRole",
                "iam:PutRolePolicy",
                "iam:DeleteRolePolicy",
                "iam:DetachRolePolicy",
                "iam:UpdateAssumeRolePolicy",
                "sts:AssumeRole",
                "sts:TagSession",
            ])
            .resources([
                cdk_roles.clone(),
                format!(
                    "arn:aws:iam::{account}:policy/{}",
                    crate::toolkit_policy::policy_name(app_id, env)
                ),
            ]),
        PolicyStatement::allow()
            .action("iam:ListPolicies")
            .resource("*"),
        PolicyStatement::allow()
            .actions([
                "ssm:GetParameter",
                "ssm:GetParameters",
                "ssm:PutParameter",
                "ssm:DeleteParameter",
                "ssm:AddTagsToResource",
            ])
            .resource(bootstrap_version),
        PolicyStatement::allow()
            .actions(["ssm:GetParameter", "ssm:GetParameters", "ssm:PutParameter"])
            .resource(format!(
                "arn:aws:ssm:{region}:{account}:parameter/{app_id}/{env}/*"
            )),
        PolicyStatement::allow()
            .action("ecr:DescribeRepositories")
            .resource(format!("arn:aws:ecr:{region}:{account}:repository/{app_id}/*")),
        PolicyStatement::allow()
            .actions([
                "ecr:CreateRepository",
                "ecr:DeleteRepository",
                "ecr:DescribeRepositories",
                "ecr:PutLifecyclePolicy",
                "ecr:SetRepositoryPolicy",
                "ecr:TagResource",
            ])
            .resource(format!(
                "arn:aws:ecr:{region}:{account}:repository/cdk-{qualifier}-container-assets-*"
            )),
    ];
    for statement in statements {
        role.add_to_policy(statement);
    }

    let reference = scope.declare(&format!("{env}-cdk-deploy-role"), Resource::new(role))?;
    debug!(environment = env, "github deploy role declared");
    Ok(reference)
}
