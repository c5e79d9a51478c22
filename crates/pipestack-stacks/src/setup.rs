//! Setup stack: one-time account setup for an application's pipeline.
//!
//! Declares the registries, tag parameters, and GitHub roles a pipeline
//! needs, and collects the statements the CloudFormation execution role
//! must hold to deploy them (see [`crate::deploy_permissions`]).

use pipestack_core::{DeclareResult, PolicyStatement, Stack, StackEnv};
use tracing::info;

use crate::config::SetupConfig;
use crate::{ecr, github, ssm, toolkit_policy};

/// Length of the stack id prefix the `iam:PassRole` grant is scoped to.
const PASS_ROLE_PREFIX_LEN: usize = 25;

#[derive(Debug, Clone)]
pub struct SetupStack {
    pub stack: Stack,
    /// Statements the execution role needs to deploy this stack.
    pub policy_statements: Vec<PolicyStatement>,
}

impl SetupStack {
    pub fn new(id: &str, env: StackEnv, props: &SetupConfig) -> DeclareResult<Self> {
        let mut stack = Stack::new(id, env.clone())
            .with_description(format!("Pipeline setup for {}", props.app_id));
        let StackEnv { account, region } = env;
        let app_id = props.app_id.as_str();
        let short_id: String = id.chars().take(PASS_ROLE_PREFIX_LEN).collect();

        let mut policy_statements = vec![
            PolicyStatement::allow()
                .sid("iamPermissions")
                .action("iam:PassRole")
                .resource(format!("arn:aws:iam::{account}:role/{short_id}*")),
        ];

        if let Some(ecr_config) = &props.ecr {
            ecr::repositories(&mut stack, ecr_config)?;
            for environment in &props.environments {
                let env_name = environment.environment_name.as_str();
                let parameter = ssm::image_tag_parameter(&mut stack, app_id, env_name)?;
                stack.add_output(&format!("{env_name}-SsmImageTagName"), parameter, None)?;
            }
            let push_role =
                github::ecr_push_role(&mut stack, &props.github, &ecr_config.registry_name)?;
            stack.add_output("GithubEcrPushRoleArn", push_role.arn(), None)?;

            policy_statements.push(
                PolicyStatement::allow()
                    .sid("EcrPermissions")
                    .actions([
                        "ecr:CreateRepository",
                        "ecr:TagResource",
                        "ecr:SetRepositoryPolicy",
                        "ecr:DeleteRepository",
                    ])
                    .resources(ecr_config.repositories.iter().map(|repo| {
                        ecr::repository_arn(&region, &account, &ecr_config.registry_name, repo)
                    })),
            );
            policy_statements.push(
                PolicyStatement::allow()
                    .sid("SsmPermissions")
                    .actions([
                        "ssm:PutParameter",
                        "ssm:DeleteParameter",
                        "ssm:AddTagsToResource",
                    ])
                    .resources(props.environments.iter().map(|environment| {
                        format!(
                            "arn:aws:ssm:{region}:{account}:parameter{}",
                            ssm::image_tag_parameter_name(app_id, &environment.environment_name)
                        )
                    })),
            );
        }

        for environment in &props.environments {
            let env_name = environment.environment_name.as_str();
            let role = github::deploy_role(&mut stack, &props.github, app_id, environment)?;
            let policy = toolkit_policy::base_toolkit_policy(&mut stack, app_id, environment)?;
            stack.add_output(&format!("{env_name}-GithubDeployRoleArn"), role.arn(), None)?;
            stack.add_output(&format!("{env_name}-CdkBasePolicyArn"), policy.reference(), None)?;
        }

        info!(
            stack = id,
            app_id,
            environments = props.environments.len(),
            ecr = props.ecr.is_some(),
            resources = stack.len(),
            "setup stack declared"
        );
        Ok(Self {
            stack,
            policy_statements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EcrConfig, EnvironmentConfig, GithubConfig};
    use pipestack_core::Expr;

    fn props(ecr: bool) -> SetupConfig {
        SetupConfig {
            app_id: "orders".into(),
            github: GithubConfig {
                owner: "acme".into(),
                repo: "orders".into(),
            },
            environments: vec![
                EnvironmentConfig {
                    environment_name: "dev".into(),
                    bootstrap_qualifier: "hnb659fds".into(),
                },
                EnvironmentConfig {
                    environment_name: "prod".into(),
                    bootstrap_qualifier: "hnb659fds".into(),
                },
            ],
            ecr: ecr.then(|| EcrConfig {
                registry_name: "orders".into(),
                repositories: vec!["api".into()],
            }),
        }
    }

    fn env() -> StackEnv {
        StackEnv::new("123456789012", "eu-west-1")
    }

    #[test]
    fn pass_role_scoped_to_short_id() {
        let setup = SetupStack::new("orders-pipeline-setup-stack-long", env(), &props(false)).unwrap();
        let pass_role = &setup.policy_statements[0];
        assert_eq!(pass_role.sid.as_deref(), Some("iamPermissions"));
        assert_eq!(
            pass_role.resources,
            vec![Expr::literal(
                "arn:aws:iam::123456789012:role/orders-pipeline-setup-sta*"
            )]
        );
        assert_eq!(setup.policy_statements.len(), 1);
    }

    #[test]
    fn without_ecr_only_deploy_roles() {
        let setup = SetupStack::new("orders-setup", env(), &props(false)).unwrap();
        let s = &setup.stack;
        assert_eq!(s.resources_of_type("AWS::IAM::Role").count(), 2);
        assert_eq!(s.resources_of_type("AWS::IAM::ManagedPolicy").count(), 2);
        assert_eq!(s.resources_of_type("AWS::ECR::Repository").count(), 0);
        assert!(s.output("devGithubDeployRoleArn").is_some());
        assert!(s.output("prodCdkBasePolicyArn").is_some());
        assert!(s.output("GithubEcrPushRoleArn").is_none());
    }

    #[test]
    fn with_ecr_adds_registry_parameters_and_push_role() {
        let setup = SetupStack::new("orders-setup", env(), &props(true)).unwrap();
        let s = &setup.stack;
        assert_eq!(s.resources_of_type("AWS::ECR::Repository").count(), 1);
        assert_eq!(s.resources_of_type("AWS::SSM::Parameter").count(), 2);
        assert_eq!(s.resources_of_type("AWS::IAM::Role").count(), 3);

        let sids: Vec<_> = setup
            .policy_statements
            .iter()
            .filter_map(|st| st.sid.as_deref())
            .collect();
        assert_eq!(sids, vec!["iamPermissions", "EcrPermissions", "SsmPermissions"]);
        assert_eq!(
            setup.policy_statements[2].resources[1],
            Expr::literal("arn:aws:ssm:eu-west-1:123456789012:parameter/orders/prod/tags")
        );

        let t = s.synth().unwrap();
        assert_eq!(t["Outputs"]["devSsmImageTagName"]["Value"], "/orders/dev/tags");
        assert_eq!(
            t["Outputs"]["GithubEcrPushRoleArn"]["Value"]["Fn::GetAtt"][0],
            "ecrpushrole"
        );
    }
}
