//! Deploy-permissions stack: extends the CDK bootstrap execution role.
//!
//! The bootstrap role CloudFormation deploys with is scoped down; this stack
//! attaches an inline policy holding exactly the statements another stack
//! needs (typically [`SetupStack::policy_statements`](crate::setup::SetupStack)).

use pipestack_core::resource::IamPolicy;
use pipestack_core::{DeclareResult, Expr, PolicyDocument, PolicyStatement, Resource, Scope, Stack, StackEnv};
use tracing::info;

/// Name of the CDK bootstrap CloudFormation execution role.
pub fn execution_role_name(qualifier: &str, env: &StackEnv) -> String {
    format!(
        "cdk-{qualifier}-cfn-exec-role-{}-{}",
        env.account, env.region
    )
}

pub fn policy_name(qualifier: &str, id: &str) -> String {
    format!("{qualifier}-{id}-deploy-permission")
}

#[derive(Debug, Clone)]
pub struct DeployPermissionsStack {
    pub stack: Stack,
    pub role_name: String,
}

impl DeployPermissionsStack {
    pub fn new(
        id: &str,
        env: StackEnv,
        qualifier: &str,
        statements: Vec<PolicyStatement>,
    ) -> DeclareResult<Self> {
        let role_name = execution_role_name(qualifier, &env);
        let mut stack = Stack::new(id, env)
            .with_description(format!("Deploy permissions for {role_name}"));

        let statement_count = statements.len();
        stack.declare(
            id,
            Resource::new(IamPolicy {
                policy_name: policy_name(qualifier, id),
                policy_document: PolicyDocument::new(statements),
                roles: vec![Expr::literal(&role_name)],
            }),
        )?;

        info!(stack = id, role = %role_name, statements = statement_count, "deploy permissions declared");
        Ok(Self { stack, role_name })
    }
}
