//! IAM role, inline policy, and managed policy descriptors.

use serde::Serialize;

use crate::expr::Expr;
use crate::iam::{PolicyDocument, PolicyStatement};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InlinePolicy {
    pub policy_name: String,
    pub policy_document: PolicyDocument,
}

/// `AWS::IAM::Role`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IamRole {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    pub assume_role_policy_document: PolicyDocument,
    #[serde(rename = "ManagedPolicyArns", skip_serializing_if = "Vec::is_empty")]
    pub managed_policy_arns: Vec<Expr>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<InlinePolicy>,
}

impl IamRole {
    /// Name of the inline policy that `add_to_policy` appends to.
    pub const DEFAULT_POLICY: &'static str = "DefaultPolicy";

    pub fn new(trust: PolicyDocument) -> Self {
        Self {
            role_name: None,
            assume_role_policy_document: trust,
            managed_policy_arns: Vec::new(),
            policies: Vec::new(),
        }
    }

    pub fn with_managed_policy(mut self, arn: impl Into<Expr>) -> Self {
        self.managed_policy_arns.push(arn.into());
        self
    }

    /// Append a statement to the role's default inline policy.
    pub fn add_to_policy(&mut self, statement: PolicyStatement) {
        match self
            .policies
            .iter_mut()
            .find(|p| p.policy_name == Self::DEFAULT_POLICY)
        {
            Some(policy) => policy.policy_document.push(statement),
            None => self.policies.push(InlinePolicy {
                policy_name: Self::DEFAULT_POLICY.to_string(),
                policy_document: PolicyDocument::new(vec![statement]),
            }),
        }
    }

    /// Statements of the default inline policy.
    pub fn statements(&self) -> &[PolicyStatement] {
        self.policies
            .iter()
            .find(|p| p.policy_name == Self::DEFAULT_POLICY)
            .map(|p| p.policy_document.statements.as_slice())
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), String> {
        self.assume_role_policy_document
            .validate()
            .map_err(|e| format!("trust policy: {e}"))?;
        for policy in &self.policies {
            policy
                .policy_document
                .validate()
                .map_err(|e| format!("policy '{}': {e}", policy.policy_name))?;
        }
        Ok(())
    }
}

/// `AWS::IAM::Policy`: an inline policy attached to existing roles.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IamPolicy {
    pub policy_name: String,
    pub policy_document: PolicyDocument,
    pub roles: Vec<Expr>,
}

impl IamPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.policy_name.is_empty() || self.policy_name.len() > 128 {
            return Err(format!(
                "policy name '{}' must be 1-128 characters",
                self.policy_name
            ));
        }
        if self.roles.is_empty() {
            return Err("policy is not attached to any role".to_string());
        }
        self.policy_document.validate()
    }
}

/// `AWS::IAM::ManagedPolicy`. `Ref` resolves to the policy ARN.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManagedPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_policy_name: Option<String>,
    pub policy_document: PolicyDocument,
}

impl ManagedPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.managed_policy_name {
            if name.is_empty() || name.len() > 128 {
                return Err(format!("managed policy name '{name}' must be 1-128 characters"));
            }
        }
        self.policy_document.validate()
    }
}
