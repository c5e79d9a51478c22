//! IAM policy documents and statements.
//!
//! Statements are built with a small fluent API and serialize directly to
//! the JSON grammar IAM expects, so a `PolicyDocument` can be embedded in
//! any resource property that takes one.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::expr::Expr;

/// IAM policy language version.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Condition block: operator → (condition key → value or list of values).
pub type Conditions = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

/// Who a statement applies to. Only used in trust and resource policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Principal {
    Federated(String),
    Service(Vec<String>),
    #[serde(rename = "AWS")]
    Aws(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(rename = "Action")]
    pub actions: Vec<String>,
    #[serde(rename = "Resource", skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Expr>,
    #[serde(rename = "Condition", skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: Conditions,
}

impl PolicyStatement {
    pub fn allow() -> Self {
        Self::default()
    }

    pub fn deny() -> Self {
        Self {
            effect: Effect::Deny,
            ..Self::default()
        }
    }

    pub fn sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn resource(mut self, resource: impl Into<Expr>) -> Self {
        self.resources.push(resource.into());
        self
    }

    pub fn resources<I, E>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        self.resources.extend(resources.into_iter().map(Into::into));
        self
    }

    pub fn principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn condition(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.conditions
            .entry(operator.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Structural checks IAM would reject at deploy time anyway.
    pub fn validate(&self) -> Result<(), String> {
        if self.actions.is_empty() {
            return Err(match &self.sid {
                Some(sid) => format!("statement '{sid}' has no actions"),
                None => "statement has no actions".to_string(),
            });
        }
        if self.actions.iter().any(|a| a.is_empty()) {
            return Err("statement contains an empty action".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statements: Vec<PolicyStatement>,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statements,
        }
    }

    /// Trust policy for OIDC web-identity federation.
    pub fn web_identity_trust(provider_arn: impl Into<String>, conditions: Conditions) -> Self {
        Self::new(vec![
            PolicyStatement::allow()
                .principal(Principal::Federated(provider_arn.into()))
                .action("sts:AssumeRoleWithWebIdentity")
                .with_conditions(conditions),
        ])
    }

    /// Trust policy letting AWS services assume the role.
    pub fn service_trust<I, S>(services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(vec![
            PolicyStatement::allow()
                .principal(Principal::Service(
                    services.into_iter().map(Into::into).collect(),
                ))
                .action("sts:AssumeRole"),
        ])
    }

    pub fn push(&mut self, statement: PolicyStatement) {
        self.statements.push(statement);
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.statements.is_empty() {
            return Err("policy document has no statements".to_string());
        }
        self.statements.iter().try_for_each(PolicyStatement::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statement_serializes_in_iam_grammar() {
        let stmt = PolicyStatement::allow()
            .sid("cloudWatchPermissions")
            .action("cloudwatch:PutMetricData")
            .resource("*")
            .condition("StringEquals", "cloudwatch:namespace", "orders");

        let value = serde_json::to_value(&stmt).unwrap();
        assert_eq!(
            value,
            json!({
                "Sid": "cloudWatchPermissions",
                "Effect": "Allow",
                "Action": ["cloudwatch:PutMetricData"],
                "Resource": ["*"],
                "Condition": { "StringEquals": { "cloudwatch:namespace": "orders" } }
            })
        );
    }

    #[test]
    fn web_identity_trust_has_no_resource() {
        let mut conditions = Conditions::new();
        conditions.entry("StringEquals".into()).or_default().insert(
            "token.actions.githubusercontent.com:aud".into(),
            json!("sts.amazonaws.com"),
        );
        let doc = PolicyDocument::web_identity_trust("arn:aws:iam::1:oidc-provider/x", conditions);
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["Version"], "2012-10-17");
        let stmt = &value["Statement"][0];
        assert_eq!(stmt["Principal"], json!({ "Federated": "arn:aws:iam::1:oidc-provider/x" }));
        assert_eq!(stmt["Action"], json!(["sts:AssumeRoleWithWebIdentity"]));
        assert!(stmt.get("Resource").is_none());
    }

    #[test]
    fn service_trust_lists_services() {
        let doc = PolicyDocument::service_trust(["lambda.amazonaws.com"]);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value["Statement"][0]["Principal"],
            json!({ "Service": ["lambda.amazonaws.com"] })
        );
    }

    #[test]
    fn validate_rejects_empty() {
        assert!(PolicyDocument::default().validate().is_err());
        let doc = PolicyDocument::new(vec![PolicyStatement::allow().sid("Empty")]);
        let err = doc.validate().unwrap_err();
        assert!(err.contains("Empty"));
    }
}
