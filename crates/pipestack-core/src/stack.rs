//! Stack: the declaration scope every construct writes into.
//!
//! A construct never talks to the provisioning engine directly. It declares
//! typed resources into a [`Scope`], gets back a [`ResourceRef`] it can wire
//! into other resources, and the scope renders the whole graph as a
//! CloudFormation template at the end. The scope is the only place that
//! rejects a declaration: duplicate ids, invalid descriptors, and references
//! to resources that were never declared all surface here as
//! [`DeclareError`]s, unmodified by the constructs that triggered them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{DeclareError, DeclareResult};
use crate::expr::Expr;
use crate::resource::Resource;

/// Template format version emitted by [`Stack::synth`].
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Maximum logical id length accepted by CloudFormation.
const MAX_LOGICAL_ID_LEN: usize = 255;

/// Account and region a stack deploys into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEnv {
    pub account: String,
    pub region: String,
}

impl StackEnv {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }
}

/// Handle to a declared resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    logical_id: String,
    type_name: &'static str,
}

impl ResourceRef {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// `{ "Ref": logical_id }`: the resource's primary identifier.
    pub fn reference(&self) -> Expr {
        Expr::reference(&self.logical_id)
    }

    pub fn get_att(&self, attribute: &str) -> Expr {
        Expr::get_att(&self.logical_id, attribute)
    }

    pub fn arn(&self) -> Expr {
        self.get_att("Arn")
    }
}

/// The declaration surface constructs are written against.
pub trait Scope {
    fn env(&self) -> &StackEnv;

    /// Declare a resource under a construct id. The id is unique per scope.
    fn declare(&mut self, id: &str, resource: Resource) -> DeclareResult<ResourceRef>;

    /// Mutable access to an already declared resource.
    fn resource_mut(&mut self, reference: &ResourceRef) -> DeclareResult<&mut Resource>;

    fn account(&self) -> &str {
        &self.env().account
    }

    fn region(&self) -> &str {
        &self.env().region
    }
}

/// Derive a template logical id from a construct id by dropping every
/// character that is not an ASCII letter or digit.
pub fn logical_id(id: &str) -> DeclareResult<String> {
    let logical: String = id.chars().filter(char::is_ascii_alphanumeric).collect();
    if logical.is_empty() || logical.len() > MAX_LOGICAL_ID_LEN {
        return Err(DeclareError::InvalidId(id.to_string()));
    }
    Ok(logical)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub value: Expr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<OutputExport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutputExport {
    pub name: String,
}

/// An in-memory CloudFormation stack.
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    env: StackEnv,
    description: Option<String>,
    resources: BTreeMap<String, Resource>,
    outputs: BTreeMap<String, Output>,
}

impl Stack {
    pub fn new(name: impl Into<String>, env: StackEnv) -> Self {
        Self {
            name: name.into(),
            env,
            description: None,
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Declared resources in logical-id order.
    pub fn resources(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.resources.iter().map(|(id, r)| (id.as_str(), r))
    }

    /// Resources of one CloudFormation type.
    pub fn resources_of_type<'a>(
        &'a self,
        type_name: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Resource)> + 'a {
        self.resources()
            .filter(move |(_, r)| r.type_name() == type_name)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn output(&self, id: &str) -> Option<&Output> {
        self.outputs.get(id)
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&str, &Output)> {
        self.outputs.iter().map(|(id, o)| (id.as_str(), o))
    }

    /// Expose a value as a stack output.
    pub fn add_output(
        &mut self,
        id: &str,
        value: impl Into<Expr>,
        export_name: Option<String>,
    ) -> DeclareResult<()> {
        let logical = logical_id(id)?;
        if self.outputs.contains_key(&logical) {
            return Err(DeclareError::DuplicateId {
                stack: self.name.clone(),
                id: id.to_string(),
            });
        }
        self.outputs.insert(
            logical,
            Output {
                value: value.into(),
                description: None,
                export: export_name.map(|name| OutputExport { name }),
            },
        );
        Ok(())
    }

    /// Render the stack as a CloudFormation template.
    ///
    /// Every resource is re-validated (constructs may have mutated them after
    /// declaration) and every `Ref`/`Fn::GetAtt` must point at a declared
    /// resource or a pseudo parameter.
    pub fn synth(&self) -> DeclareResult<Value> {
        let mut resources = Map::new();
        for (id, resource) in &self.resources {
            validate(id, resource)?;
            let entry = resource
                .to_template()
                .map_err(|e| DeclareError::Serialize(e.to_string()))?;
            self.check_references(id, &entry)?;
            for dep in &resource.depends_on {
                self.check_target(id, dep)?;
            }
            resources.insert(id.clone(), entry);
        }

        let mut outputs = Map::new();
        for (id, output) in &self.outputs {
            let entry =
                serde_json::to_value(output).map_err(|e| DeclareError::Serialize(e.to_string()))?;
            self.check_references(id, &entry)?;
            outputs.insert(id.clone(), entry);
        }

        let mut template = json!({
            "AWSTemplateFormatVersion": TEMPLATE_FORMAT_VERSION,
            "Resources": resources,
        });
        if let Some(description) = &self.description {
            template["Description"] = json!(description);
        }
        if !outputs.is_empty() {
            template["Outputs"] = Value::Object(outputs);
        }
        Ok(template)
    }

    pub fn to_json_pretty(&self) -> DeclareResult<String> {
        let template = self.synth()?;
        serde_json::to_string_pretty(&template).map_err(|e| DeclareError::Serialize(e.to_string()))
    }

    fn check_references(&self, from: &str, value: &Value) -> DeclareResult<()> {
        let mut targets = Vec::new();
        collect_references(value, &mut targets);
        targets
            .into_iter()
            .try_for_each(|target| self.check_target(from, target))
    }

    fn check_target(&self, from: &str, target: &str) -> DeclareResult<()> {
        if target.starts_with("AWS::") || self.resources.contains_key(target) {
            return Ok(());
        }
        Err(DeclareError::DanglingReference {
            from: from.to_string(),
            to: target.to_string(),
        })
    }
}

impl Scope for Stack {
    fn env(&self) -> &StackEnv {
        &self.env
    }

    fn declare(&mut self, id: &str, resource: Resource) -> DeclareResult<ResourceRef> {
        let logical = logical_id(id)?;
        if self.resources.contains_key(&logical) {
            return Err(DeclareError::DuplicateId {
                stack: self.name.clone(),
                id: id.to_string(),
            });
        }
        validate(id, &resource)?;

        let type_name = resource.type_name();
        debug!(stack = %self.name, logical_id = %logical, kind = type_name, "resource declared");
        self.resources.insert(logical.clone(), resource);
        Ok(ResourceRef {
            logical_id: logical,
            type_name,
        })
    }

    fn resource_mut(&mut self, reference: &ResourceRef) -> DeclareResult<&mut Resource> {
        let resource = self
            .resources
            .get_mut(reference.logical_id())
            .ok_or_else(|| DeclareError::NotFound(reference.logical_id().to_string()))?;
        if resource.type_name() != reference.type_name() {
            return Err(DeclareError::KindMismatch {
                id: reference.logical_id().to_string(),
                expected: reference.type_name(),
                actual: resource.type_name(),
            });
        }
        Ok(resource)
    }
}

fn validate(id: &str, resource: &Resource) -> DeclareResult<()> {
    resource
        .properties
        .validate()
        .map_err(|reason| DeclareError::Validation {
            kind: resource.type_name(),
            id: id.to_string(),
            reason,
        })
}

/// Collect every logical id named by a `Ref` or `Fn::GetAtt` in `value`.
fn collect_references<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                match (key.as_str(), inner) {
                    ("Ref", Value::String(target)) => out.push(target),
                    ("Fn::GetAtt", Value::Array(parts)) => {
                        if let Some(Value::String(target)) = parts.first() {
                            out.push(target);
                        }
                    }
                    _ => collect_references(inner, out),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_references(item, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{LambdaAlias, SsmParameter};

    fn stack() -> Stack {
        Stack::new("test", StackEnv::new("123456789012", "eu-west-1"))
    }

    fn param(name: &str) -> Resource {
        Resource::new(SsmParameter::string(name, "{}"))
    }

    #[test]
    fn declare_returns_sanitized_logical_id() {
        let mut s = stack();
        let r = s.declare("dev-tag-parameter", param("/orders/dev/tags")).unwrap();
        assert_eq!(r.logical_id(), "devtagparameter");
        assert_eq!(r.type_name(), "AWS::SSM::Parameter");
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut s = stack();
        s.declare("Param", param("/a")).unwrap();
        let err = s.declare("Param", param("/b")).unwrap_err();
        assert_eq!(
            err,
            DeclareError::DuplicateId {
                stack: "test".into(),
                id: "Param".into()
            }
        );
        // Ids that sanitize to the same logical id collide too.
        assert!(matches!(
            s.declare("Par-am", param("/c")),
            Err(DeclareError::DuplicateId { .. })
        ));
    }

    #[test]
    fn invalid_ids_and_descriptors() {
        let mut s = stack();
        assert!(matches!(
            s.declare("---", param("/a")),
            Err(DeclareError::InvalidId(_))
        ));
        let err = s.declare("Empty", param("")).unwrap_err();
        assert!(matches!(
            err,
            DeclareError::Validation {
                kind: "AWS::SSM::Parameter",
                ..
            }
        ));
        assert!(s.is_empty());
    }

    #[test]
    fn resource_mut_checks_kind() {
        let mut s = stack();
        let r = s.declare("Param", param("/a")).unwrap();
        assert!(s.resource_mut(&r).is_ok());

        let forged = ResourceRef {
            logical_id: "Param".into(),
            type_name: "AWS::Lambda::Alias",
        };
        assert!(matches!(
            s.resource_mut(&forged),
            Err(DeclareError::KindMismatch { .. })
        ));
    }

    #[test]
    fn synth_renders_template() {
        let mut s = stack().with_description("setup");
        let r = s.declare("Param", param("/orders/dev/tags")).unwrap();
        s.add_output("dev-SsmImageTagName", "/orders/dev/tags", None)
            .unwrap();
        s.add_output("ParamRef", r.reference(), Some("orders-param".into()))
            .unwrap();

        let t = s.synth().unwrap();
        assert_eq!(t["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(t["Description"], "setup");
        assert_eq!(t["Resources"]["Param"]["Type"], "AWS::SSM::Parameter");
        assert_eq!(t["Outputs"]["devSsmImageTagName"]["Value"], "/orders/dev/tags");
        assert_eq!(t["Outputs"]["ParamRef"]["Value"]["Ref"], "Param");
        assert_eq!(t["Outputs"]["ParamRef"]["Export"]["Name"], "orders-param");
    }

    #[test]
    fn synth_rejects_dangling_references() {
        let mut s = stack();
        s.declare(
            "Alias",
            Resource::new(LambdaAlias {
                name: "prod".into(),
                function_name: Expr::reference("Missing"),
                function_version: Expr::get_att("MissingVersion", "Version"),
            }),
        )
        .unwrap();
        let err = s.synth().unwrap_err();
        assert!(matches!(err, DeclareError::DanglingReference { .. }));
    }

    #[test]
    fn pseudo_parameters_are_not_dangling() {
        let mut s = stack();
        s.add_output("Account", Expr::reference("AWS::AccountId"), None)
            .unwrap();
        assert!(s.synth().is_ok());
    }

    #[test]
    fn duplicate_output_is_rejected() {
        let mut s = stack();
        s.add_output("Out", "a", None).unwrap();
        assert!(matches!(
            s.add_output("Out", "b", None),
            Err(DeclareError::DuplicateId { .. })
        ));
    }
}
