//! SSM parameter descriptor.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParameterType {
    String,
    StringList,
}

/// `AWS::SSM::Parameter`. `Ref` resolves to the parameter name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SsmParameter {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Type")]
    pub parameter_type: ParameterType,
    pub value: String,
}

impl SsmParameter {
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameter_type: ParameterType::String,
            value: value.into(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let name = &self.name;
        if name.is_empty() || name.len() > 2048 {
            return Err(format!("parameter name '{name}' must be 1-2048 characters"));
        }
        if name.contains("//") {
            return Err(format!("parameter name '{name}' has an empty path segment"));
        }
        if name.split('/').filter(|s| !s.is_empty()).count() > 15 {
            return Err(format!("parameter name '{name}' is nested deeper than 15 levels"));
        }
        if self.value.is_empty() {
            return Err("parameter value is empty".to_string());
        }
        Ok(())
    }
}
