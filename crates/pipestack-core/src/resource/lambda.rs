//! Lambda function, version, and alias descriptors.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Serialize;

use crate::expr::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PackageType {
    Image,
    Zip,
}

/// Container image location for an image-packaged function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageCode {
    pub image_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionEnvironment {
    pub variables: BTreeMap<String, String>,
}

/// `AWS::Lambda::Function` backed by a container image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LambdaFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    pub package_type: PackageType,
    pub code: ImageCode,
    pub role: Expr,
    /// Seconds.
    pub timeout: u32,
    /// Megabytes.
    pub memory_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<FunctionEnvironment>,
}

impl LambdaFunction {
    pub fn validate(&self) -> Result<(), String> {
        if self.code.image_uri.is_empty() {
            return Err("image URI is empty".to_string());
        }
        if !(1..=900).contains(&self.timeout) {
            return Err(format!("timeout {}s outside 1..=900", self.timeout));
        }
        if !(128..=10240).contains(&self.memory_size) {
            return Err(format!("memory size {}MB outside 128..=10240", self.memory_size));
        }
        if let Some(env) = &self.environment {
            let key_re = Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").map_err(|e| e.to_string())?;
            if let Some(bad) = env.variables.keys().find(|k| !key_re.is_match(k)) {
                return Err(format!("invalid environment variable name '{bad}'"));
            }
        }
        Ok(())
    }
}

/// `AWS::Lambda::Version`: an immutable snapshot of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LambdaVersion {
    pub function_name: Expr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `AWS::Lambda::Alias`: stable name pointing at one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LambdaAlias {
    pub name: String,
    pub function_name: Expr,
    pub function_version: Expr,
}

impl LambdaAlias {
    pub fn validate(&self) -> Result<(), String> {
        let name = &self.name;
        if name.is_empty() || name.len() > 128 {
            return Err(format!("alias name '{name}' must be 1-128 characters"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(format!("alias name '{name}' may only contain letters, digits, '-' and '_'"));
        }
        // Purely numeric names are reserved for versions.
        if name.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("alias name '{name}' cannot be numeric"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alias(name: &str) -> LambdaAlias {
        LambdaAlias {
            name: name.to_string(),
            function_name: Expr::reference("Fn"),
            function_version: Expr::get_att("FnVersion", "Version"),
        }
    }

    #[test]
    fn alias_names() {
        assert!(alias("prod").validate().is_ok());
        assert!(alias("live_v2-blue").validate().is_ok());
        assert!(alias("").validate().is_err());
        assert!(alias("42").validate().is_err());
        assert!(alias("has space").validate().is_err());
    }

    #[test]
    fn function_limits() {
        let mut function = LambdaFunction {
            function_name: None,
            package_type: PackageType::Image,
            code: ImageCode {
                image_uri: "1.dkr.ecr.eu-west-1.amazonaws.com/a:v1".into(),
            },
            role: Expr::get_att("Role", "Arn"),
            timeout: 30,
            memory_size: 1024,
            environment: Some(FunctionEnvironment {
                variables: BTreeMap::from([("DD_ENV".into(), "dev".into())]),
            }),
        };
        assert!(function.validate().is_ok());

        function.memory_size = 64;
        assert!(function.validate().is_err());
        function.memory_size = 1024;

        function
            .environment
            .as_mut()
            .unwrap()
            .variables
            .insert("1BAD".into(), "x".into());
        assert!(function.validate().unwrap_err().contains("1BAD"));
    }
}
