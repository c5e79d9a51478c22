//! ECR repository descriptor.

use regex::Regex;
use serde::Serialize;

use crate::iam::PolicyDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagMutability {
    Mutable,
    Immutable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageScanningConfiguration {
    pub scan_on_push: bool,
}

/// `AWS::ECR::Repository`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EcrRepository {
    pub repository_name: String,
    pub image_scanning_configuration: ImageScanningConfiguration,
    pub image_tag_mutability: TagMutability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_policy_text: Option<PolicyDocument>,
}

impl EcrRepository {
    pub fn new(repository_name: impl Into<String>) -> Self {
        Self {
            repository_name: repository_name.into(),
            image_scanning_configuration: ImageScanningConfiguration { scan_on_push: false },
            image_tag_mutability: TagMutability::Mutable,
            repository_policy_text: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let name = &self.repository_name;
        if !(2..=256).contains(&name.len()) {
            return Err(format!("repository name '{name}' must be 2-256 characters"));
        }
        let name_re = Regex::new(r"^(?:[a-z0-9]+(?:[._-][a-z0-9]+)*/)*[a-z0-9]+(?:[._-][a-z0-9]+)*$")
            .map_err(|e| e.to_string())?;
        if !name_re.is_match(name) {
            return Err(format!(
                "repository name '{name}' must be lowercase path segments of letters, digits, '.', '_' or '-'"
            ));
        }
        if let Some(policy) = &self.repository_policy_text {
            policy.validate().map_err(|e| format!("repository policy: {e}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_names() {
        assert!(EcrRepository::new("orders/api").validate().is_ok());
        assert!(EcrRepository::new("orders/api-v2.worker").validate().is_ok());
        assert!(EcrRepository::new("Orders/API").validate().is_err());
        assert!(EcrRepository::new("orders//api").validate().is_err());
        assert!(EcrRepository::new("a").validate().is_err());
    }

    #[test]
    fn serializes_immutable_tags() {
        let mut repo = EcrRepository::new("orders/api");
        repo.image_tag_mutability = TagMutability::Immutable;
        let value = serde_json::to_value(&repo).unwrap();
        assert_eq!(value["ImageTagMutability"], "IMMUTABLE");
        assert_eq!(value["ImageScanningConfiguration"]["ScanOnPush"], false);
    }
}
