//! Amazon Resource Name parsing.

use std::fmt;

use crate::error::{DeclareError, DeclareResult};

/// A parsed ARN: `arn:{partition}:{service}:{region}:{account}:{resource}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account: String,
    /// Everything after the fifth colon, e.g. `repository/team/api`.
    pub resource: String,
}

impl Arn {
    pub fn parse(arn: &str) -> DeclareResult<Self> {
        let mut parts = arn.splitn(6, ':');
        let prefix = parts.next();
        if prefix != Some("arn") {
            return Err(DeclareError::InvalidArn(arn.to_string()));
        }
        let mut field = || {
            parts
                .next()
                .map(str::to_string)
                .ok_or_else(|| DeclareError::InvalidArn(arn.to_string()))
        };
        let partition = field()?;
        let service = field()?;
        let region = field()?;
        let account = field()?;
        let resource = field()?;

        if partition.is_empty() || service.is_empty() || resource.is_empty() {
            return Err(DeclareError::InvalidArn(arn.to_string()));
        }

        Ok(Arn {
            partition,
            service,
            region,
            account,
            resource,
        })
    }

    /// Repository name of an ECR repository ARN (`repository/{name}`).
    pub fn ecr_repository_name(&self) -> DeclareResult<&str> {
        if self.service != "ecr" {
            return Err(DeclareError::InvalidArn(format!(
                "{self} is not an ECR repository"
            )));
        }
        self.resource
            .strip_prefix("repository/")
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DeclareError::InvalidArn(format!("{self} is not an ECR repository")))
    }

    /// Registry-qualified image URI for an ECR repository ARN.
    pub fn ecr_image_uri(&self, tag_or_digest: &str) -> DeclareResult<String> {
        let name = self.ecr_repository_name()?;
        let separator = if tag_or_digest.starts_with("sha256:") {
            '@'
        } else {
            ':'
        };
        Ok(format!(
            "{}.dkr.ecr.{}.{}/{}{}{}",
            self.account,
            self.region,
            self.url_suffix(),
            name,
            separator,
            tag_or_digest
        ))
    }

    fn url_suffix(&self) -> &'static str {
        if self.partition == "aws-cn" {
            "amazonaws.com.cn"
        } else {
            "amazonaws.com"
        }
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account, self.resource
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ecr_repository() {
        let arn = Arn::parse("arn:aws:ecr:eu-west-1:123456789012:repository/orders/api").unwrap();
        assert_eq!(arn.service, "ecr");
        assert_eq!(arn.region, "eu-west-1");
        assert_eq!(arn.account, "123456789012");
        assert_eq!(arn.ecr_repository_name().unwrap(), "orders/api");
    }

    #[test]
    fn resource_keeps_colons() {
        let arn = Arn::parse("arn:aws:secretsmanager:us-east-1:1:secret:dd-key-AbCd").unwrap();
        assert_eq!(arn.resource, "secret:dd-key-AbCd");
        assert_eq!(
            arn.to_string(),
            "arn:aws:secretsmanager:us-east-1:1:secret:dd-key-AbCd"
        );
    }

    #[test]
    fn image_uri_with_tag_and_digest() {
        let arn = Arn::parse("arn:aws:ecr:eu-west-1:123456789012:repository/orders/api").unwrap();
        assert_eq!(
            arn.ecr_image_uri("v1").unwrap(),
            "123456789012.dkr.ecr.eu-west-1.amazonaws.com/orders/api:v1"
        );
        assert_eq!(
            arn.ecr_image_uri("sha256:abc").unwrap(),
            "123456789012.dkr.ecr.eu-west-1.amazonaws.com/orders/api@sha256:abc"
        );
    }

    #[test]
    fn rejects_malformed() {
        assert!(Arn::parse("not-an-arn").is_err());
        assert!(Arn::parse("arn:aws:ecr:eu-west-1").is_err());
        assert!(Arn::parse("arn::ecr:r:a:repository/x").is_err());
    }

    #[test]
    fn rejects_non_ecr_for_image_uri() {
        let arn = Arn::parse("arn:aws:s3:::bucket").unwrap();
        assert!(arn.ecr_image_uri("v1").is_err());
    }
}
