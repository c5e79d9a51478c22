//! Container registries for an application's images.

use std::collections::BTreeMap;

use pipestack_core::resource::ecr::ImageScanningConfiguration;
use pipestack_core::resource::{EcrRepository, TagMutability};
use pipestack_core::{
    DeclareResult, DeletionPolicy, PolicyDocument, PolicyStatement, Principal, Resource,
    ResourceRef, Scope,
};
use serde_json::json;
use tracing::debug;

use crate::config::EcrConfig;

/// Declare `<registry>/<repo>` for every configured repository: immutable
/// tags, scan on push, removed with the stack, pullable by Lambda and ECS
/// from the same account and region.
pub fn repositories<S: Scope + ?Sized>(
    scope: &mut S,
    ecr: &EcrConfig,
) -> DeclareResult<Vec<ResourceRef>> {
    let account = scope.account().to_string();
    let region = scope.region().to_string();

    ecr.repositories
        .iter()
        .map(|repo| {
            let pull = PolicyStatement::allow()
                .principal(Principal::Service(vec![
                    "lambda.amazonaws.com".to_string(),
                    "ecs.amazonaws.com".to_string(),
                ]))
                .actions(["ecr:BatchGetImage", "ecr:GetDownloadUrlForLayer"])
                .with_conditions(BTreeMap::from([(
                    "ArnLike".to_string(),
                    BTreeMap::from([(
                        "aws:sourceArn".to_string(),
                        json!([
                            format!("arn:aws:ecs:{region}:{account}:*"),
                            format!("arn:aws:lambda:{region}:{account}:function:*"),
                        ]),
                    )]),
                )]));

            let repository = EcrRepository {
                image_scanning_configuration: ImageScanningConfiguration { scan_on_push: true },
                image_tag_mutability: TagMutability::Immutable,
                repository_policy_text: Some(PolicyDocument::new(vec![pull])),
                ..EcrRepository::new(format!("{}/{repo}", ecr.registry_name))
            };
            let reference = scope.declare(
                repo,
                Resource::new(repository).with_deletion_policy(DeletionPolicy::Delete),
            )?;
            debug!(registry = %ecr.registry_name, repository = %repo, "ecr repository declared");
            Ok(reference)
        })
        .collect()
}

/// ARN of a repository declared by [`repositories`].
pub fn repository_arn(region: &str, account: &str, registry: &str, repo: &str) -> String {
    format!("arn:aws:ecr:{region}:{account}:repository/{registry}/{repo}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipestack_core::{DeclareError, Stack, StackEnv};

    fn config(repositories: &[&str]) -> EcrConfig {
        EcrConfig {
            registry_name: "orders".into(),
            repositories: repositories.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn declares_immutable_scanned_repositories() {
        let mut s = Stack::new("setup", StackEnv::new("123456789012", "eu-west-1"));
        let refs = repositories(&mut s, &config(&["api", "worker"])).unwrap();
        assert_eq!(refs.len(), 2);

        let t = s.synth().unwrap();
        let api = &t["Resources"]["api"];
        assert_eq!(api["DeletionPolicy"], "Delete");
        assert_eq!(api["Properties"]["RepositoryName"], "orders/api");
        assert_eq!(api["Properties"]["ImageTagMutability"], "IMMUTABLE");
        assert_eq!(
            api["Properties"]["ImageScanningConfiguration"]["ScanOnPush"],
            true
        );
        let statement = &api["Properties"]["RepositoryPolicyText"]["Statement"][0];
        assert_eq!(
            statement["Principal"]["Service"],
            json!(["lambda.amazonaws.com", "ecs.amazonaws.com"])
        );
        assert_eq!(
            statement["Condition"]["ArnLike"]["aws:sourceArn"][1],
            "arn:aws:lambda:eu-west-1:123456789012:function:*"
        );
    }

    #[test]
    fn duplicate_repository_collides() {
        let mut s = Stack::new("setup", StackEnv::new("123456789012", "eu-west-1"));
        let err = repositories(&mut s, &config(&["api", "api"])).unwrap_err();
        assert!(matches!(err, DeclareError::DuplicateId { .. }));
    }

    #[test]
    fn arn_format() {
        assert_eq!(
            repository_arn("eu-west-1", "123456789012", "orders", "api"),
            "arn:aws:ecr:eu-west-1:123456789012:repository/orders/api"
        );
    }
}
