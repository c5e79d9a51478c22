//! pipestack.toml configuration parser.

use std::collections::HashSet;
use std::path::Path;

use pipestack_core::StackEnv;
use pipestack_rollout::ContainerLambdaProps;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "pipestack.toml";
pub const ACCOUNT_ENV: &str = "PIPESTACK_ACCOUNT";
pub const REGION_ENV: &str = "PIPESTACK_REGION";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid account id '{0}': expected 12 digits")]
    InvalidAccount(String),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("duplicate environment '{0}'")]
    DuplicateEnvironment(String),

    #[error("duplicate lambda '{0}'")]
    DuplicateLambda(String),

    #[error("[deploy_permissions] needs a [setup] section to take its statements from")]
    DeployPermissionsWithoutSetup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfraConfig {
    pub app: AppConfig,
    pub setup: Option<SetupConfig>,
    pub deploy_permissions: Option<DeployPermissionsConfig>,
    #[serde(default)]
    pub lambdas: Vec<ContainerLambdaProps>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Prefix for every stack name.
    pub name: String,
    pub account: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupConfig {
    pub app_id: String,
    pub github: GithubConfig,
    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,
    pub ecr: Option<EcrConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubConfig {
    pub owner: String,
    pub repo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub environment_name: String,
    /// CDK bootstrap qualifier of the target account.
    pub bootstrap_qualifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcrConfig {
    pub registry_name: String,
    pub repositories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployPermissionsConfig {
    pub qualifier: String,
}

impl InfraConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: InfraConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Read, apply process environment overrides, and validate.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// [`InfraConfig::load`] with overrides read through `lookup`.
    pub fn load_with<F>(path: &Path, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Override `[app].account` / `[app].region` from the environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(account) = lookup(ACCOUNT_ENV) {
            warn!(var = ACCOUNT_ENV, from = %self.app.account, to = %account, "account overridden from environment");
            self.app.account = account;
        }
        if let Some(region) = lookup(REGION_ENV) {
            warn!(var = REGION_ENV, from = %self.app.region, to = %region, "region overridden from environment");
            self.app.region = region;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let app = &self.app;
        if app.account.len() != 12 || !app.account.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::InvalidAccount(app.account.clone()));
        }
        non_empty("app.name", &app.name)?;
        non_empty("app.region", &app.region)?;

        if let Some(setup) = &self.setup {
            non_empty("setup.app_id", &setup.app_id)?;
            non_empty("setup.github.owner", &setup.github.owner)?;
            non_empty("setup.github.repo", &setup.github.repo)?;

            let mut seen = HashSet::new();
            for env in &setup.environments {
                non_empty("setup.environments.environment_name", &env.environment_name)?;
                non_empty("setup.environments.bootstrap_qualifier", &env.bootstrap_qualifier)?;
                if !seen.insert(env.environment_name.as_str()) {
                    return Err(ConfigError::DuplicateEnvironment(env.environment_name.clone()));
                }
            }

            if let Some(ecr) = &setup.ecr {
                non_empty("setup.ecr.registry_name", &ecr.registry_name)?;
                if ecr.repositories.iter().any(|r| r.is_empty()) {
                    return Err(ConfigError::Empty("setup.ecr.repositories"));
                }
            }
        }

        if let Some(permissions) = &self.deploy_permissions {
            non_empty("deploy_permissions.qualifier", &permissions.qualifier)?;
            if self.setup.is_none() {
                return Err(ConfigError::DeployPermissionsWithoutSetup);
            }
        }

        let mut seen = HashSet::new();
        for lambda in &self.lambdas {
            non_empty("lambdas.name", &lambda.name)?;
            non_empty("lambdas.application_name", &lambda.application_name)?;
            if !seen.insert(lambda.name.as_str()) {
                return Err(ConfigError::DuplicateLambda(lambda.name.clone()));
            }
        }
        Ok(())
    }

    pub fn stack_env(&self) -> StackEnv {
        StackEnv::new(&self.app.account, &self.app.region)
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Empty(field));
    }
    Ok(())
}
