//! pipestack stacks: account setup, deploy permissions, application assembly.
//!
//! # Components
//!
//! - **`config`**: `pipestack.toml` parsing, environment overrides, validation
//! - **`setup`**: Registries, tag parameters, GitHub roles, toolkit policies
//! - **`deploy_permissions`**: Inline policy on the CDK execution role
//! - **`app`**: Assemble and synthesize every configured stack

pub mod app;
pub mod config;
pub mod deploy_permissions;
pub mod ecr;
pub mod github;
pub mod setup;
pub mod ssm;
pub mod toolkit_policy;

pub use app::{App, SynthesizedStack};
pub use config::{ConfigError, InfraConfig};
pub use deploy_permissions::DeployPermissionsStack;
pub use setup::SetupStack;
