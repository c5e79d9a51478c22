//! App: every stack one configuration file describes.

use pipestack_core::{DeclareResult, Stack};
use pipestack_rollout::ContainerLambda;
use serde_json::Value;
use tracing::info;

use crate::config::InfraConfig;
use crate::deploy_permissions::DeployPermissionsStack;
use crate::setup::SetupStack;

/// A rendered template and the stack it belongs to.
#[derive(Debug, Clone)]
pub struct SynthesizedStack {
    pub name: String,
    pub template: Value,
}

impl SynthesizedStack {
    pub fn file_name(&self) -> String {
        format!("{}.template.json", self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct App {
    stacks: Vec<Stack>,
}

impl App {
    /// Build every stack from a validated configuration.
    ///
    /// Stacks are named `<app>-setup`, `<app>-deploy-permissions`, and
    /// `<app>-lambdas`; each exists only if its section is configured.
    pub fn from_config(config: &InfraConfig) -> DeclareResult<Self> {
        let env = config.stack_env();
        let prefix = config.app.name.as_str();
        let mut stacks = Vec::new();

        if let Some(setup_config) = &config.setup {
            let setup = SetupStack::new(&format!("{prefix}-setup"), env.clone(), setup_config)?;
            let deploy = config
                .deploy_permissions
                .as_ref()
                .map(|permissions| {
                    DeployPermissionsStack::new(
                        &format!("{prefix}-deploy-permissions"),
                        env.clone(),
                        &permissions.qualifier,
                        setup.policy_statements.clone(),
                    )
                })
                .transpose()?;
            stacks.push(setup.stack);
            stacks.extend(deploy.map(|d| d.stack));
        }

        if !config.lambdas.is_empty() {
            let mut stack = Stack::new(format!("{prefix}-lambdas"), env)
                .with_description(format!("Lambda functions for {prefix}"));
            for lambda in &config.lambdas {
                ContainerLambda::declare(&mut stack, lambda)?;
            }
            stacks.push(stack);
        }

        info!(app = prefix, stacks = stacks.len(), "app assembled");
        Ok(Self { stacks })
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name() == name)
    }

    pub fn stack_names(&self) -> Vec<&str> {
        self.stacks.iter().map(Stack::name).collect()
    }

    /// Render every stack; the first invalid stack fails the whole app.
    pub fn synth(&self) -> DeclareResult<Vec<SynthesizedStack>> {
        self.stacks
            .iter()
            .map(|stack| -> DeclareResult<SynthesizedStack> {
                Ok(SynthesizedStack {
                    name: stack.name().to_string(),
                    template: stack.synth()?,
                })
            })
            .collect()
    }
}
