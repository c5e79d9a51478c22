use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use pipestack_stacks::{App, InfraConfig, SynthesizedStack};
use tracing::info;

pub fn synth(config: &str, out_dir: Option<&str>, stack: Option<&str>) -> anyhow::Result<()> {
    synth_with(config, out_dir, stack, |key| std::env::var(key).ok())
}

fn synth_with<F>(
    config: &str,
    out_dir: Option<&str>,
    stack: Option<&str>,
    lookup: F,
) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let config_path = Path::new(config);
    let config = InfraConfig::load_with(config_path, lookup)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let app = App::from_config(&config)?;
    let stacks = select(app.synth()?, stack, &app)?;

    match out_dir {
        Some(dir) => {
            for path in write_templates(Path::new(dir), &stacks)? {
                println!("✓ Wrote {}", path.display());
            }
        }
        None => {
            for synthesized in &stacks {
                println!("{}", serde_json::to_string_pretty(&synthesized.template)?);
            }
        }
    }
    Ok(())
}

fn select(
    stacks: Vec<SynthesizedStack>,
    name: Option<&str>,
    app: &App,
) -> anyhow::Result<Vec<SynthesizedStack>> {
    let Some(name) = name else {
        return Ok(stacks);
    };
    let selected: Vec<_> = stacks.into_iter().filter(|s| s.name == name).collect();
    if selected.is_empty() {
        bail!(
            "no stack named '{name}' (available: {})",
            app.stack_names().join(", ")
        );
    }
    Ok(selected)
}

pub fn write_templates(dir: &Path, stacks: &[SynthesizedStack]) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    stacks
        .iter()
        .map(|synthesized| -> anyhow::Result<PathBuf> {
            let path = dir.join(synthesized.file_name());
            std::fs::write(&path, serde_json::to_string_pretty(&synthesized.template)?)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(stack = %synthesized.name, path = %path.display(), "template written");
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[app]
name = "orders"
account = "123456789012"
region = "eu-west-1"

[setup]
app_id = "orders"
github = { owner = "acme", repo = "orders" }
environments = [{ environment_name = "dev", bootstrap_qualifier = "hnb659fds" }]
"#;

    #[test]
    fn test_writes_one_file_per_stack() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("pipestack.toml");
        std::fs::write(&config, CONFIG).unwrap();
        let out = dir.path().join("cdk.out");

        synth_with(config.to_str().unwrap(), out.to_str(), None, |_| None).unwrap();

        let written = std::fs::read_to_string(out.join("orders-setup.template.json")).unwrap();
        let template: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
        assert!(template["Resources"]["devcdkdeployrole"].is_object());
    }

    #[test]
    fn test_unknown_stack_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("pipestack.toml");
        std::fs::write(&config, CONFIG).unwrap();

        let err = synth_with(config.to_str().unwrap(), None, Some("orders-lambdas"), |_| None)
            .unwrap_err();
        assert!(err.to_string().contains("no stack named 'orders-lambdas'"));
    }
}
