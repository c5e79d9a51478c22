use pipestack_rollout::{DeploymentStrategy, ResolvedFrom};
use serde_json::json;

pub fn list(format: &str) -> anyhow::Result<()> {
    let default = DeploymentStrategy::default();
    match format {
        "json" => {
            let strategies: Vec<_> = DeploymentStrategy::ALL
                .iter()
                .map(|s| {
                    json!({
                        "name": s.config_name(),
                        "traffic_shift": s.traffic_shift().to_string(),
                        "default": *s == default,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&strategies)?);
        }
        _ => {
            for strategy in DeploymentStrategy::ALL {
                let marker = if strategy == default { " (default)" } else { "" };
                println!(
                    "{:<56} {}{marker}",
                    strategy.config_name(),
                    strategy.traffic_shift()
                );
            }
        }
    }
    Ok(())
}

pub fn resolve(id: Option<&str>) -> anyhow::Result<()> {
    let resolution = DeploymentStrategy::resolve_with_origin(id);
    println!("{}", describe(id, resolution.strategy, resolution.from));
    Ok(())
}

fn describe(id: Option<&str>, strategy: DeploymentStrategy, from: ResolvedFrom) -> String {
    let shift = strategy.traffic_shift();
    match (from, id) {
        (ResolvedFrom::Requested, _) => format!("{strategy} ({shift})"),
        (ResolvedFrom::DefaultAbsent, _) => {
            format!("{strategy} ({shift}) (default, nothing requested)")
        }
        (ResolvedFrom::DefaultUnrecognized, Some(id)) => {
            format!("{strategy} ({shift}) (default, '{id}' is not a known strategy)")
        }
        (ResolvedFrom::DefaultUnrecognized, None) => format!("{strategy} ({shift}) (default)"),
    }
}
