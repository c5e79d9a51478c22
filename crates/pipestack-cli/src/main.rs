use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "pipestack",
    about = "pipestack: CloudFormation for blue/green Lambda pipelines",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize CloudFormation templates from a pipestack.toml.
    ///
    /// Writes one <stack>.template.json per stack into --out-dir, or prints
    /// the templates to stdout when no directory is given.
    Synth {
        /// Configuration file
        #[arg(short, long, default_value = pipestack_stacks::config::DEFAULT_CONFIG_FILE)]
        config: String,
        /// Directory to write templates into
        #[arg(short, long)]
        out_dir: Option<String>,
        /// Only synthesize this stack
        #[arg(short, long)]
        stack: Option<String>,
    },
    /// List the known deployment strategies
    Strategies {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Show which strategy an identifier resolves to
    Resolve {
        /// Deployment config name; omit to see the default
        id: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pipestack=info".parse()?)
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Synth {
            config,
            out_dir,
            stack,
        } => commands::synth::synth(&config, out_dir.as_deref(), stack.as_deref()),
        Commands::Strategies { format } => commands::strategy::list(&format),
        Commands::Resolve { id } => commands::strategy::resolve(id.as_deref()),
    }
}
