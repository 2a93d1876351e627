use std::path::PathBuf;

use clap::Parser;

/// Top-level CLI parser for the `prism` binary.
#[derive(Debug, Parser)]
#[command(name = "prism", version, about = "Prism - chat with a GraphRAG index")]
pub struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value_t = 7859)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Index root holding `output/`, `settings.yaml` and `.env`
    #[arg(short, long, env = "GRAPHRAG_INPUT_BASE_DIR", default_value = "./graphdata")]
    pub root: PathBuf,

    /// Quiet mode (errors only)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long)]
    pub verbose: bool,
}
