use anyhow::ensure;
use clap::Parser;
use std::path::{Path, PathBuf};

use depgraph_core::{export, CodebaseParser};

/// depgraph - program dependence graphs from Python source trees
#[derive(Parser)]
#[command(name = "depgraph")]
#[command(version)] // Auto-pull version from Cargo.toml
#[command(about = "Parse a directory of Python sources into a dependence graph", long_about = None)]
struct Cli {
    /// Path to directory to parse
    #[arg(long, value_name = "DIR")]
    dir: PathBuf,

    /// File to save node features to
    #[arg(long = "nf", value_name = "FILE")]
    node_features: PathBuf,

    /// File to save adjacency matrix to
    #[arg(long = "adj", value_name = "FILE")]
    adjacency: PathBuf,

    /// Dimension of the node features (consumed by downstream vectorization)
    #[arg(long, value_name = "N")]
    dim: usize,

    /// Also save the graph in Graphviz format as tree.gv
    #[arg(long = "save-gv")]
    save_gv: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    ensure!(cli.dim > 0, "--dim must be a positive integer");

    let mut parser = CodebaseParser::new(&cli.dir)?;
    parser.parse()?;

    export::write_node_features(parser.graph(), &cli.node_features)?;
    export::write_adjacency(parser.graph(), &cli.adjacency)?;

    if cli.save_gv {
        export::write_gv(parser.graph(), Path::new("tree.gv"))?;
    }

    Ok(())
}
