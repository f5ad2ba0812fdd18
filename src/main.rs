//! RN Demon - supervise the React Native packager from a terminal
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::Parser;
use rn_demon::RunOptions;
use rndemon_core::prelude::*;

/// RN Demon - supervise the React Native packager
#[derive(Parser, Debug)]
#[command(name = "rndemon")]
#[command(about = "Run the React Native packager and send it reload / dev menu commands", long_about = None)]
struct Args {
    /// Directory containing (or above) the React Native project
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Emit NDJSON events instead of plain text
    #[arg(long)]
    headless: bool,

    /// Wait for a `start` command instead of starting immediately
    #[arg(long)]
    no_auto_start: bool,

    /// Write a default .rndemon/config.toml if none exists
    #[arg(long)]
    init_config: bool,

    /// Extra arguments passed to the packager on the first start
    #[arg(last = true, value_name = "PACKAGER_ARGS")]
    packager_args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_path = args
        .path
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    rn_demon::run(RunOptions {
        project_path,
        headless: args.headless,
        auto_start: !args.no_auto_start,
        packager_args: args.packager_args,
        init_config: args.init_config,
    })
    .await
}
