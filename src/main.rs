//! codeatlas - structural and semantic code index

use anyhow::Result;
use clap::Parser;
use codeatlas::cli::{
    analyze, config, init, print_analysis, print_matches, print_repair, print_scan,
    print_status, repair, scan, search, status, watch, Cli, Commands, ScanArgs,
};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays clean
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let project_path = Path::new(&cli.path);

    match cli.command {
        Commands::Init(args) => {
            init(project_path, args.force)?;

            if !args.no_scan {
                println!("\nRunning initial scan...");
                let result = scan(project_path, &ScanArgs::default()).await?;
                print_scan(&result, cli.format)?;
            }
        }

        Commands::Scan(args) => {
            let result = scan(project_path, &args).await?;
            print_scan(&result, cli.format)?;
        }

        Commands::Status => {
            let report = status(project_path)?;
            print_status(&report, cli.format)?;
        }

        Commands::Watch(args) => {
            watch(project_path, args.debounce, args.no_embeddings, cli.format).await?;
        }

        Commands::Repair => {
            let report = repair(project_path).await?;
            print_repair(&report, cli.format)?;
        }

        Commands::Analyze(args) => {
            let analysis = analyze(project_path, &args.target, args.limit).await?;
            print_analysis(&analysis, cli.format)?;
        }

        Commands::Search(args) => {
            let matches = search(project_path, &args.query, args.limit).await?;
            print_matches(&matches, cli.format)?;
        }

        Commands::Config(args) => {
            config(project_path, &args)?;
        }
    }

    Ok(())
}
