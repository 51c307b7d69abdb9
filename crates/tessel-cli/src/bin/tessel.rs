/// tessel CLI

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tessel_cli::{parse_override, RenderOptions, Renderer};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tessel")]
#[command(about = "Render a tessel template against JSON data")]
#[command(version)]
struct Args {
    /// Template file
    #[arg(value_name = "TEMPLATE")]
    template: PathBuf,

    /// JSON object used as the root scope
    #[arg(short, long, value_name = "FILE")]
    data: Option<PathBuf>,

    /// Set a scope value; VALUE is parsed as JSON, else taken as a string
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_set)]
    set: Vec<(String, String)>,

    /// Write the result to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the normalized template without binding it
    #[arg(long)]
    normalize_only: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_set(arg: &str) -> Result<(String, String), String> {
    parse_override(arg).map_err(|e| e.to_string())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let mut options = RenderOptions::new(&args.template)
        .normalize_only(args.normalize_only)
        .verbose(args.verbose);
    if let Some(data) = args.data {
        options = options.data_file(data);
    }
    for (key, value) in args.set {
        options = options.set(key, value);
    }
    if let Some(output) = &args.output {
        options = options.output(output);
    }

    let renderer = Renderer::new(options)?;
    let output = renderer
        .run()
        .with_context(|| format!("failed to render {}", args.template.display()))?;

    if args.output.is_none() {
        println!("{}", output.html);
    }
    Ok(())
}
