use std::{
    collections::HashMap,
    env, fs,
    io::{self, BufRead, BufReader, Write},
    path::PathBuf,
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::info;
use pfs_router::{model::RouterModel, runner::Runner};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Parameter file with the router settings and the calibration tables
    #[arg(short, long, default_value = "config/params.toml")]
    params: PathBuf,

    /// JSON-lines file of raw fingertip samples, `-` for stdin
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Topic remapping, as FROM:=TO
    #[arg(short, long, value_parser = parse_remap)]
    remap: Vec<(String, String)>,

    /// Print every routed message to stdout as JSON lines
    #[arg(short, long)]
    dump: bool,
}

fn parse_remap(s: &str) -> Result<(String, String)> {
    let (from, to) = s
        .split_once(":=")
        .ok_or_else(|| anyhow!("expected FROM:=TO, got '{s}'"))?;

    if from.is_empty() || to.is_empty() {
        return Err(anyhow!("empty topic in remap '{s}'"));
    }

    Ok((from.to_string(), to.to_string()))
}

fn open_input(input: &str) -> Result<Box<dyn BufRead + Send>> {
    if input == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }

    let file = fs::File::open(input).with_context(|| format!("Cannot open input '{input}'"))?;
    Ok(Box::new(BufReader::new(file)))
}

fn main() -> Result<()> {
    // Default log level to "info"
    if env::var("RUST_LOG").is_err() {
        unsafe { env::set_var("RUST_LOG", "info") }
    }

    pretty_env_logger::init();

    let args = Args::parse();

    let input = open_input(&args.input)?;
    let dump: Option<Box<dyn Write + Send>> = if args.dump {
        Some(Box::new(io::stdout()))
    } else {
        None
    };

    let model = RouterModel::new(input, dump);
    let stats = model.stats();

    let remap: HashMap<String, String> = args.remap.into_iter().collect();
    let runner = Runner::new(model, &args.params, remap)?;

    runner.run_blocking()?;

    info!(
        "Routed {} samples into {} messages",
        stats.samples(),
        stats.messages()
    );

    Ok(())
}
