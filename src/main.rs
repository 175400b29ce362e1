use std::{env, fs, process};

use anyhow::Context;
use log::info;

use multitask_gp::config::RunConfig;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <config.json>", args[0]);
        process::exit(1);
    }

    let path = &args[1];
    let json = fs::read_to_string(path).with_context(|| format!("cannot read '{path}'"))?;
    let config = RunConfig::from_json(&json).with_context(|| format!("invalid config '{path}'"))?;
    info!("loaded config from {path}");

    let report = multitask_gp::run(&config).context("regression failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
