mod args;
mod export;

use clap::Parser;
use log::info;

use crate::args::Args;

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match export::run_export_job(&args) {
        Ok(summary) => {
            info!("Export complete: {:?}", summary);
        }
        Err(e) => {
            eprintln!("FATAL: {}", e);
            let mut source = std::error::Error::source(&e);
            while let Some(s) = source {
                eprintln!("  caused by: {}", s);
                source = s.source();
            }
            std::process::exit(1);
        }
    }
}
