//! Twin runtime entry point — CLI wiring and run invocation.

use std::path::PathBuf;
use std::process;

use twinsync::twin::{self, TwinSetup};

/// Parsed CLI arguments.
struct CliArgs {
    site_dir: PathBuf,
    start: Option<String>,
}

fn print_help() {
    eprintln!("twinsync — real-time building digital-twin runtime");
    eprintln!();
    eprintln!("Usage: twinsync --site <dir> [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --site <dir>       Site directory with twin.toml and the row tables");
    eprintln!("  --start <datetime> Data collection start (e.g. 2026-08-06T00:00);");
    eprintln!("                     defaults to the current time");
    eprintln!("  --help             Show this help message");
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut site_dir: Option<PathBuf> = None;
    let mut start: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--site" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --site requires a directory argument");
                    process::exit(1);
                }
                site_dir = Some(PathBuf::from(&args[i]));
            }
            "--start" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --start requires a datetime argument");
                    process::exit(1);
                }
                start = Some(args[i].clone());
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    let Some(site_dir) = site_dir else {
        eprintln!("error: --site is required");
        print_help();
        process::exit(1);
    };

    CliArgs { site_dir, start }
}

fn main() {
    env_logger::init();
    let cli = parse_args();

    let start = cli
        .start
        .unwrap_or_else(|| chrono::Local::now().naive_local().format("%Y-%m-%dT%H:%M").to_string());

    let setup = match TwinSetup::load(&cli.site_dir, &start) {
        Ok(setup) => setup,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    match twin::run_twin(setup) {
        Ok(outcome) => {
            eprintln!("twin run finished: {outcome:?}");
        }
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}
