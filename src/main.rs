mod core;

use crate::core::{
    FsContentProvider, JsonlRunLogSink, NullRunLogSink, PrivilegedDataEraser, RunLogSinkOperations,
    SanitizationProfile, SystemCommandExecutor, Target, TreeEraser, WipeOrchestrator,
    format_byte_size,
};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/*
 * Command-line front end for the erasure engine. Builds the concrete
 * providers, runs one batch through the orchestrator and prints the
 * auditable result. The engine itself lives under `core` and is consumed
 * by richer front ends through the same interfaces used here.
 */

const APP_NAME: &str = "BorradoSeguro";
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

struct CliArgs {
    profile: SanitizationProfile,
    folders: Vec<PathBuf>,
    packages: Vec<String>,
    confirmed: bool,
}

fn print_usage() {
    eprintln!("Usage: borrado_seguro [OPTIONS] [PATH]...");
    eprintln!();
    eprintln!("Securely erases folder trees and, where privileged, application packages.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --profile <single|three|seven>  Sanitization profile (default: three)");
    eprintln!("  --package <IDENTIFIER>          Clear an application package (repeatable)");
    eprintln!("  --yes                           Confirm: this tool destroys data");
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut parsed = CliArgs {
        profile: SanitizationProfile::ThreePassOverwrite,
        folders: Vec::new(),
        packages: Vec::new(),
        confirmed: false,
    };
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--profile" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--profile requires a value".to_string())?;
                parsed.profile = value.parse()?;
            }
            "--package" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--package requires a value".to_string())?;
                parsed.packages.push(value.clone());
            }
            "--yes" => parsed.confirmed = true,
            "--help" | "-h" => return Err(String::new()),
            other if other.starts_with("--") => {
                return Err(format!("Unknown option '{other}'"));
            }
            path => parsed.folders.push(PathBuf::from(path)),
        }
    }
    if parsed.folders.is_empty() && parsed.packages.is_empty() {
        return Err("Nothing to erase: give at least one PATH or --package".to_string());
    }
    Ok(parsed)
}

fn main() -> ExitCode {
    if let Err(e) = TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("Logger initialization failed: {e}");
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("{message}");
                eprintln!();
            }
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    if !cli.confirmed {
        eprintln!("Refusing to run without --yes: erasure is irreversible.");
        eprintln!("Would erase with profile {:?}:", cli.profile);
        for folder in &cli.folders {
            eprintln!("  folder  {folder:?}");
        }
        for package in &cli.packages {
            eprintln!("  package {package}");
        }
        return ExitCode::FAILURE;
    }

    let provider = Arc::new(FsContentProvider::new());
    let executor = Arc::new(SystemCommandExecutor::new(COMMAND_TIMEOUT));
    let package_eraser = Arc::new(PrivilegedDataEraser::new(executor));

    let mut targets: Vec<Target> = cli.folders.into_iter().map(Target::Folder).collect();
    for package in cli.packages {
        // Validate identifiers up front; the erase path assumes this check.
        match package_eraser.package_exists(&package) {
            Ok(true) => targets.push(Target::Package(package)),
            Ok(false) => {
                log::warn!("Package {package} is not installed; skipping.");
            }
            Err(e) => {
                log::warn!("Cannot verify package {package}: {e}. Skipping.");
            }
        }
    }
    if targets.is_empty() {
        eprintln!("No usable targets remain.");
        return ExitCode::FAILURE;
    }

    let run_log: Arc<dyn RunLogSinkOperations> = match JsonlRunLogSink::for_app(APP_NAME) {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            log::warn!("Run log unavailable ({e}); this run will not be recorded.");
            Arc::new(NullRunLogSink::new())
        }
    };

    let orchestrator = WipeOrchestrator::new(
        Arc::new(TreeEraser::new(provider)),
        package_eraser,
        run_log,
    );

    let handle = match orchestrator.start_run(targets, cli.profile) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Cannot start run: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = handle.await_result();
    for line in result.lines() {
        println!("{line}");
    }
    println!();
    println!(
        "Total freed: {} in {:.1} s",
        format_byte_size(result.total_bytes_freed()),
        result.elapsed().as_seconds_f64()
    );

    if let Err(e) = orchestrator.reset() {
        log::warn!("Could not reset orchestrator: {e}");
    }
    let failed = result.lines().iter().any(|line| line.starts_with("ERROR:"));
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_defaults_to_three_pass() {
        let cli = parse_args(&args(&["/tmp/x", "--yes"])).unwrap();
        assert_eq!(cli.profile, SanitizationProfile::ThreePassOverwrite);
        assert_eq!(cli.folders, vec![PathBuf::from("/tmp/x")]);
        assert!(cli.confirmed);
    }

    #[test]
    fn test_parse_args_profile_and_packages() {
        let cli = parse_args(&args(&[
            "--profile",
            "seven",
            "--package",
            "com.a",
            "--package",
            "com.b",
        ]))
        .unwrap();
        assert_eq!(cli.profile, SanitizationProfile::SevenPassOverwrite);
        assert_eq!(cli.packages, vec!["com.a", "com.b"]);
        assert!(cli.folders.is_empty());
        assert!(!cli.confirmed);
    }

    #[test]
    fn test_parse_args_rejects_empty_batch_and_unknown_options() {
        assert!(parse_args(&args(&["--yes"])).is_err());
        assert!(parse_args(&args(&["--frobnicate", "/tmp/x"])).is_err());
        assert!(parse_args(&args(&["--profile"])).is_err());
    }
}
