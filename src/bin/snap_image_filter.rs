//! Filters a bitmap on the accelerator: red dominant pixels are kept, all
//! other pixels are turned grey.
use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::{ArgAction, Parser};
use log::LevelFilter;

use ocaccel_tools::{
    driver_client::{trace_enabled, AccelMode},
    image_filter::{BmpImage, FilterParams, ImageFilterClient, DEFAULT_JOB_TIMEOUT_SECS},
    utils::{error_chain, init_logger},
};

#[derive(Parser, Debug)]
#[command(name = "snap_image_filter", version)]
#[command(about = "Image filtering example: moves a .bmp through the accelerator and back")]
struct Cli {
    #[arg(short = 'i', long = "input", help = "bitmap to filter")]
    input: PathBuf,
    #[arg(short = 'o', long = "output", help = "where to write the filtered bitmap")]
    output: Option<PathBuf>,
    #[arg(short = 'C', long = "card", default_value_t = 0, help = "card number, 0 is the default card")]
    card: u32,
    #[arg(short = 't', long = "timeout", default_value_t = DEFAULT_JOB_TIMEOUT_SECS,
          help = "job timeout in seconds")]
    timeout: u64,
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

/// Usage errors exit 1, `--help` and `--version` exit 0.
fn parse_error_status(e: &clap::Error) -> u8 {
    u8::from(e.use_stderr())
}

fn log_level(verbose: u8, trace: bool) -> LevelFilter {
    match (verbose, trace) {
        (0, false) => LevelFilter::Warn,
        (1, false) => LevelFilter::Info,
        (2, false) | (_, true) => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(parse_error_status(&e));
        }
    };

    init_logger(log_level(cli.verbose, trace_enabled()));
    log::debug!("parsed cli command with {cli:?}");

    let params = FilterParams::new(cli.input, cli.output, cli.card)
        .with_timeout(Duration::from_secs(cli.timeout));
    println!("input {}", params.input.display());
    match &params.output {
        Some(output) => println!("output {}", output.display()),
        None => println!("output (none)"),
    }

    let image = match BmpImage::read(&params.input) {
        Ok(image) => image,
        Err(e) => {
            log::error!("err: {}: {}", params.input.display(), error_chain(&e));
            return ExitCode::FAILURE;
        }
    };
    println!("Bitmap size: {}", image.header.size);

    let client = ImageFilterClient::new(AccelMode::from_env());
    match client.run(&image, &params) {
        Ok(outcome) => {
            eprintln!("{}", outcome.elapsed_report());
            log::debug!("filter finished: {:?}", outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("err: {}", error_chain(&e));
            ExitCode::from(e.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn parses_short_options() {
        let cli = Cli::try_parse_from([
            "snap_image_filter", "-i", "in.bmp", "-o", "out.bmp", "-C", "2", "-t", "10", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.input, PathBuf::from("in.bmp"));
        assert_eq!(cli.output, Some(PathBuf::from("out.bmp")));
        assert_eq!(cli.card, 2);
        assert_eq!(cli.timeout, 10);
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["snap_image_filter", "-i", "in.bmp"]).unwrap();
        assert_eq!(cli.output, None);
        assert_eq!(cli.card, 0);
        assert_eq!(cli.timeout, DEFAULT_JOB_TIMEOUT_SECS);
    }

    #[test]
    fn usage_errors_exit_one() {
        let e = Cli::try_parse_from(["snap_image_filter"]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(parse_error_status(&e), 1);

        let e = Cli::try_parse_from(["snap_image_filter", "-i", "a.bmp", "-C", "x"]).unwrap_err();
        assert_eq!(parse_error_status(&e), 1);
    }

    #[test]
    fn help_and_version_exit_zero() {
        let e = Cli::try_parse_from(["snap_image_filter", "-h"]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::DisplayHelp);
        assert_eq!(parse_error_status(&e), 0);

        let e = Cli::try_parse_from(["snap_image_filter", "-V"]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::DisplayVersion);
        assert_eq!(parse_error_status(&e), 0);
    }

    #[test]
    fn verbosity_raises_log_level() {
        assert_eq!(log_level(0, false), LevelFilter::Warn);
        assert_eq!(log_level(1, false), LevelFilter::Info);
        assert_eq!(log_level(2, false), LevelFilter::Debug);
        assert_eq!(log_level(3, false), LevelFilter::Trace);
        assert_eq!(log_level(0, true), LevelFilter::Debug);
    }
}
