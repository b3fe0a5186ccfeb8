//! Write to OCACCEL specific registers. Must be called as root!
use std::{process::ExitCode, time::Duration};

use clap::{CommandFactory, Parser};
use log::LevelFilter;

use ocaccel_tools::{
    driver_client::{trace_enabled, AccelMode},
    error::AccelError,
    poke::{AccessWidth, PokeClient, PokeParams},
    utils::{error_chain, init_logger, parse_c_ulong},
};

#[derive(Parser, Debug)]
#[command(name = "ocaccel_poke", version)]
#[command(about = "Write to OCACCEL specific registers. Must be called as root!")]
#[command(after_help = "Example:\n  ocaccel_poke 0x0000000 0xdeadbeef")]
struct Cli {
    #[arg(short = 'C', long = "card", default_value = "0", allow_negative_numbers = true,
          value_parser = parse_card, help = "card number, can be (0...3)")]
    card: i64,
    #[arg(short = 'X', long = "cpu", value_parser = parse_usize, help = "only run on this CPU")]
    cpu: Option<usize>,
    #[arg(short = 'w', long = "width", default_value_t = AccessWidth::W64,
          help = "access width, 32 or 64")]
    width: AccessWidth,
    #[arg(short = 'i', long = "interval", default_value = "0", value_parser = parse_number,
          help = "interval in usec between pokes")]
    interval: u64,
    #[arg(short = 'c', long = "count", default_value = "1", value_parser = parse_number,
          help = "number of pokes")]
    count: u64,
    #[arg(short = 'r', long = "rd-back", help = "read back and verify")]
    rd_back: bool,
    #[arg(short = 'q', long = "quiet", help = "quiet output")]
    quiet: bool,
    #[arg(value_parser = parse_offset)]
    addr: u32,
    #[arg(value_parser = parse_number)]
    val: u64,
}

impl Cli {
    fn params(&self) -> PokeParams {
        PokeParams {
            card: self.card,
            cpu: self.cpu,
            width: self.width,
            interval: Duration::from_micros(self.interval),
            count: self.count,
            read_back: self.rd_back,
            offset: self.addr,
            value: self.val,
        }
    }
}

fn parse_number(s: &str) -> Result<u64, String> {
    parse_c_ulong(s).map_err(|e| format!("{:?}: {}", s, e))
}

fn parse_usize(s: &str) -> Result<usize, String> {
    parse_number(s).and_then(|v| usize::try_from(v).map_err(|e| e.to_string()))
}

fn parse_offset(s: &str) -> Result<u32, String> {
    parse_number(s).and_then(|v| u32::try_from(v).map_err(|e| e.to_string()))
}

fn parse_card(s: &str) -> Result<i64, String> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let v = parse_number(digits).and_then(|v| i64::try_from(v).map_err(|e| e.to_string()))?;
    Ok(if negative { -v } else { v })
}

/// Usage errors exit 1, `--help` and `--version` exit 0.
fn parse_error_status(e: &clap::Error) -> u8 {
    u8::from(e.use_stderr())
}

fn log_level(quiet: bool, trace: bool) -> LevelFilter {
    if trace {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
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

    init_logger(log_level(cli.quiet, trace_enabled()));
    log::debug!("parsed cli command with {cli:?}");

    let client = PokeClient::new(AccelMode::from_env());
    match client.run(&cli.params()) {
        Ok(report) => {
            if !cli.quiet {
                println!("{}", report);
            }
            ExitCode::SUCCESS
        }
        Err(e @ AccelError::InvalidCard { .. }) => {
            log::error!("err: {}!", e);
            let _ = Cli::command().print_help();
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("err: {}", error_chain(&e));
            ExitCode::from(e.exit_code())
        }
    }
}
