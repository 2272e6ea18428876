use std::io::Write;

use anyhow::Context;
use chrono::NaiveDate;
use idmint::{
    IdentifierKind, InvalidReason, LocalDate, SerialNumber,
    sequence::{SequenceGenerator, SqliteStore},
};
use serde::Serialize;

use crate::cli::config::{CliConfig, Command};

type Generator = SequenceGenerator<SqliteStore, LocalDate>;

#[derive(Serialize)]
struct ValidateReport<'a> {
    kind: IdentifierKind,
    candidate: &'a str,
    valid: bool,
    reason: Option<InvalidReason>,
}

#[derive(Serialize)]
struct SerialReport<'a> {
    sequence: &'a str,
    serial: String,
    ordinal: u64,
    epoch_date: NaiveDate,
}

impl<'a> SerialReport<'a> {
    fn new(sequence: &'a str, serial: &SerialNumber) -> Self {
        Self {
            sequence,
            serial: serial.to_string(),
            ordinal: serial.ordinal(),
            epoch_date: serial.epoch_date(),
        }
    }
}

/// Executes the configured command, writing results to `out`.
///
/// Returns `false` when the command ran but reported a negative result (an
/// invalid candidate).
pub fn run(config: &CliConfig, out: &mut impl Write) -> anyhow::Result<bool> {
    match &config.command {
        Command::Validate { kind, candidates } => validate(config, *kind, candidates, out),
        Command::CheckDigit { kind, payload } => check_digit(*kind, payload, out),
        Command::Ensure { name } => {
            open(config)?.ensure_sequence(name)?;
            tracing::info!(sequence = %name, "sequence ready");
            Ok(true)
        }
        Command::Allocate {
            name,
            prefix,
            count,
            date,
        } => {
            let generator = open(config)?;
            for _ in 0..*count {
                let serial = match date {
                    Some(date) => generator.allocate_on(name, prefix, *date)?,
                    None => generator.allocate(name, prefix)?,
                };
                print_serial(config, name, &serial, out)?;
            }
            Ok(true)
        }
        Command::Peek { name, prefix } => {
            let serial = open(config)?.peek(name, prefix)?;
            print_serial(config, name, &serial, out)?;
            Ok(true)
        }
        Command::List => {
            for counter in open(config)?.store().snapshot()? {
                if config.json {
                    writeln!(out, "{}", serde_json::to_string(&counter)?)?;
                } else {
                    writeln!(
                        out,
                        "{}\t{}\t{}",
                        counter.name,
                        counter.count(),
                        counter.epoch_date()
                    )?;
                }
            }
            Ok(true)
        }
    }
}

fn open(config: &CliConfig) -> anyhow::Result<Generator> {
    let store = SqliteStore::open_with_timeout(&config.database, config.busy_timeout)
        .with_context(|| format!("opening {}", config.database.display()))?;
    tracing::debug!(database = %config.database.display(), "opened sequence store");
    Ok(SequenceGenerator::with_config(
        store,
        LocalDate,
        config.generator,
    ))
}

fn validate(
    config: &CliConfig,
    kind: IdentifierKind,
    candidates: &[String],
    out: &mut impl Write,
) -> anyhow::Result<bool> {
    let mut all_valid = true;
    for candidate in candidates {
        let outcome = kind.validate(candidate);
        all_valid &= outcome.is_valid();
        if config.json {
            let report = ValidateReport {
                kind,
                candidate,
                valid: outcome.is_valid(),
                reason: outcome.reason(),
            };
            writeln!(out, "{}", serde_json::to_string(&report)?)?;
        } else {
            writeln!(out, "{candidate}: {outcome}")?;
        }
    }
    Ok(all_valid)
}

fn check_digit(kind: IdentifierKind, payload: &str, out: &mut impl Write) -> anyhow::Result<bool> {
    match kind.check_char(payload) {
        Ok(Some(check)) => {
            writeln!(out, "{payload}{check}")?;
            Ok(true)
        }
        Ok(None) => anyhow::bail!("{kind} identifiers carry no check character"),
        Err(reason) => {
            Err(reason).with_context(|| format!("`{payload}` is not a {kind} payload"))
        }
    }
}

fn print_serial(
    config: &CliConfig,
    name: &str,
    serial: &SerialNumber,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    if config.json {
        writeln!(out, "{}", serde_json::to_string(&SerialReport::new(name, serial))?)?;
    } else {
        writeln!(out, "{serial}")?;
    }
    Ok(())
}
