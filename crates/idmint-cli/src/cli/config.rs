use std::{path::PathBuf, time::Duration};

use anyhow::bail;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use idmint::{
    IdentifierKind,
    sequence::{DEFAULT_MAX_CAS_RETRIES, DEFAULT_MAX_STORE_RETRIES, GeneratorConfig, OverflowPolicy},
};

/// Runtime configuration for the `idmint` binary.
///
/// Global settings control where counters are stored and how hard allocation
/// retries under contention. All values are parsed from CLI arguments or
/// environment variables (a `.env` file is honoured), with defaults suitable
/// for a single host.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "idmint",
    version,
    about = "Validate statutory identifiers and allocate daily serial numbers"
)]
pub struct CliArgs {
    /// Path of the SQLite database holding sequence counters.
    ///
    /// Created on first use. Several processes may share the same file.
    ///
    /// Environment variable: `IDMINT_DATABASE`
    #[arg(long, env = "IDMINT_DATABASE", default_value = "idmint.db", global = true)]
    pub database: PathBuf,

    /// Extra compare-and-swap rounds allowed when another writer updates the
    /// same sequence concurrently.
    ///
    /// Environment variable: `IDMINT_MAX_CAS_RETRIES`
    #[arg(long, env = "IDMINT_MAX_CAS_RETRIES", default_value_t = DEFAULT_MAX_CAS_RETRIES, global = true)]
    pub max_cas_retries: u32,

    /// Extra attempts allowed when the database reports it is busy.
    ///
    /// Environment variable: `IDMINT_MAX_STORE_RETRIES`
    #[arg(long, env = "IDMINT_MAX_STORE_RETRIES", default_value_t = DEFAULT_MAX_STORE_RETRIES, global = true)]
    pub max_store_retries: u32,

    /// Behaviour once a sequence has issued 1000 serials in one day.
    ///
    /// Environment variable: `IDMINT_OVERFLOW`
    #[arg(long, env = "IDMINT_OVERFLOW", value_enum, default_value_t = OverflowArg::Fail, global = true)]
    pub overflow: OverflowArg,

    /// How long SQLite waits on a locked database, in milliseconds.
    ///
    /// Environment variable: `IDMINT_BUSY_TIMEOUT_MS`
    #[arg(long, env = "IDMINT_BUSY_TIMEOUT_MS", default_value_t = 5_000, global = true)]
    pub busy_timeout_ms: u64,

    /// Print results as JSON lines instead of plain text.
    #[arg(long, default_value_t = false, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Validate one or more candidates. Exits non-zero if any is invalid.
    Validate {
        /// Identifier type: verhoeff, aadhaar, gstin or pan.
        kind: IdentifierKind,
        /// Candidates to check, verbatim.
        #[arg(required = true)]
        candidates: Vec<String>,
    },
    /// Append the check character to a payload.
    CheckDigit {
        /// Identifier type: verhoeff, aadhaar or gstin.
        kind: IdentifierKind,
        /// The identifier without its check character.
        payload: String,
    },
    /// Create a sequence if it does not exist. Never alters an existing one.
    Ensure {
        /// Sequence name.
        name: String,
    },
    /// Allocate serial numbers.
    Allocate {
        /// Sequence name.
        name: String,
        /// Prefix printed after `#`.
        prefix: String,
        /// How many serials to allocate.
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Allocate as of this date (YYYY-MM-DD) instead of today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show the next serial without consuming it.
    Peek {
        /// Sequence name.
        name: String,
        /// Prefix printed after `#`.
        prefix: String,
    },
    /// List every sequence and its counter.
    List,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowArg {
    /// Refuse further allocations until the next day.
    Fail,
    /// Keep counting with a wider ordinal.
    Widen,
}

impl From<OverflowArg> for OverflowPolicy {
    fn from(arg: OverflowArg) -> Self {
        match arg {
            OverflowArg::Fail => Self::Fail,
            OverflowArg::Widen => Self::Widen,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub database: PathBuf,
    pub generator: GeneratorConfig,
    pub busy_timeout: Duration,
    pub json: bool,
    pub command: Command,
}

impl TryFrom<CliArgs> for CliConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.database.as_os_str().is_empty() {
            bail!("IDMINT_DATABASE must not be empty");
        }

        match &args.command {
            Command::Ensure { name }
            | Command::Allocate { name, .. }
            | Command::Peek { name, .. }
                if name.trim().is_empty() =>
            {
                bail!("sequence name must not be empty");
            }
            Command::Allocate { count: 0, .. } => {
                bail!("--count must be greater than 0");
            }
            _ => {}
        }

        Ok(Self {
            database: args.database,
            generator: GeneratorConfig {
                max_cas_retries: args.max_cas_retries,
                max_store_retries: args.max_store_retries,
                overflow: args.overflow.into(),
            },
            busy_timeout: Duration::from_millis(args.busy_timeout_ms),
            json: args.json,
            command: args.command,
        })
    }
}
