use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use eon_navigator::api::measurements::Resolution;
use eon_navigator::api::DateRange;
use eon_navigator::{EonApi, Navigator, CLIENT_ID_VAR, CLIENT_SECRET_VAR};

/// Access E.ON energy data: installations, measurements and costs.
#[derive(Debug, Parser)]
#[command(name = "eon", version)]
struct Cli {
    /// Navigator API client id
    #[arg(long, env = CLIENT_ID_VAR, hide_env_values = true)]
    client_id: String,

    /// Navigator API client secret
    #[arg(long, env = CLIENT_SECRET_VAR, hide_env_values = true)]
    client_secret: String,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List installations with metadata
    Installations {
        /// Only these installation ids
        #[arg(long, value_delimiter = ',')]
        filter: Vec<String>,
    },

    /// List the measurement series of every installation
    MeasurementSeries,

    /// Get measurement values for a series.
    ///
    /// quarter and hour need --from/--to (at most 3 months and 1 year).
    Measurements {
        series_id: i64,

        /// quarter, hour, day or month
        #[arg(long, default_value = "hour")]
        resolution: Resolution,

        /// Start date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<DateTime<Utc>>,

        /// End date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: Option<DateTime<Utc>>,

        /// Ask the server to fill in missing values
        #[arg(long)]
        include_missing: bool,
    },

    /// Get the cost statement of an installation (whole months)
    Costs {
        installation_id: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<DateTime<Utc>>,

        /// End date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: Option<DateTime<Utc>>,
    },

    /// Check that the API is reachable
    Alive,
}

fn parse_date(s: &str) -> Result<DateTime<Utc>, String> {
    let date =
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid date: {s}"))
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(command: Command, api: &dyn Navigator) -> anyhow::Result<()> {
    match command {
        Command::Installations { filter } => {
            print(&api.installations(&filter).context("failed to get installations")?)
        }
        Command::MeasurementSeries => print(
            &api.measurement_series()
                .context("failed to get measurement series")?,
        ),
        Command::Measurements {
            series_id,
            resolution,
            from,
            to,
            include_missing,
        } => print(
            &api.measurements(series_id, resolution, DateRange { from, to }, include_missing)
                .context("failed to get measurements")?,
        ),
        Command::Costs {
            installation_id,
            from,
            to,
        } => print(
            &api.costs(&installation_id, DateRange { from, to })
                .context("failed to get costs")?,
        ),
        Command::Alive => {
            let alive = api.is_alive();
            print(&serde_json::json!({ "alive": alive }))?;
            if !alive {
                anyhow::bail!("API unreachable");
            }
            Ok(())
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut api = EonApi::new(cli.client_id, cli.client_secret);
    if let Some(secs) = cli.timeout {
        api = api.with_timeout(std::time::Duration::from_secs(secs));
    }

    run(cli.command, &api)
}
