//! `fetch-rates` command: trigger a write cycle from the command line.

use std::io::Write;
use std::time::Duration;

use clap::Parser;
use ratewatch_common::{constants, Currency};
use ratewatch_fx::ExchangeRateCore;
use tracing::error;

use crate::config::split_codes;

/// Exit status for a completed run.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit status when the update failed.
pub const EXIT_FAILURE: u8 = 1;
/// Exit status for invalid arguments.
pub const EXIT_USAGE: u8 = 2;

/// Ratewatch fetch CLI
#[derive(Parser, Debug)]
#[command(name = "fetch-rates")]
#[command(about = "Fetch the latest exchange rates and store them")]
pub struct FetchArgs {
    /// Base currency
    #[arg(default_value = constants::DEFAULT_BASE_CURRENCY)]
    pub base_currency: String,

    /// Target currencies, space or comma separated
    pub target_currencies: Vec<String>,

    /// Repeat every SECS seconds until interrupted
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
}

/// Validated fetch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub base: Currency,
    pub targets: Vec<Currency>,
    pub interval: Option<Duration>,
}

impl FetchArgs {
    /// Validate arguments into a request.
    pub fn request(&self) -> Result<FetchRequest, String> {
        let base = Currency::parse(&self.base_currency).map_err(|e| e.to_string())?;

        let codes: Vec<String> = self
            .target_currencies
            .iter()
            .flat_map(|raw| split_codes(raw))
            .collect();
        if codes.is_empty() {
            return Err("You must provide at least one target currency.".to_string());
        }

        let targets = codes
            .iter()
            .map(|code| Currency::parse(code))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;

        let interval = match self.interval {
            Some(0) => return Err("Interval must be at least one second.".to_string()),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        Ok(FetchRequest {
            base,
            targets,
            interval,
        })
    }
}

impl FetchRequest {
    /// Line announcing what is about to be fetched.
    pub fn banner(&self) -> String {
        let targets: Vec<&str> = self.targets.iter().map(Currency::code).collect();
        format!("Fetching rates for {} → {}", self.base, targets.join(", "))
    }
}

/// Run one write cycle, reporting progress to `out`. Returns the exit status.
pub async fn run_once<W: Write>(
    core: &ExchangeRateCore,
    request: &FetchRequest,
    out: &mut W,
) -> std::io::Result<u8> {
    writeln!(out, "{}", request.banner())?;

    match core.update_rates(&request.base, &request.targets).await {
        Ok(outcome) => {
            if let Some(event) = &outcome.event {
                for description in event.descriptions() {
                    writeln!(out, "  changed {}", description)?;
                }
            }
            writeln!(out, "Done.")?;
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            error!(error = %e, base = %request.base, "Rate update failed");
            writeln!(out, "Failed: {}", e)?;
            Ok(if e.is_client_error() { EXIT_USAGE } else { EXIT_FAILURE })
        }
    }
}
