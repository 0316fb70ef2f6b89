use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;
use slotbook_core::config::DataConfig;
use slotbook_core::*;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "slotbook")]
#[command(about = "Provider slot reservation and payment confirmation engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pin the clock to an RFC 3339 instant
    #[arg(long, global = true, value_parser = parse_now)]
    now: Option<DateTime<Utc>>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reserve a provider slot
    Reserve {
        /// Provider to book
        #[arg(long, required_unless_present = "body")]
        provider: Option<String>,

        /// Slot start (RFC 3339)
        #[arg(long, required_unless_present = "body")]
        at: Option<String>,

        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,

        /// Raw JSON request body
        #[arg(long, conflicts_with_all = ["provider", "at", "notes"])]
        body: Option<String>,

        /// Bearer token of the patient
        #[arg(long, env = "SLOTBOOK_TOKEN")]
        token: Option<String>,
    },

    /// Deliver a payment outcome for a reservation
    Confirm {
        #[arg(long, required_unless_present = "body")]
        reservation: Option<String>,

        /// success or failure
        #[arg(long, required_unless_present = "body")]
        outcome: Option<String>,

        /// Raw JSON request body
        #[arg(long, conflicts_with_all = ["reservation", "outcome"])]
        body: Option<String>,
    },

    /// Cancel one of your reservations
    Cancel {
        #[arg(long)]
        reservation: String,

        /// Bearer token of the patient
        #[arg(long, env = "SLOTBOOK_TOKEN")]
        token: Option<String>,
    },

    /// List your reservations
    List {
        /// Bearer token of the patient
        #[arg(long, env = "SLOTBOOK_TOKEN")]
        token: Option<String>,
    },

    /// Check whether a slot is free
    Available {
        #[arg(long)]
        provider: String,

        /// Slot start (RFC 3339)
        #[arg(long)]
        at: String,
    },

    /// Export all reservations to CSV
    Export {
        /// Output file (defaults to <data-dir>/exports/reservations.csv)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn parse_now(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    slotbook_core::service::parse_instant(value).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    // Initialize logging
    slotbook_core::logging::init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(err) => emit(&ApiResponse::from(err)),
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let store = Arc::new(JournalStore::new(DataConfig::journal_path(&data_dir)));
    tracing::debug!("Using journal at {:?}", store.path());

    let clock: Arc<dyn Clock> = match cli.now {
        Some(instant) => Arc::new(FixedClock::at(instant)),
        None => Arc::new(SystemClock),
    };
    let service = ReservationService::new(
        store.clone(),
        Arc::new(StaticTokenProvider::from_config(&config.auth)),
        clock.clone(),
        PaymentReferenceIssuer::from_config(&config.payment),
    );
    let endpoints = Endpoints::new(service, ConfirmationHandler::new(store.clone(), clock));

    let response = match cli.command {
        Commands::Reserve {
            provider,
            at,
            notes,
            body,
            token,
        } => {
            let body = body.unwrap_or_else(|| {
                json!({ "providerId": provider, "scheduledAt": at, "notes": notes }).to_string()
            });
            endpoints.reserve(&body, token.as_deref())
        }
        Commands::Confirm {
            reservation,
            outcome,
            body,
        } => {
            let body = body.unwrap_or_else(|| {
                json!({ "reservationId": reservation, "outcome": outcome }).to_string()
            });
            endpoints.confirm(&body)
        }
        Commands::Cancel { reservation, token } => {
            let body = json!({ "reservationId": reservation }).to_string();
            endpoints.cancel(&body, token.as_deref())
        }
        Commands::List { token } => endpoints.list(token.as_deref()),
        Commands::Available { provider, at } => endpoints.availability(&provider, &at),
        Commands::Export { output } => return cmd_export(&store, output, &data_dir),
    };

    Ok(emit(&response))
}

fn cmd_export(
    store: &JournalStore,
    output: Option<PathBuf>,
    data_dir: &std::path::Path,
) -> Result<ExitCode> {
    let csv_path = output.unwrap_or_else(|| slotbook_core::export::default_export_path(data_dir));
    let reservations = store.all()?;
    let count = export_csv(&reservations, &csv_path)?;

    println!("✓ Exported {} reservations", count);
    println!("  CSV: {}", csv_path.display());
    Ok(ExitCode::SUCCESS)
}

/// Print the response body and map its status to an exit code
fn emit(response: &ApiResponse) -> ExitCode {
    let rendered = serde_json::to_string_pretty(&response.body)
        .unwrap_or_else(|_| response.body.to_string());
    println!("{}", rendered);
    exit_code(response.status)
}

fn exit_code(status: u16) -> ExitCode {
    match status {
        200 => ExitCode::SUCCESS,
        400 => ExitCode::from(2),
        401 => ExitCode::from(3),
        404 => ExitCode::from(4),
        409 => ExitCode::from(5),
        _ => ExitCode::FAILURE,
    }
}
