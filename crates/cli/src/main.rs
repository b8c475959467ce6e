//! Command-line probe for PC/SC readers, card ATRs and reader-side PACE

use clap::{Parser, Subcommand, ValueEnum};
use eidlink_apdu_pace::PinId;
use eidlink_apdu_transport_pcsc::PcscDeviceManager;
use std::error::Error;
use tracing::info;
use tracing::level_filters::LevelFilter;

mod commands;
mod utils;

use commands::*;
use utils::reader;

#[derive(Parser)]
#[command(version, about = "Probe PC/SC readers, decode ATRs and run reader-side PACE")]
struct Cli {
    /// Optional reader name to use (will auto-detect if not specified)
    #[arg(short, long, global = true)]
    reader: Option<String>,

    /// Debug level output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available readers
    List,

    /// Decode the ATR of the inserted card and the capabilities it declares
    Atr,

    /// List the control features the reader offers
    Features,

    /// Show the PACE variants the reader implements
    PaceCaps,

    /// Establish a PACE channel through the reader
    Pace {
        /// Password type
        #[arg(long, value_enum, default_value_t = PinIdArg::Can)]
        pin_id: PinIdArg,

        /// Password to hand to the reader (entered on the PIN pad when omitted)
        #[arg(long)]
        pin: Option<String>,

        /// CHAT for a following Terminal Authentication, as hex
        #[arg(long)]
        chat: Option<String>,

        /// Seconds to wait for the reader
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },

    /// Send a command APDU and print the response
    Send {
        /// Command APDU as hex, spaces allowed
        #[arg(required = true)]
        apdu: String,
    },
}

/// Password types accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PinIdArg {
    /// Machine readable zone
    Mrz,
    /// Card access number
    Can,
    /// eID PIN
    Pin,
    /// PIN unblocking key
    Puk,
}

impl From<PinIdArg> for PinId {
    fn from(arg: PinIdArg) -> Self {
        match arg {
            PinIdArg::Mrz => Self::Mrz,
            PinIdArg::Can => Self::Can,
            PinIdArg::Pin => Self::Pin,
            PinIdArg::Puk => Self::Puk,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let manager = PcscDeviceManager::new()?;

    if let Commands::List = cli.command {
        return list_readers(&manager);
    }

    // Reader features do not need a card
    let require_card = !matches!(cli.command, Commands::Features | Commands::PaceCaps);
    let reader = reader::select_reader(&manager, cli.reader.as_deref(), require_card)?;
    info!("Using reader: {}", reader.name());

    match cli.command {
        Commands::List => unreachable!(), // Already handled above
        Commands::Atr => atr_command(&manager, &reader)?,
        Commands::Features => features_command(&manager, &reader)?,
        Commands::PaceCaps => pace_caps_command(&manager, &reader)?,
        Commands::Pace {
            pin_id,
            pin,
            chat,
            timeout,
        } => pace_command(&manager, &reader, pin_id.into(), pin, chat.as_deref(), timeout)?,
        Commands::Send { apdu } => send_command(&manager, &reader, &apdu)?,
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    // RUST_LOG still wins when set
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .init();
}
