//! ABC Retail CLI - Storage provisioning and inspection tools.
//!
//! # Usage
//!
//! ```bash
//! # Create every table, container, queue, share and directory
//! retail-cli provision
//!
//! # Print all customers or products
//! retail-cli customers list
//! retail-cli products list
//!
//! # Put a message on the order queue, or take the next one off
//! retail-cli queue send "Order #1042 ready for dispatch"
//! retail-cli queue receive
//!
//! # Print contract file names
//! retail-cli contracts list
//! ```
//!
//! Every command reads the same environment as the web server
//! (`AZURE_STORAGE_CONNECTION_STRING`, `RETAIL_IMAGE_URLS`, ...) and
//! provisions storage before doing its own work.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "retail-cli")]
#[command(author, version, about = "ABC Retail storage tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision all storage resources and exit
    Provision,
    /// Inspect the customers table
    Customers {
        #[command(subcommand)]
        action: ListAction,
    },
    /// Inspect the products table
    Products {
        #[command(subcommand)]
        action: ListAction,
    },
    /// Work with the order queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Inspect the contracts share
    Contracts {
        #[command(subcommand)]
        action: ListAction,
    },
}

#[derive(Subcommand)]
enum ListAction {
    /// Print every entry
    List,
}

#[derive(Subcommand)]
enum QueueAction {
    /// Append a message to the order queue
    Send {
        /// Message text
        text: String,
    },
    /// Receive and delete the next visible message
    Receive,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let storage = commands::connect().await?;
    match cli.command {
        Commands::Provision => tracing::info!("Storage is ready"),
        Commands::Customers {
            action: ListAction::List,
        } => commands::tables::customers(&storage).await?,
        Commands::Products {
            action: ListAction::List,
        } => commands::tables::products(&storage).await?,
        Commands::Queue { action } => match action {
            QueueAction::Send { text } => commands::queue::send(&storage, &text).await?,
            QueueAction::Receive => commands::queue::receive(&storage).await?,
        },
        Commands::Contracts {
            action: ListAction::List,
        } => commands::contracts::list(&storage).await?,
    }
    Ok(())
}
