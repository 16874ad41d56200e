use africycle_core::*;
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::process;

#[derive(Parser)]
#[command(name = "africycle-cli")]
#[command(about = "AfriCycle Core CLI - Reward and carbon-offset simulation for the AfriCycle ledger")]
#[command(version = "1.0.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the reward for a collection against the default rate tables
    ComputeReward {
        /// Waste stream: plastic, ewaste, metal, general
        #[arg(short, long)]
        stream: String,

        /// Weight in kilograms
        #[arg(short, long)]
        weight: u64,

        /// Quality grade: low, medium, high, premium
        #[arg(short, long)]
        quality: String,
    },

    /// Compute the carbon-offset estimate against the default rate tables
    ComputeCarbon {
        /// Waste stream: plastic, ewaste, metal, general
        #[arg(short, long)]
        stream: String,

        /// Weight in kilograms
        #[arg(short, long)]
        weight: u64,

        /// Quality grade: low, medium, high, premium
        #[arg(short, long)]
        quality: String,
    },

    /// Print the default rate tables as JSON
    Rates,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::ComputeReward { stream, weight, quality } => {
            handle_compute_reward(stream, weight, quality)
        }
        Commands::ComputeCarbon { stream, weight, quality } => {
            handle_compute_carbon(stream, weight, quality)
        }
        Commands::Rates => handle_rates(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn parse_stream(s: &str) -> anyhow::Result<WasteStream> {
    WasteStream::parse(s).ok_or_else(|| anyhow!("unknown waste stream: {}", s))
}

fn parse_quality(s: &str) -> anyhow::Result<QualityGrade> {
    QualityGrade::parse(s).ok_or_else(|| anyhow!("unknown quality grade: {}", s))
}

fn handle_compute_reward(stream: String, weight: u64, quality: String) -> anyhow::Result<()> {
    let stream = parse_stream(&stream)?;
    let quality = parse_quality(&quality)?;
    let tables = RateTables::new();
    let reward = compute_reward(&tables, stream, weight, quality);

    println!("Stream: {}", stream);
    println!("Weight: {} kg", weight);
    println!("Quality: {}", quality);
    println!("Reward: {} micro-tokens ({} tokens)", reward, format_tokens(reward));

    Ok(())
}

fn handle_compute_carbon(stream: String, weight: u64, quality: String) -> anyhow::Result<()> {
    let stream = parse_stream(&stream)?;
    let quality = parse_quality(&quality)?;
    let tables = RateTables::new();
    let carbon = compute_carbon_offset(&tables, stream, weight, quality);

    println!("Stream: {}", stream);
    println!("Weight: {} kg", weight);
    println!("Quality: {}", quality);
    println!("Carbon offset: {} g CO2e", carbon);

    Ok(())
}

fn handle_rates() -> anyhow::Result<()> {
    let snapshot = RateTables::new().snapshot();
    let json = serde_json::to_string_pretty(&snapshot).context("serializing rate tables")?;
    println!("{}", json);
    Ok(())
}

/// Formats micro-tokens as a decimal token string (display only).
fn format_tokens(micro: u128) -> String {
    let whole = micro / MICRO_PER_TOKEN;
    let frac = micro % MICRO_PER_TOKEN;
    format!("{}.{:06}", whole, frac)
}
