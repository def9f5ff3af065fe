//! Block cache driver - Main Entry Point
//!
//! Usage: block-cache [OPTIONS] <layout_file> <script_file> <output_file>
//!
//! Arguments:
//!   layout_file - RAM budget and per-band grid shapes
//!   script_file - Block requests and grid growth commands, one per line
//!   output_file - One result line per command

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{debug, info};

use raster_block_cache::io::{read_layout, read_script, write_results};
use raster_block_cache::{logging, BlockManager};

#[derive(Parser)]
#[command(name = "block-cache")]
#[command(about = "Run a block request script against a disk-backed block cache", long_about = None)]
struct Args {
    /// Layout file: `max_ram_blocks|<bytes>B [max_disk_file_size]` then `blocks_x blocks_y block_size` per band
    layout_file: PathBuf,

    /// Script file with one command per line
    script_file: PathBuf,

    /// Output file for command results
    output_file: PathBuf,

    /// Log every swap and growth step
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    // Run the script and handle any errors
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main logic separated from main() for cleaner error handling
fn run(args: &Args) -> Result<(), String> {
    // Step 1: Parse layout and set up the cache
    let config = read_layout(&args.layout_file)?;
    let mut manager = BlockManager::with_config(&config).map_err(|e| e.to_string())?;

    info!(
        bands = config.bands.len(),
        total_blocks = config.total_blocks(),
        max_ram_blocks = config.max_ram_blocks,
        block_size = manager.max_block_size_bytes(),
        "Block cache ready"
    );

    // Step 2: Read commands
    let commands = read_script(&args.script_file)?;
    debug!(commands = commands.len(), "Script loaded");

    // Step 3: Execute; any failure aborts the run
    let mut results = Vec::with_capacity(commands.len());
    for (line, command) in commands.iter().enumerate() {
        let output = command
            .execute(&mut manager)
            .map_err(|e| format!("command {} ({:?}) failed: {}", line + 1, command, e))?;
        debug!(?command, %output, "Command executed");
        results.push(output);
    }

    info!(
        stats = %manager.stats(),
        resident = manager.resident_count(),
        scratch_files = manager.disk_file_count(),
        free_disk_slots = manager.free_disk_slot_count(),
        "Summary"
    );

    // Step 4: Write results
    write_results(&args.output_file, &results)?;
    info!(path = %args.output_file.display(), "Results written");

    Ok(())
}
