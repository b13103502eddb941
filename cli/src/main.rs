use anyhow::Context;
use bootfs_core::{Disk, ImageMedium};
use bootfs_filesystems::{load_file, load_to_vec, MountOptions, Volume, DEFAULT_CHUNK_SIZE};
use bootfs_filesystems::fat12::DEFAULT_SCRATCH_BUDGET;
use clap::{Parser, Subcommand};
use log::{debug, info};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(test)]
#[path = "../../filesystems/src/test_helpers.rs"]
mod test_helpers;

type ImageVolume = Volume<Disk<ImageMedium<File>>>;

#[derive(Parser)]
#[command(name = "bootfs")]
#[command(about = "Inspect and extract files from FAT12 boot images", long_about = None)]
struct Cli {
    /// Drive number reported to the medium
    #[arg(long, global = true, default_value = "0x00", value_parser = parse_u8)]
    drive: u8,

    /// Bytes reserved for volume structures plus the allocation table
    #[arg(long, global = true, default_value_t = DEFAULT_SCRATCH_BUDGET, value_parser = parse_usize)]
    scratch_budget: usize,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show boot sector and layout details
    Info {
        image: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List a directory
    Ls {
        image: PathBuf,
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print a file, escaping non-printable bytes
    Cat {
        image: PathBuf,
        path: String,
    },
    /// Copy a file out of the image through a fixed-size load buffer
    Load {
        image: PathBuf,
        path: String,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        /// Load buffer size in bytes
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_usize)]
        chunk: usize,
    },
}

fn parse_usize(value: &str) -> Result<usize, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", value, e))
}

fn parse_u8(value: &str) -> Result<u8, String> {
    let parsed = parse_usize(value)?;
    u8::try_from(parsed).map_err(|_| format!("drive number out of range: {}", value))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let stdout = io::stdout();
    run(cli, &mut stdout.lock())
}

fn mount(image: &Path, drive: u8, scratch_budget: usize) -> anyhow::Result<ImageVolume> {
    let medium = ImageMedium::open(image)
        .with_context(|| format!("Failed to open image {}", image.display()))?;
    let disk = Disk::initialize(medium, drive)
        .with_context(|| format!("Failed to query geometry of {}", image.display()))?;
    let volume = Volume::mount_with(disk, MountOptions { scratch_budget })
        .with_context(|| format!("Failed to mount {}", image.display()))?;
    debug!("Mounted {} with a {} byte scratch budget", image.display(), scratch_budget);
    Ok(volume)
}

fn run<W: Write>(cli: Cli, out: &mut W) -> anyhow::Result<()> {
    match cli.command {
        Commands::Info { image, json } => {
            let volume = mount(&image, cli.drive, cli.scratch_budget)?;
            let info = volume.info();

            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&info)?)?;
            } else {
                writeln!(out, "Volume: {}", image.display())?;
                writeln!(out, "  Label: {}", info.label)?;
                writeln!(out, "  System: {}", info.system_id)?;
                writeln!(out, "  Volume ID: {:08X}", info.volume_id)?;
                writeln!(
                    out,
                    "  Geometry: {} cylinders, {} heads, {} sectors/track",
                    info.geometry.cylinders, info.geometry.heads, info.geometry.sectors_per_track
                )?;
                writeln!(out, "  Bytes per sector: {}", info.bytes_per_sector)?;
                writeln!(out, "  Sectors per cluster: {}", info.sectors_per_cluster)?;
                writeln!(out, "  Total sectors: {}", info.total_sectors)?;
                writeln!(
                    out,
                    "  FAT: {} copies of {} sectors at LBA {}",
                    info.fat_count, info.sectors_per_fat, info.fat_lba
                )?;
                writeln!(
                    out,
                    "  Root directory: {} entries, {} sectors at LBA {}",
                    info.root_entries, info.root_dir_sectors, info.root_dir_lba
                )?;
                writeln!(out, "  Data: LBA {}, {} clusters", info.data_lba, info.cluster_count)?;
            }
            info!("Reported volume info for {}", image.display());
        }
        Commands::Ls { image, path } => {
            let mut volume = mount(&image, cli.drive, cli.scratch_budget)?;
            let entries = volume
                .list(&path)
                .with_context(|| format!("Failed to list {}", path))?;

            info!("Listing {} entries of {}", entries.len(), path);
            for entry in entries {
                let size = if entry.is_directory() {
                    "<DIR>".to_string()
                } else {
                    entry.size.to_string()
                };
                let modified = entry
                    .modified()
                    .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                writeln!(out, "{:<12} {:>10}  {}", entry.display_name(), size, modified)?;
            }
        }
        Commands::Cat { image, path } => {
            let mut volume = mount(&image, cli.drive, cli.scratch_budget)?;
            let data = load_to_vec(&mut volume, &path)
                .with_context(|| format!("Failed to read {}", path))?;
            info!("Read {} bytes from {}", data.len(), path);
            writeln!(out, "{}", render_printable(&data))?;
        }
        Commands::Load { image, path, output, chunk } => {
            let mut volume = mount(&image, cli.drive, cli.scratch_budget)?;
            let mut file = File::create(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            let total = load_file(&mut volume, &path, chunk, &mut file)
                .with_context(|| format!("Failed to load {}", path))?;
            file.flush()?;
            info!("Wrote {} bytes to {}", total, output.display());
            writeln!(out, "Loaded {} bytes from {} into {}", total, path, output.display())?;
        }
    }

    Ok(())
}

/// Printable ASCII as-is, everything else as `<xx>`.
fn render_printable(data: &[u8]) -> String {
    let mut text = String::with_capacity(data.len());
    for &byte in data {
        if (0x20..=0x7E).contains(&byte) {
            text.push(byte as char);
        } else {
            text.push_str(&format!("<{:02x}>", byte));
        }
    }
    text
}
