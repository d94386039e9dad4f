/*
 * blockmirror - multi-mirror, block-parallel downloader.
 * Copyright (C) 2025  blockmirror contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::io::IsTerminal;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use blockmirror::progress::{FancyReporter, LogfileReporter, ProgressReporter};
use blockmirror::{config, download, logging};

/// Fetch a single large artifact from several redundant mirrors in
/// parallel, splitting it into fixed-size blocks.
#[derive(Parser)]
#[command(name = "blockmirror")]
#[command(author = "blockmirror contributors")]
#[command(version)]
struct Cli {
    /// Where to write the downloaded artifact.
    destination: std::path::PathBuf,

    /// A mirror base URL; repeat to race several mirrors. At least one
    /// is required.
    #[arg(long = "mirror", required = true)]
    mirrors: Vec<String>,

    /// Increase log verbosity (can be repeated: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    logging::init_with_level(level);

    let filename = cli
        .destination
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("destination must name a file"))?
        .to_string();

    let mut fancy;
    let mut logfile;
    let reporter: &mut dyn ProgressReporter = if std::io::stdout().is_terminal() {
        fancy = FancyReporter::new(filename, &cli.mirrors);
        &mut fancy
    } else {
        logfile = LogfileReporter::new(filename, &cli.mirrors);
        &mut logfile
    };

    let config = config::Config::default();

    download::run(&cli.destination, &cli.mirrors, &config, reporter)
        .await
        .context("download failed")?;

    Ok(())
}
