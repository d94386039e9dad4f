/*
 * blockmirror - multi-mirror, block-parallel downloader.
 * Copyright (C) 2025  blockmirror contributors
 */

//! Multi-source block-parallel download engine.
//!
//! [`run`] is the single entry point: given a destination path, a list
//! of mirror base URLs, engine configuration, and a progress reporter,
//! it downloads the artifact and either returns `Ok(())` with
//! `destination` fully populated, or a fatal [`DownloadError`].

mod atomic_file;
pub mod block;
mod events;
mod mirror;
mod supervisor;
mod tls;
mod worker;

use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::progress::ProgressReporter;

/// Download `mirrors` in parallel, block by block, to `destination`.
pub async fn run(
    destination: &Path,
    mirrors: &[String],
    config: &Config,
    reporter: &mut dyn ProgressReporter,
) -> Result<()> {
    supervisor::run(destination, mirrors, config, reporter).await
}
