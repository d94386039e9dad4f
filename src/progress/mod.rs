/*
 * blockmirror - multi-mirror, block-parallel downloader.
 * Copyright (C) 2025  blockmirror contributors
 */

//! Progress reporter interface.
//!
//! The download engine depends only on [`ProgressReporter`]; it never
//! chooses a concrete renderer itself. `main` picks [`fancy::FancyReporter`]
//! or [`logfile::LogfileReporter`] based on whether standard output is a
//! terminal.

mod fancy;
mod format;
mod logfile;

pub use fancy::FancyReporter;
pub use logfile::LogfileReporter;

use crate::download::block::Block;
use crate::error::MirrorError;

/// Capability set the download engine invokes to report its progress.
/// Every method is side-effecting, must not panic, and must be cheap
/// enough to call once per network chunk.
pub trait ProgressReporter {
    /// Called once before any mirror is contacted.
    fn start(&mut self);

    /// `prefix` reported the artifact is `size` bytes long.
    fn report_size(&mut self, prefix: &str, size: u64);

    /// `prefix` has died; `error` explains why.
    fn report_error(&mut self, prefix: &str, error: &MirrorError);

    /// `n` bytes were written for the block currently owned by `prefix`.
    /// `prefix` is `None` when the bytes were already on disk and are
    /// being counted without attribution to any particular mirror.
    fn report_progress(&mut self, prefix: Option<&str>, n: u64);

    /// `block` was fully materialised by the mirror identified by `prefix`.
    fn report_block(&mut self, prefix: &str, block: &Block);

    /// Called once per supervisor loop iteration, including on an empty
    /// poll, so an animated renderer can tick.
    fn refresh(&mut self);

    /// The run has failed; `msg` is a short human-readable reason.
    fn fatal(&mut self, msg: &str);

    /// The run has succeeded.
    fn finish(&mut self);
}
