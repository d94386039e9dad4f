/*
 * blockmirror - multi-mirror, block-parallel downloader.
 * Copyright (C) 2025  blockmirror contributors
 */

//! TTY-aware progress renderer: one heading bar for the overall transfer
//! plus one line per mirror, styled with `indicatif`/`console`.

use std::collections::HashMap;
use std::time::Instant;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::format::{format_size, format_speed};
use super::ProgressReporter;
use crate::download::block::Block;
use crate::error::MirrorError;

pub struct FancyReporter {
    filename: String,
    heading: ProgressBar,
    bars: HashMap<String, ProgressBar>,
    progress: HashMap<String, u64>,
    /// Bytes counted so far for the block each mirror currently holds.
    /// Reset to 0 when that block completes; subtracted back out of
    /// `progress`/`total` if the mirror dies mid-block, since that block
    /// gets re-queued and its bytes will be counted again from scratch.
    block_progress: HashMap<String, u64>,
    total: u64,
    size: Option<u64>,
    start: Instant,
}

impl FancyReporter {
    pub fn new(filename: String, prefixes: &[String]) -> Self {
        let multi = MultiProgress::new();

        let heading = multi.add(ProgressBar::new(0));
        heading.set_style(
            ProgressStyle::with_template("{msg}")
                .expect("static template is valid"),
        );

        let mirror_style = ProgressStyle::with_template("  {prefix:.cyan} {msg}")
            .expect("static template is valid");

        let mut bars = HashMap::new();
        let mut progress = HashMap::new();
        let mut block_progress = HashMap::new();
        for prefix in prefixes {
            let bar = multi.add(ProgressBar::new_spinner());
            bar.set_style(mirror_style.clone());
            bar.set_prefix(prefix.clone());
            bar.enable_steady_tick(std::time::Duration::from_millis(200));
            bars.insert(prefix.clone(), bar);
            progress.insert(prefix.clone(), 0u64);
            block_progress.insert(prefix.clone(), 0u64);
        }

        Self {
            filename,
            heading,
            bars,
            progress,
            block_progress,
            total: 0,
            size: None,
            start: Instant::now(),
        }
    }

    fn render_heading(&self) {
        let message = match self.size {
            Some(size) => {
                let elapsed = self.start.elapsed().as_secs_f64();
                let speed = format_speed(self.total, elapsed);
                format!(
                    "{} {} of {} {}",
                    style(&self.filename).bold(),
                    format_size(self.total),
                    format_size(size),
                    speed,
                )
            }
            None => format!("{} (connecting...)", style(&self.filename).bold()),
        };
        self.heading.set_message(message);
    }
}

impl ProgressReporter for FancyReporter {
    fn start(&mut self) {
        self.render_heading();
    }

    fn report_size(&mut self, _prefix: &str, size: u64) {
        self.size = Some(size);
        self.heading.set_length(size);
        self.render_heading();
    }

    fn report_error(&mut self, prefix: &str, error: &MirrorError) {
        // The block this mirror was holding, if any, is re-queued and
        // will be counted again in full once another mirror completes
        // it; undo its partial contribution so `total` doesn't overshoot
        // `size`.
        let in_flight = self.block_progress.remove(prefix).unwrap_or(0);
        if in_flight > 0 {
            if let Some(counted) = self.progress.get_mut(prefix) {
                *counted = counted.saturating_sub(in_flight);
            }
            self.total = self.total.saturating_sub(in_flight);
            self.heading.set_position(self.total);
        }

        if let Some(bar) = self.bars.get(prefix) {
            bar.set_message(format!("{}", style(error.to_string()).red()));
            bar.disable_steady_tick();
        }
    }

    fn report_progress(&mut self, prefix: Option<&str>, n: u64) {
        self.total += n;
        self.heading.set_position(self.total);

        if let Some(prefix) = prefix {
            let counted = self.progress.entry(prefix.to_string()).or_insert(0);
            *counted += n;
            *self.block_progress.entry(prefix.to_string()).or_insert(0) += n;
            if let Some(bar) = self.bars.get(prefix) {
                let elapsed = self.start.elapsed().as_secs_f64();
                let speed = format_speed(*counted, elapsed);
                bar.set_message(format!("{} {}", format_size(*counted), speed));
            }
        }

        self.render_heading();
    }

    fn report_block(&mut self, prefix: &str, _block: &Block) {
        // The block completed cleanly; its bytes are already reflected
        // through report_progress, so just reset the per-block counter
        // for whatever this mirror picks up next.
        self.block_progress.insert(prefix.to_string(), 0);
    }

    fn refresh(&mut self) {
        self.render_heading();
    }

    fn fatal(&mut self, msg: &str) {
        self.heading.abandon_with_message(format!("{} {}", style("fatal:").red().bold(), msg));
        for bar in self.bars.values() {
            bar.disable_steady_tick();
        }
    }

    fn finish(&mut self) {
        self.heading.finish_with_message(format!(
            "{} downloaded",
            style(&self.filename).green().bold()
        ));
        for bar in self.bars.values() {
            bar.finish_and_clear();
        }
    }
}
