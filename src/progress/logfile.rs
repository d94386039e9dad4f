/*
 * blockmirror - multi-mirror, block-parallel downloader.
 * Copyright (C) 2025  blockmirror contributors
 */

//! Plain-text progress renderer for non-TTY output (piped or redirected
//! stdout): one line per event instead of an animated display.

use std::collections::HashMap;
use std::io::Write;

use super::ProgressReporter;
use crate::download::block::Block;
use crate::error::MirrorError;

pub struct LogfileReporter {
    filename: String,
    legend: HashMap<String, char>,
}

impl LogfileReporter {
    pub fn new(filename: String, prefixes: &[String]) -> Self {
        let legend = prefixes
            .iter()
            .enumerate()
            .map(|(i, prefix)| (prefix.clone(), (b'a' + i as u8) as char))
            .collect();

        Self { filename, legend }
    }
}

impl ProgressReporter for LogfileReporter {
    fn start(&mut self) {
        println!("Downloading {} from:", self.filename);
        for (prefix, letter) in sorted_by_letter(&self.legend) {
            println!("  {letter} {prefix}");
        }
        println!();
    }

    fn report_size(&mut self, prefix: &str, size: u64) {
        println!();
        println!("{prefix} reported a size of {size}");
        println!();
    }

    fn report_error(&mut self, prefix: &str, error: &MirrorError) {
        println!();
        println!("{prefix} reported an error: {error}");
        println!();
    }

    fn report_progress(&mut self, _prefix: Option<&str>, _n: u64) {
        // The fancy renderer animates byte counts; the logfile renderer
        // only marks block completions (see report_block).
    }

    fn report_block(&mut self, prefix: &str, block: &Block) {
        let letter = self.legend.get(prefix).copied().unwrap_or('?');
        let name = block.path.file_name().and_then(|n| n.to_str()).unwrap_or("?");
        print!("[{letter}:{name}]");
        let _ = std::io::stdout().flush();
    }

    fn refresh(&mut self) {}

    fn fatal(&mut self, msg: &str) {
        println!();
        println!("download failed: {msg}");
    }

    fn finish(&mut self) {
        println!();
        println!("successfully downloaded {}", self.filename);
    }
}

fn sorted_by_letter(legend: &HashMap<String, char>) -> Vec<(&String, char)> {
    let mut entries: Vec<(&String, char)> = legend.iter().map(|(k, v)| (k, *v)).collect();
    entries.sort_by_key(|(_, letter)| *letter);
    entries
}
