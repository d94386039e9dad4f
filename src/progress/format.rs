/*
 * blockmirror - multi-mirror, block-parallel downloader.
 * Copyright (C) 2025  blockmirror contributors
 */

//! SI byte-count and throughput formatting shared by both renderers.

/// Format `n` as an SI byte count: round down, one decimal place only
/// when the whole part is a single digit.
pub fn format_size(n: u64) -> String {
    format_size_unit(n, "B")
}

fn format_size_unit(n: u64, unit: &str) -> String {
    const PREFIXES: [char; 6] = [' ', 'k', 'M', 'G', 'T', 'P'];

    let digits = n.to_string();
    let groups: Vec<&str> = digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| std::str::from_utf8(chunk).unwrap())
        .collect();

    let whole = groups[0];
    let rest = &groups[1..];

    let decimal = if whole.len() == 1 && !rest.is_empty() {
        format!(".{}", &rest[0][..1])
    } else {
        String::new()
    };

    let prefix = PREFIXES[rest.len().min(PREFIXES.len() - 1)];
    let prefix = if prefix == ' ' { String::new() } else { prefix.to_string() };

    format!("{whole}{decimal}{prefix}{unit}")
}

/// Format a throughput of `n` bytes over `elapsed` seconds. Empty string
/// for durations under a second or zero bytes, matching the reference
/// renderer's "don't show noise" behaviour.
pub fn format_speed(n: u64, elapsed: f64) -> String {
    if elapsed < 1.0 || n == 0 {
        return String::new();
    }

    format_size_unit((n as f64 / elapsed) as u64, "B/s")
}
