//! CLI tool for chartbind - resolves every chart in an OOXML package and
//! outputs JSON
//!
//! Usage:
//!   chartbind_cli <deck.pptx>              # Output JSON to stdout
//!   chartbind_cli <deck.pptx> -o out.json  # Output JSON to file

#![allow(clippy::exit)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::indexing_slicing)]

use std::env;
use std::fs;
use std::io::{self, Write};

use chartbind::{ChartSummary, Document};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: chartbind_cli <package> [-o output.json]");
        std::process::exit(1);
    }

    let input_path = &args[1];
    let output_path = if args.len() > 3 && args[2] == "-o" {
        Some(&args[3])
    } else {
        None
    };

    let data = match fs::read(input_path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error reading {}: {}", input_path, e);
            std::process::exit(1);
        }
    };

    let mut document = match Document::open(data) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error opening package: {}", e);
            std::process::exit(1);
        }
    };

    let ids: Vec<_> = document.chart_ids().collect();
    let mut summaries: Vec<ChartSummary> = Vec::with_capacity(ids.len());
    for id in ids {
        let summary = document.chart(id).and_then(|mut chart| chart.summary());
        match summary {
            Ok(s) => summaries.push(s),
            Err(e) => {
                let path = document.chart_path(id).unwrap_or("?");
                eprintln!("Skipping {}: {}", path, e);
            }
        }
    }

    let json = match serde_json::to_string_pretty(&summaries) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error serializing JSON: {}", e);
            std::process::exit(1);
        }
    };

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(path, &json) {
                eprintln!("Error writing {}: {}", path, e);
                std::process::exit(1);
            }
            eprintln!("Written: {}", path);
        }
        None => {
            io::stdout().write_all(json.as_bytes()).unwrap();
            println!();
        }
    }
}
