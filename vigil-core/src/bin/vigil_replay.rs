//! Vigil Replay CLI - drive a tracker from a recorded signal script
//!
//! Reads a JSONL script where each line is either a raw signal or a driver
//! directive, feeds it through a freshly installed tracker with a manual
//! clock, and prints every event the sink receives.
//!
//! Usage:
//!     vigil-replay script.jsonl
//!     vigil-replay --url https://example.com --pretty script.jsonl
//!
//! Script lines:
//!     {"signal": "scroll", "scroll_top": 600, "scroll_height": 1500, "client_height": 500}
//!     {"signal": "activity", "kind": "key_press"}
//!     {"advance_ms": 60000}
//!     {"observe": [{"element": 1, "info": {"tag": "img"}}]}
//!     {"unload": true}

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::Deserialize;

use vigil_core::{
    ElementCandidate, Environment, ManualClock, MemorySink, PageContext, Signal, Tracker,
    TrackerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "vigil-replay")]
#[command(about = "Replay a JSONL signal script through a Vigil tracker")]
#[command(version)]
struct Args {
    /// Path to the JSONL signal script
    script: PathBuf,

    /// Page URL for the simulated install
    #[arg(long, default_value = "https://example.com/")]
    url: String,

    /// Tracker configuration as a JSON object (defaults apply to omitted keys)
    #[arg(long)]
    config: Option<String>,

    /// Pretty-print event payloads
    #[arg(long)]
    pretty: bool,
}

/// One line of the replay script
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptLine {
    Signal(Signal),
    Advance { advance_ms: u64 },
    Observe { observe: Vec<ElementCandidate> },
    Unload { unload: bool },
}

fn main() {
    let args = Args::parse();

    let config: TrackerConfig = match &args.config {
        Some(raw) => match serde_json::from_str(raw) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error parsing --config: {}", e);
                std::process::exit(1);
            }
        },
        None => TrackerConfig::default(),
    };

    let file = match std::fs::File::open(&args.script) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening script {}: {}", args.script.display(), e);
            std::process::exit(1);
        }
    };

    let sink = Arc::new(MemorySink::new());
    let clock = Arc::new(ManualClock::at_epoch());
    let page = PageContext::new(&args.url, "vigil-replay", "");
    let env = Environment::new(sink.clone(), page).with_clock(clock.clone());
    let tracker = Tracker::new(config, env);

    let handle = match tracker.install() {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error installing tracker: {}", e);
            std::process::exit(1);
        }
    };
    eprintln!("session: {}", handle.session_id());

    let reader = std::io::BufReader::new(file);
    let mut printed = 0;
    for (line_no, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading line {}: {}", line_no + 1, e);
                std::process::exit(1);
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ScriptLine>(&line) {
            Ok(ScriptLine::Signal(signal)) => tracker.dispatch(&signal),
            Ok(ScriptLine::Advance { advance_ms }) => {
                clock.advance_ms(advance_ms);
                tracker.poll();
            }
            Ok(ScriptLine::Observe { observe }) => tracker.observe_elements(&observe),
            Ok(ScriptLine::Unload { unload }) => {
                if unload {
                    tracker.page_unload();
                }
            }
            Err(e) => {
                eprintln!("Skipping line {}: {}", line_no + 1, e);
                continue;
            }
        }

        // Print events as they appear so output interleaves with the script
        for event in sink.captured().iter().skip(printed) {
            print_event(event, args.pretty);
        }
        printed = sink.count();
    }

    let _ = tracker.uninstall();
    for event in sink.captured().iter().skip(printed) {
        print_event(event, args.pretty);
    }

    eprintln!("{} events", sink.count());
}

fn print_event(event: &vigil_core::CapturedEvent, pretty: bool) {
    let payload = if pretty {
        serde_json::to_string_pretty(&event.payload).unwrap_or_default()
    } else {
        serde_json::to_string(&event.payload).unwrap_or_default()
    };
    println!("{}\t{}", event.kind, payload);
}
