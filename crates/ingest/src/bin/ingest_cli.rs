use std::env;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};

use chrono::{SecondsFormat, Utc};
use ingest::{DecodeContext, decoder_for};
use tracker_core::{DEFAULT_QUERY_MAX_CHARS, SessionSource};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("usage: ingest_cli <openclaw|codex> <path|->");
        std::process::exit(2);
    }

    let Some(source) = SessionSource::parse(&args[1]) else {
        eprintln!("unknown source: {}", args[1]);
        std::process::exit(2);
    };
    let path = &args[2];
    let mut data = Vec::new();
    if path == "-" {
        io::stdin().read_to_end(&mut data).unwrap_or_else(|err| {
            eprintln!("failed to read stdin: {}", err);
            std::process::exit(1);
        });
    } else {
        let file = File::open(path).unwrap_or_else(|err| {
            eprintln!("failed to open {}: {}", path, err);
            std::process::exit(1);
        });
        BufReader::new(file)
            .read_to_end(&mut data)
            .unwrap_or_else(|err| {
                eprintln!("failed to read {}: {}", path, err);
                std::process::exit(1);
            });
    }

    let ctx = DecodeContext {
        source_path: path.clone(),
        agent_id: None,
        fallback_updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        query_max_chars: DEFAULT_QUERY_MAX_CHARS,
    };
    let record = decoder_for(source)
        .decode_reader(&mut Cursor::new(data), &ctx)
        .unwrap_or_else(|err| {
            eprintln!("failed to decode {}: {}", path, err);
            std::process::exit(1);
        });

    match record {
        Some(record) => match serde_json::to_string_pretty(&record) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("failed to encode record: {}", err);
                std::process::exit(1);
            }
        },
        None => {
            eprintln!("no session found");
            std::process::exit(3);
        }
    }
}
