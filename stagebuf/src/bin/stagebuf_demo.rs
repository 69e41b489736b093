//! Staging CLI Demo
//!
//! Reads `bucket<TAB>payload` lines from stdin, stages each payload (plus a
//! newline) into its bucket, then closes the buffer and prints the counts.
//!
//! ```text
//! stagebuf_demo <root>
//! stagebuf_demo --config <config.json>
//! ```

use stagebuf::{Buffer, BufferConfig, BufferOptions, Error, LocalFs};
use std::fs::File;
use std::io::{self, BufRead};

fn options_from_args() -> Result<BufferOptions<LocalFs>, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [flag, path] if flag == "--config" => {
            Ok(BufferConfig::from_reader(File::open(path)?)?.into_options())
        }
        [root] => Ok(BufferOptions::new(root)),
        _ => Err("usage: stagebuf_demo <root> | --config <config.json>".into()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let buffer = Buffer::new(options_from_args()?);
    buffer.open()?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let Some((name, payload)) = line.split_once('\t') else {
            log::warn!("skipping line without a tab: {line:?}");
            continue;
        };
        match buffer.write(name, format!("{payload}\n").as_bytes()) {
            Err(Error::InvalidName { name }) => log::warn!("skipping bad bucket name: {name:?}"),
            other => other?,
        }
    }

    buffer.close()?;

    let mut names = buffer.buckets();
    names.sort();
    for name in &names {
        let stats = buffer.get(name)?.stats();
        println!("{name}: {} writes, {} bytes", stats.writes, stats.bytes);
    }
    println!(
        "total: {} buckets, {} writes, {} bytes in {}",
        buffer.size(),
        buffer.writes(),
        buffer.bytes(),
        buffer.root().display()
    );

    Ok(())
}
