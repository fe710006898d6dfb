//! File dumper: pick a recorded program from the backend's recordings list
//! and stream its file contents to stdout (or `--output`), pacing reads with
//! `REQUEST_BLOCK`/`get_block`.

use clap::{App, Arg};
use myth_client::file_transfer::BLOCK_READ_TIMEOUT;
use myth_client::{Connection, FileTransfer, ProgramList, DATA_RCVBUF};
use myth_tools::{build_logger, fail, parse_common, with_common_args};
use std::fs::File;
use std::io::{self, Write};
use std::sync::Arc;

const BLOCK_SIZE: usize = 128 * 1024;

fn main() {
    let app = with_common_args(
        App::new("mythdump")
            .version("0.1")
            .about("Dump a recorded program's file contents to stdout or a file")
            .arg(
                Arg::with_name("index")
                    .short("i")
                    .long("index")
                    .value_name("N")
                    .help("Index into QUERY_RECORDINGS Play (default 0)")
                    .default_value("0")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("output")
                    .short("o")
                    .long("output")
                    .value_name("FILE")
                    .help("Write to FILE instead of stdout")
                    .takes_value(true),
            ),
    );
    let matches = app.get_matches();
    let opts = parse_common(&matches);
    let log = build_logger(opts.verbose);

    let index: usize = matches.value_of("index").and_then(|v| v.parse().ok()).unwrap_or(0);

    let control = match Connection::connect_ctrl(&opts.host, opts.port, opts.rcvbuf, log.clone()) {
        Ok(conn) => Arc::new(conn),
        Err(err) => fail(format!("could not connect to {}:{}: {}", opts.host, opts.port, err)),
    };

    let recordings = match ProgramList::query_recordings(&control) {
        Ok(list) => list,
        Err(err) => fail(format!("QUERY_RECORDINGS failed: {}", err)),
    };

    let program = match recordings.get(index) {
        Some(program) => program.clone(),
        None => fail(format!("no recording at index {} ({} available)", index, recordings.count())),
    };

    eprintln!("dumping {:?} ({} bytes) from {}", program.title, program.length(), program.pathname);

    let file = match FileTransfer::open(&program, control, DATA_RCVBUF, log) {
        Ok(file) => file,
        Err(err) => fail(format!("could not open file transfer: {}", err)),
    };

    let mut sink: Box<dyn Write> = match matches.value_of("output") {
        Some(path) => match File::create(path) {
            Ok(file) => Box::new(file),
            Err(err) => fail(format!("could not create {}: {}", path, err)),
        },
        None => Box::new(io::stdout()),
    };

    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut total: u64 = 0;
    let expected = file.length();

    while total < expected {
        let granted = match file.request_block(BLOCK_SIZE) {
            Ok(granted) => granted,
            Err(err) => fail(format!("REQUEST_BLOCK failed: {}", err)),
        };

        if granted == 0 {
            break;
        }

        let mut remaining = granted as usize;
        while remaining > 0 {
            let want = remaining.min(buf.len());
            let read = match file.get_block(&mut buf[..want]) {
                Ok(read) => read,
                Err(err) => fail(format!("get_block failed: {}", err)),
            };

            if read == 0 {
                eprintln!("data socket stalled past {:?}, stopping", BLOCK_READ_TIMEOUT);
                break;
            }

            if let Err(err) = sink.write_all(&buf[..read]) {
                fail(format!("write failed: {}", err));
            }

            remaining -= read;
            total += read as u64;
        }
    }

    eprintln!("done: {} of {} bytes", total, expected);
    let _ = file.close();
}
