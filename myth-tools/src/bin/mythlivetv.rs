//! Live-TV capture: grab a free recorder, spawn its live-TV chain, and
//! stream segments to a file as the chain grows — crossing segment
//! boundaries transparently via `Chain::request_block`, with an optional
//! channel change before capture begins.

use clap::{App, Arg};
use myth_client::chain::DEFAULT_WAIT;
use myth_client::{ChainState, Recorder};
use myth_tools::{build_logger, fail, parse_common, with_common_args};
use std::fs::File;
use std::io::Write;
use std::time::{Duration, Instant};

const BLOCK_SIZE: usize = 64 * 1024;

fn main() {
    let app = with_common_args(
        App::new("mythlivetv")
            .version("0.1")
            .about("Capture live TV from a free recorder to a file")
            .arg(
                Arg::with_name("channel")
                    .short("c")
                    .long("channel")
                    .value_name("NAME")
                    .help("Tune to this channel before capturing")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("seconds")
                    .short("s")
                    .long("seconds")
                    .value_name("N")
                    .help("Stop capturing after N seconds")
                    .default_value("30")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("output")
                    .short("o")
                    .long("output")
                    .value_name("FILE")
                    .help("Output file")
                    .default_value("livetv.ts")
                    .takes_value(true),
            ),
    );
    let matches = app.get_matches();
    let opts = parse_common(&matches);
    let log = build_logger(opts.verbose);

    let control = match myth_client::Connection::connect_ctrl(&opts.host, opts.port, opts.rcvbuf, log.clone()) {
        Ok(conn) => conn,
        Err(err) => fail(format!("could not connect to {}:{}: {}", opts.host, opts.port, err)),
    };

    let recorder = match Recorder::get_free_recorder(&control, opts.rcvbuf, log.clone()) {
        Ok(recorder) => recorder,
        Err(err) => fail(format!("GET_FREE_RECORDER failed: {}", err)),
    };

    eprintln!("using recorder {} on {}:{}", recorder.id(), recorder.server(), recorder.port());

    let chain = match recorder.spawn_chain_livetv() {
        Ok(chain) => chain,
        Err(err) => fail(format!("SPAWN_LIVETV failed: {}", err)),
    };

    if let Some(name) = matches.value_of("channel") {
        if let Err(err) = recorder.set_channel(name) {
            fail(format!("SET_CHANNEL failed: {}", err));
        }
        // The chain may still hold segments from before the channel change;
        // jump past them once the new channel's segment shows up.
        while chain.state() == ChainState::Empty {
            if !chain.add_wait(DEFAULT_WAIT) {
                fail("timed out waiting for the live-TV chain to start");
            }
        }
        if let Err(err) = chain.switch_last() {
            fail(format!("switch_last failed: {}", err));
        }
    } else {
        while chain.state() == ChainState::Empty {
            if !chain.add_wait(DEFAULT_WAIT) {
                fail("timed out waiting for the live-TV chain to start");
            }
        }
    }

    let output_path = matches.value_of("output").unwrap_or("livetv.ts");
    let mut output = match File::create(output_path) {
        Ok(file) => file,
        Err(err) => fail(format!("could not create {}: {}", output_path, err)),
    };

    let seconds: u64 = matches.value_of("seconds").and_then(|v| v.parse().ok()).unwrap_or(30);
    let deadline = Instant::now() + Duration::from_secs(seconds);

    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut total: u64 = 0;

    while Instant::now() < deadline {
        let granted = match chain.request_block(BLOCK_SIZE) {
            Ok(granted) => granted,
            Err(err) => {
                eprintln!("request_block failed: {}", err);
                break;
            }
        };

        if granted == 0 {
            if !chain.add_wait(DEFAULT_WAIT) {
                eprintln!("no further segment arrived, stopping");
                break;
            }
            continue;
        }

        let mut remaining = granted as usize;
        while remaining > 0 {
            let want = remaining.min(buf.len());
            let read = match chain.get_block(&mut buf[..want]) {
                Ok(read) => read,
                Err(err) => {
                    eprintln!("get_block failed: {}", err);
                    break;
                }
            };

            if read == 0 {
                break;
            }

            if let Err(err) = output.write_all(&buf[..read]) {
                fail(format!("write failed: {}", err));
            }

            remaining -= read;
            total += read as u64;
        }
    }

    eprintln!("captured {} bytes to {}", total, output_path);
    chain.close();
    let _ = recorder.stop_livetv();
}
