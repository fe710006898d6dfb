//! Alive probe: handshake with a backend, print the negotiated protocol
//! version and aggregate free space, then release. Exit 0 on success,
//! non-zero on any failure.

use clap::App;
use myth_client::{freespace, Connection};
use myth_tools::{build_logger, fail, parse_common, with_common_args};

fn main() {
    let app = with_common_args(
        App::new("mythstatus")
            .version("0.1")
            .about("Probe a myth backend for liveness and report its status"),
    );
    let matches = app.get_matches();
    let opts = parse_common(&matches);
    let log = build_logger(opts.verbose);

    let conn = match Connection::connect_ctrl(&opts.host, opts.port, opts.rcvbuf, log.clone()) {
        Ok(conn) => conn,
        Err(err) => fail(format!("could not connect to {}:{}: {}", opts.host, opts.port, err)),
    };

    println!("backend:  {}:{}", conn.host(), conn.port());
    println!("protocol: {}", conn.version());

    match freespace::query(&conn) {
        Ok(space) => {
            println!(
                "storage:  {:.1} GiB free of {:.1} GiB",
                space.free_bytes() as f64 / (1024.0 * 1024.0 * 1024.0),
                space.total_bytes as f64 / (1024.0 * 1024.0 * 1024.0),
            );
        }
        Err(err) => eprintln!("warning: could not query free space: {}", err),
    }

    conn.close();
}
