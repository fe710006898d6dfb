//! Recordings listing: a read-only, non-FUSE stand-in for the filesystem
//! bridge — prints the backend's recordings (and, on request, its pending
//! and scheduled program lists) the way a directory listing would, without
//! actually mounting anything. Mounting a filesystem is the bridge's job
//! and is explicitly an external collaborator, out of this core's scope.

use clap::{App, Arg};
use myth_client::{Connection, ProgramInfo, ProgramList};
use myth_tools::{build_logger, fail, parse_common, with_common_args};

fn print_list(label: &str, list: &ProgramList, as_json: bool) {
    if as_json {
        let programs: Vec<&ProgramInfo> = list.iter().map(|p| p.as_ref()).collect();
        match serde_json::to_string_pretty(&programs) {
            Ok(text) => println!("{}", text),
            Err(err) => eprintln!("warning: could not serialize {}: {}", label, err),
        }
        return;
    }

    println!("{} ({}):", label, list.count());
    for program in list.iter() {
        println!(
            "  {:>12}  {:>10}  {:<30}  {}",
            program.chan_str,
            program.length(),
            program.title,
            program.pathname,
        );
    }
}

fn main() {
    let app = with_common_args(
        App::new("mythls")
            .version("0.1")
            .about("List recordings known to a myth backend")
            .arg(
                Arg::with_name("pending")
                    .long("pending")
                    .help("Also list pending recordings"),
            )
            .arg(
                Arg::with_name("scheduled")
                    .long("scheduled")
                    .help("Also list scheduled recordings"),
            )
            .arg(
                Arg::with_name("sort")
                    .long("sort")
                    .value_name("KEY")
                    .help("Sort recordings by 'recorded' or 'airdate'")
                    .possible_values(&["recorded", "airdate"])
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("json")
                    .long("json")
                    .help("Print each list as JSON instead of a table"),
            ),
    );
    let matches = app.get_matches();
    let opts = parse_common(&matches);
    let log = build_logger(opts.verbose);

    let conn = match Connection::connect_ctrl(&opts.host, opts.port, opts.rcvbuf, log) {
        Ok(conn) => conn,
        Err(err) => fail(format!("could not connect to {}:{}: {}", opts.host, opts.port, err)),
    };

    let mut recordings = match ProgramList::query_recordings(&conn) {
        Ok(list) => list,
        Err(err) => fail(format!("QUERY_RECORDINGS failed: {}", err)),
    };

    match matches.value_of("sort") {
        Some("recorded") => recordings.sort_by_date_recorded(),
        Some("airdate") => recordings.sort_by_original_airdate(),
        _ => {}
    }

    let as_json = matches.is_present("json");
    print_list("recordings", &recordings, as_json);

    if matches.is_present("pending") {
        match ProgramList::query_all_pending(&conn) {
            Ok(list) => print_list("pending", &list, as_json),
            Err(err) => eprintln!("warning: QUERY_GETALLPENDING failed: {}", err),
        }
    }

    if matches.is_present("scheduled") {
        match ProgramList::query_all_scheduled(&conn) {
            Ok(list) => print_list("scheduled", &list, as_json),
            Err(err) => eprintln!("warning: QUERY_GETALLSCHEDULED failed: {}", err),
        }
    }

    conn.close();
}
