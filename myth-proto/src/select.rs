//! Readiness polling for sockets that are otherwise read with blocking
//! `recv`. The C client used `select(2)` for this (`cmyth_conn_check_block`,
//! `cmyth_file_select`, `cmyth_event_select`); here the same one-shot
//! readiness check is built on `mio`, matching how the rest of this
//! workspace talks to sockets.

use mio::net::TcpStream as MioTcpStream;
use mio::{Events, Poll, PollOpt, Ready, Token};
use std::net::TcpStream;
use std::time::Duration;

const READY_TOKEN: Token = Token(0);

/// Block until `stream` is readable or `timeout` elapses. Returns `true` if
/// data became available, `false` on timeout.
pub fn wait_readable(stream: &TcpStream, timeout: Duration) -> std::io::Result<bool> {
    let mio_stream = MioTcpStream::from_stream(stream.try_clone()?)?;

    let poll = Poll::new()?;
    poll.register(&mio_stream, READY_TOKEN, Ready::readable(), PollOpt::edge())?;

    let mut events = Events::with_capacity(1);
    poll.poll(&mut events, Some(timeout))?;

    Ok(events.iter().any(|event| event.token() == READY_TOKEN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_wait_readable_times_out_with_no_data() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(addr).unwrap();
        let _server_side = listener.accept().unwrap();

        let ready = wait_readable(&client, Duration::from_millis(50)).unwrap();
        assert!(!ready);
    }

    #[test]
    fn test_wait_readable_returns_true_once_data_arrives() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(addr).unwrap();
        let (mut server_side, _) = listener.accept().unwrap();

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            server_side.write_all(b"hi").unwrap();
        });

        let ready = wait_readable(&client, Duration::from_secs(2)).unwrap();
        assert!(ready);
    }
}
