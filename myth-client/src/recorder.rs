//! `Recorder`: a handle to one tuner/encoder instance on the backend, plus
//! the dedicated control connection used to command it. Three construction
//! paths mirror `cmyth_conn_get_recorder_from_num`/`cmyth_conn_get_recorder`/
//! `cmyth_conn_get_free_recorder`: the first two address a specific recorder
//! (by a full round trip that opens a dedicated connection, or by borrowing
//! the caller's connection with no round trip at all), the third lets the
//! backend pick whichever recorder is free.

use crate::chain::Chain;
use crate::channel::ChannelList;
use crate::connection::Connection;
use crate::program::ProgramInfo;
use myth_proto::codec::{self, parse_status, Status};
use myth_proto::error::{Error, Result};
use myth_proto::logging::Logger;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static CHAIN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Direction argument to `CHANGE_CHANNEL`/`GET_NEXT_PROGRAM_INFO`, matching
/// `cmyth_channeldir_t`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ChannelDir {
    Up,
    Down,
    Favorite,
    Same,
}

impl ChannelDir {
    fn as_wire(self) -> i32 {
        match self {
            ChannelDir::Up => 0,
            ChannelDir::Down => 1,
            ChannelDir::Favorite => 2,
            ChannelDir::Same => 3,
        }
    }
}

pub struct Recorder {
    id: i32,
    server: String,
    port: u16,
    conn: Arc<Connection>,
    rcvbuf: usize,
    channels: ChannelList,
    chain: Mutex<Option<Arc<Chain>>>,
    log: Logger,
}

impl Recorder {
    /// `GET_RECORDER_FROM_NUM` — full round trip on `conn`, then opens a
    /// dedicated control connection to the recorder's host/port.
    pub fn get_recorder_from_num(conn: &Connection, id: i32, rcvbuf: usize, log: Logger) -> Result<Arc<Recorder>> {
        let body = format!("GET_RECORDER_FROM_NUM[]:[]{}", id);
        let reply = conn.request(&body)?;
        let fields = codec::split_fields(&reply);

        if fields.len() < 2 {
            return Err(Error::Protocol(format!("short GET_RECORDER_FROM_NUM reply: {:?}", reply)));
        }

        let server = fields[0].to_string();
        let port: i32 = codec::parse_i32(fields[1])?;
        if port == -1 {
            return Err(Error::NotFound);
        }

        let recorder_conn = Arc::new(Connection::connect_ctrl(&server, port as u16, rcvbuf, log.clone())?);
        let channels = ChannelList::query(&recorder_conn, id)?;

        Ok(Arc::new(Recorder {
            id,
            server,
            port: port as u16,
            conn: recorder_conn,
            rcvbuf,
            channels,
            chain: Mutex::new(None),
            log,
        }))
    }

    /// `cmyth_conn_get_recorder` — no round trip to discover the recorder's
    /// address; borrows the caller's already-open control connection.
    pub fn get_recorder(conn: Arc<Connection>, id: i32, rcvbuf: usize, log: Logger) -> Result<Arc<Recorder>> {
        let host = conn.host().to_string();
        let port = conn.port();
        let channels = ChannelList::query(&conn, id)?;

        Ok(Arc::new(Recorder {
            id,
            server: host,
            port,
            conn,
            rcvbuf,
            channels,
            chain: Mutex::new(None),
            log,
        }))
    }

    /// `GET_FREE_RECORDER` — the backend picks whichever recorder is idle.
    pub fn get_free_recorder(conn: &Connection, rcvbuf: usize, log: Logger) -> Result<Arc<Recorder>> {
        let reply = conn.request("GET_FREE_RECORDER")?;
        let fields = codec::split_fields(&reply);

        if fields.len() < 3 {
            return Err(Error::Protocol(format!("short GET_FREE_RECORDER reply: {:?}", reply)));
        }

        let id = codec::parse_i32(fields[0])?;
        let server = fields[1].to_string();
        let port: i32 = codec::parse_i32(fields[2])?;
        if port == -1 {
            return Err(Error::NotFound);
        }

        let recorder_conn = Arc::new(Connection::connect_ctrl(&server, port as u16, rcvbuf, log.clone())?);
        let channels = ChannelList::query(&recorder_conn, id)?;

        Ok(Arc::new(Recorder {
            id,
            server,
            port: port as u16,
            conn: recorder_conn,
            rcvbuf,
            channels,
            chain: Mutex::new(None),
            log,
        }))
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn channels(&self) -> &ChannelList {
        &self.channels
    }

    pub fn conn(&self) -> &Arc<Connection> {
        &self.conn
    }

    fn query(&self, command: &str) -> Result<String> {
        self.conn.request(&format!("QUERY_RECORDER {}[]:[]{}", self.id, command))
    }

    /// `IS_RECORDING`
    pub fn is_recording(&self) -> Result<bool> {
        Ok(codec::parse_i32(&self.query("IS_RECORDING")?)? != 0)
    }

    /// `GET_FRAMERATE`
    pub fn get_framerate(&self) -> Result<f64> {
        self.query("GET_FRAMERATE")?
            .trim()
            .parse()
            .map_err(|_| Error::Protocol("malformed framerate reply".into()))
    }

    /// `PAUSE`
    pub fn pause(&self) -> Result<()> {
        match parse_status(&self.query("PAUSE")?) {
            Status::Ok => Ok(()),
            Status::Error(msg) => Err(Error::Protocol(msg)),
        }
    }

    /// `CHANGE_CHANNEL[]:[]<dir>`
    pub fn change_channel(&self, dir: ChannelDir) -> Result<()> {
        self.query(&format!("CHANGE_CHANNEL[]:[]{}", dir.as_wire()))?;
        Ok(())
    }

    /// `SET_CHANNEL[]:[]<name>`
    pub fn set_channel(&self, name: &str) -> Result<()> {
        match parse_status(&self.query(&format!("SET_CHANNEL[]:[]{}", name))?) {
            Status::Ok => Ok(()),
            Status::Error(msg) => Err(Error::Protocol(msg)),
        }
    }

    /// `CHECK_CHANNEL[]:[]<name>`
    pub fn check_channel(&self, name: &str) -> Result<bool> {
        Ok(codec::parse_i32(&self.query(&format!("CHECK_CHANNEL[]:[]{}", name))?)? != 0)
    }

    /// `GET_CURRENT_RECORDING`
    pub fn get_cur_proginfo(&self) -> Result<ProgramInfo> {
        let reply = self.query("GET_CURRENT_RECORDING")?;
        let fields = codec::split_fields(&reply);
        let (prog, _) = ProgramInfo::decode(&fields, self.conn.version())?;
        Ok(prog)
    }

    /// `GET_NEXT_PROGRAM_INFO[]:[]<chan_str>[]:[]<chan_id>[]:[]<dir>`
    pub fn get_next_proginfo(&self, current: &ProgramInfo, dir: ChannelDir) -> Result<ProgramInfo> {
        let command = format!(
            "GET_NEXT_PROGRAM_INFO[]:[]{}[]:[]{}[]:[]{}",
            current.chan_str,
            current.chan_id,
            dir.as_wire(),
        );
        let reply = self.query(&command)?;
        let fields = codec::split_fields(&reply);
        let (prog, _) = ProgramInfo::decode(&fields, self.conn.version())?;
        Ok(prog)
    }

    /// `GET_FILENAME`
    pub fn get_filename(&self) -> Result<String> {
        self.query("GET_FILENAME")
    }

    /// `GET_RECORDER_NUM`
    pub fn get_recorder_id(&self) -> Result<i32> {
        let reply = self.query("GET_RECORDER_NUM")?;
        codec::parse_i32(&reply)
    }

    /// `GET_CHANNEL_INFO`-driven refresh of this recorder's channel list.
    pub fn get_chanlist(&self) -> Result<ChannelList> {
        ChannelList::query(&self.conn, self.id)
    }

    /// `STOP_LIVETV` — also tears down any live-TV chain this recorder owns.
    pub fn stop_livetv(&self) -> Result<()> {
        match parse_status(&self.query("STOP_LIVETV")?) {
            Status::Ok => {}
            Status::Error(msg) => return Err(Error::Protocol(msg)),
        }

        let mut chain = self.chain.lock().unwrap();
        *chain = None;
        Ok(())
    }

    /// `SPAWN_LIVETV[]:[]<chainid>[]:[]<pip>[]:[]<channum>` — starts the
    /// backend's live-TV chain for this recorder and the local chain
    /// worker that tracks it.
    pub fn spawn_chain_livetv(self: &Arc<Self>) -> Result<Arc<Chain>> {
        let counter = CHAIN_COUNTER.fetch_add(1, Ordering::Relaxed);
        let chain_id = format!("live-{}-{}-{}", self.server, std::process::id(), counter);

        let command = format!("SPAWN_LIVETV[]:[]{}[]:[]0[]:[]", chain_id);
        match parse_status(&self.query(&command)?) {
            Status::Ok => {}
            Status::Error(msg) => return Err(Error::Protocol(msg)),
        }

        let chain = Chain::spawn(self.clone(), chain_id, self.rcvbuf, self.log.clone())?;

        let mut slot = self.chain.lock().unwrap();
        *slot = Some(chain.clone());
        Ok(chain)
    }

    pub fn chain(&self) -> Option<Arc<Chain>> {
        self.chain.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_dir_wire_values() {
        assert_eq!(ChannelDir::Up.as_wire(), 0);
        assert_eq!(ChannelDir::Down.as_wire(), 1);
        assert_eq!(ChannelDir::Favorite.as_wire(), 2);
        assert_eq!(ChannelDir::Same.as_wire(), 3);
    }
}
