//! `Channel`/`ChannelList`: the tuning lineup for one recorder. Immutable
//! value objects decoded one channel at a time from `QUERY_RECORDER`
//! replies, mirroring the `cmyth_channel_t`/`cmyth_chanlist_t` pair (a
//! channel carries an id plus name/sign/string/icon, and the list is a
//! plain resizable vector of them).

use crate::connection::Connection;
use myth_proto::codec;
use myth_proto::error::Result;
use serde_derive::Serialize;
use std::sync::Arc;

/// One tunable channel on a recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub id: i32,
    pub name: String,
    pub sign: String,
    pub string: String,
    pub icon: String,
}

/// An ordered, resizable list of [`Channel`]s for a single recorder.
#[derive(Debug, Clone, Default)]
pub struct ChannelList {
    items: Vec<Arc<Channel>>,
}

impl ChannelList {
    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Channel>> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Channel>> {
        self.items.iter()
    }

    /// Populate a recorder's channel list by walking `GET_CHANNEL_INFO`
    /// indices starting at 1 until the backend answers with an empty name
    /// (its way of saying "no such channel"). Backends do not report a
    /// count up front, so the walk is the only way to discover the end.
    pub fn query(conn: &Connection, recorder_id: i32) -> Result<ChannelList> {
        let mut items = Vec::new();

        for index in 1.. {
            let body = format!("QUERY_RECORDER {}[]:[]GET_CHANNEL_INFO[]:[]{}", recorder_id, index);
            let reply = conn.request(&body)?;
            let fields = codec::split_fields(&reply);

            if fields.len() < 5 || fields[1].is_empty() {
                break;
            }

            let id = codec::parse_i32(fields[0]).unwrap_or(index);
            items.push(Arc::new(Channel {
                id,
                name: fields[1].to_string(),
                sign: fields[2].to_string(),
                string: fields[3].to_string(),
                icon: fields[4].to_string(),
            }));
        }

        Ok(ChannelList { items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_channel_list_defaults() {
        let list = ChannelList::default();
        assert_eq!(list.count(), 0);
        assert!(list.get(0).is_none());
    }
}
