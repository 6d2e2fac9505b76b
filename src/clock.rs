//! Client/server clock offset.
//!
//! Measured once per session and never re-synced, so a long-running board
//! slowly accumulates drift again.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::store::TimeSource;
use crate::utils::parse_wire_timestamp;

/// `client UTC - server UTC` in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClockOffset(pub i64);

impl ClockOffset {
    pub fn millis(&self) -> i64 {
        self.0
    }

    /// Map a client clock reading onto the server clock
    pub fn to_server_time(&self, client_now: DateTime<Utc>) -> DateTime<Utc> {
        client_now - Duration::milliseconds(self.0)
    }

    /// Measure the offset against `source`; any failure yields a zero offset
    pub fn sync(source: &dyn TimeSource, client_now: DateTime<Utc>) -> Self {
        let server_now = source
            .server_time()
            .and_then(|raw| parse_wire_timestamp(&raw).map_err(anyhow::Error::from));

        match server_now {
            Ok(server_now) => {
                let offset = ClockOffset((client_now - server_now).num_milliseconds());
                log::debug!("Clock offset {} ms", offset.0);
                offset
            }
            Err(e) => {
                log::warn!("Clock sync failed, using local clock: {:#}", e);
                ClockOffset::default()
            }
        }
    }
}
