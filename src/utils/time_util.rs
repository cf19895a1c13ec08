use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{self, SystemTime};
/// represent a point in time with seconds and fraction of a second in nanoseconds,
/// stored on disk as `u64` seconds followed by `u32` nanoseconds
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeDurationStruct {
    /// seconds
    pub sec: u64,
    /// fraction of a second in nanoseconds
    pub nsec: u32,
}

/// calculate what time is it since `1970-1-1 00:00:00`,named as [time::UNIX_EPOCH]
///
/// a clock set before the epoch yields the epoch itself
pub fn now() -> TimeDurationStruct {
    let now = SystemTime::now()
        .duration_since(time::UNIX_EPOCH)
        .unwrap_or_default();
    TimeDurationStruct {
        sec: now.as_secs(),
        nsec: now.subsec_nanos(),
    }
}

impl fmt::Display for TimeDurationStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}
