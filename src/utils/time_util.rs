use serde::{Deserialize, Serialize};
use std::time::{self, SystemTime};
/// represent current time with seconds and fraction of a second in nanoseconds
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq)]
pub struct TimeDurationStruct {
    /// seconds
    pub sec: u64,
    /// fraction of a second in nanoseconds
    pub nsec: u32,
}

/// calculate what time is it since `1970-1-1 00:00:00`,named as [UNIX_EPOCH](time::UNIX_EPOCH)
pub fn now() -> TimeDurationStruct {
    let now = SystemTime::now()
        .duration_since(time::UNIX_EPOCH)
        .unwrap_or_default();
    TimeDurationStruct {
        sec: now.as_secs(),
        nsec: now.subsec_nanos(),
    }
}
