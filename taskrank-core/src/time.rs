//! Time utilities: the reference "now" a prioritization call is evaluated against.

use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Wall-clock time in `tz`, without the offset. Deadlines are plain dates, so
/// they are compared against local time.
pub fn now_in(tz: Tz) -> NaiveDateTime {
    Utc::now().with_timezone(&tz).naive_local()
}
