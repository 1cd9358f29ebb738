pub mod error;
pub mod id;
pub mod time;

pub use error::{CoreError, ErrorCategory, Result};
pub use id::{MemberId, NetworkId, NotificationId, PostId, RoleId, SpaceId};
pub use time::{Clock, ManualClock, SystemClock, UnixMillis, now_millis};
