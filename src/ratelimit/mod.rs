//! Rate limiting logic and state management.

mod bucket;
mod clock;
mod limiter;
mod lru;
mod policy;
mod sweeper;

pub use bucket::{Bucket, BucketKey};
pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{RateLimitResult, RateLimiter};
pub use lru::LruCache;
pub use policy::{Policies, PolicyName};
pub use sweeper::{spawn_sweeper, sweep_once, SweeperHandle};
