pub mod clock;
pub mod errors;
pub mod retry;
pub mod shutdown;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use errors::*;
pub use retry::{retry_transient, retry_with_backoff, RetryConfig};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
