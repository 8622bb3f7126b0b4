use std::time::Duration;

/// Maximum time to wait when acquiring the store's read or write lock.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Largest accepted request body.
pub const MAX_BODY_SIZE: usize = 64 * 1024;
