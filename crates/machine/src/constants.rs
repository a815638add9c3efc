//! Default timings and bounds.

/// Backoff between busy retries of a create.
pub const DEFAULT_BOND_RETRY_DELAY_MS: u64 = 500;

/// Busy retries before a create proceeds anyway.
pub const DEFAULT_MAX_BOND_RETRIES: u32 = 30;

/// How long a bonded notification is withheld waiting for service discovery.
pub const DEFAULT_PENDING_BONDED_TIMEOUT_MS: u64 = 3_000;

/// Lowest keyboard PIN (inclusive).
pub const KEYBOARD_PIN_MIN: u32 = 100_000;

/// Highest keyboard PIN (exclusive).
pub const KEYBOARD_PIN_MAX: u32 = 999_999;
