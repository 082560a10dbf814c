//! System-wide constants for the Bourse exchange core.

/// Decimal places of the settlement currency.
pub const CURRENCY_PRECISION: u32 = 2;

/// Decimal places of the Dutch-auction price.
pub const PRICE_PRECISION: u32 = 2;

/// Decimal places kept for a holding's average cost basis.
pub const COST_BASIS_PRECISION: u32 = 4;

/// Maximum ticker symbol length.
pub const MAX_SYMBOL_LEN: usize = 10;

/// Default number of shares sold through the IPO auction.
pub const DEFAULT_IPO_SHARES_OFFERED: u64 = 980;

/// Default creator allocation, granted fully locked and vested over time.
pub const DEFAULT_CREATOR_SHARES: u64 = 20;

/// Default IPO window length in hours.
pub const DEFAULT_IPO_DURATION_HOURS: u32 = 24;

/// Default maximum quantity of a single order.
pub const DEFAULT_MAX_ORDER_QUANTITY: u64 = 1_000_000;

/// Default number of attempts for a transaction that hits infra contention.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default pause between retry attempts (milliseconds).
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 5;

/// Default maximum wait for a single row lock (milliseconds).
pub const DEFAULT_LOCK_WAIT_MS: u64 = 250;

/// Default number of price levels returned per side of a book snapshot.
pub const DEFAULT_BOOK_DEPTH: usize = 20;

/// Default IPO price refresh cadence for the host driver (seconds).
pub const DEFAULT_PRICING_TICK_SECS: u64 = 3_600;

/// Default IPO expiry cadence for the host driver (seconds).
pub const DEFAULT_EXPIRY_TICK_SECS: u64 = 300;

/// Default vesting cadence for the host driver (seconds).
pub const DEFAULT_VESTING_TICK_SECS: u64 = 86_400;

/// Seconds in one hour, used by the auction curve.
pub const SECONDS_PER_HOUR: i64 = 3_600;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Bourse";
