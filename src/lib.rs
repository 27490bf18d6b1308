pub mod api;
pub mod catalog;
pub mod config;
pub mod cycle;
pub mod detector;
pub mod error;
pub mod fetcher;
pub mod notify;
pub mod types;

/// TON Punks collection address on disintar.io
pub const COLLECTION_ADDRESS: &str = "UQAo92DYMokxghKcq-CkCGSk_MgXY5Fo1SPW20gkvZl75n1I";

/// Disintar entities API endpoint (public, csrf-cookie gated)
pub const ENTITIES_API_URL: &str = "https://beta.disintar.io/api/get_entities/";

/// Collection page URL, used as the csrf-token source and as Referer
pub const COLLECTION_URL: &str =
    "https://beta.disintar.io/collection/UQAo92DYMokxghKcq-CkCGSk_MgXY5Fo1SPW20gkvZl75n1I";

/// Base URL for per-item deep links in notifications
pub const OBJECT_URL_BASE: &str = "https://beta.disintar.io/object/";

/// Telegram Bot API base URL
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Total number of items in the collection (rating rank denominator)
pub const COLLECTION_SIZE: u32 = 5149;
