use serde::{Deserialize, Serialize};

/// One marketplace listing as observed during a single fetch cycle.
///
/// `name` is non-empty but not guaranteed unique within a snapshot; the
/// upstream enforces no uniqueness. `price` is `None` when the item carries
/// no current price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub name: String,
    pub price: Option<u64>,
    pub address: String,
    pub owner: String,
    pub is_selling: bool,
}

/// A snapshot is one full poll's worth of listings.
pub type Snapshot = Vec<Listing>;

/// A listing whose state change is interpreted as a completed or re-priced
/// sale. Always taken from the current snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    #[serde(flatten)]
    pub listing: Listing,
    /// When the purchase was detected (RFC 3339).
    pub detected_at: String,
}

impl Purchase {
    pub fn new(listing: Listing) -> Self {
        Self {
            listing,
            detected_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Static rarity metadata for one item, keyed by name in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub address: String,
    pub rarity_score: f64,
    pub rating_rank: u32,
}
