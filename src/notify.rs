use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::error::SendError;
use crate::types::{CatalogEntry, Purchase};
use crate::{COLLECTION_SIZE, OBJECT_URL_BASE, TELEGRAM_API_BASE};

/// Outbound notification channel. Best-effort: callers log failures and keep
/// going.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), SendError>;
}

/// Render one message per purchase that has a catalog entry.
///
/// The join is inner: a purchase whose name is missing from the catalog
/// produces no message. That mirrors the catalog acting as the collection
/// allow-list; misses are surfaced by the caller's counter so the behavior
/// stays observable. Output order matches input order.
pub fn render(purchases: &[Purchase], catalog: &Catalog) -> Vec<String> {
    purchases
        .iter()
        .filter_map(|purchase| {
            catalog
                .get(&purchase.listing.name)
                .map(|entry| render_message(purchase, entry))
        })
        .collect()
}

fn render_message(purchase: &Purchase, entry: &CatalogEntry) -> String {
    let listing = &purchase.listing;
    let price = match listing.price {
        Some(p) => p.to_string(),
        None => "n/a".to_string(),
    };
    let link = format!("{OBJECT_URL_BASE}{}", listing.address);
    format!(
        "*{name}*\n*{price}* 💎 [BUY]({link})\nRating rank: *{rank}* / {total}\nRarity score: *{score}*",
        name = escape_markdown(&listing.name),
        price = escape_markdown(&price),
        rank = entry.rating_rank,
        total = COLLECTION_SIZE,
        score = escape_markdown(&entry.rarity_score.to_string()),
    )
}

/// Escape Telegram MarkdownV2 special characters.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '='
                | '|' | '{' | '}' | '.' | '!'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Joins purchases against the catalog and pushes rendered messages to the
/// sink, one message per matched purchase.
pub struct Notifier {
    catalog: Catalog,
    sink: Box<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(catalog: Catalog, sink: Box<dyn NotificationSink>) -> Self {
        Self { catalog, sink }
    }

    /// Send one message per matched purchase, in input order. A failed send
    /// is logged and the remaining messages still go out.
    pub async fn notify_all(&self, purchases: &[Purchase]) {
        let messages = render(purchases, &self.catalog);
        let missed = purchases.len() - messages.len();
        if missed > 0 {
            warn!("{missed} purchase(s) missing from the catalog, not notified");
        }
        if messages.is_empty() {
            return;
        }

        info!("Sending {} purchase notification(s)", messages.len());
        for message in &messages {
            if let Err(e) = self.sink.send(message).await {
                warn!("Failed to send notification: {e}");
            }
        }
    }
}

/// Telegram Bot API sink: one `sendMessage` call per notification.
pub struct TelegramSink {
    http: reqwest::Client,
    url: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(token: &str, chat_id: &str) -> Result<Self, SendError> {
        Self::with_base(TELEGRAM_API_BASE, token, chat_id)
    }

    pub fn with_base(base: &str, token: &str, chat_id: &str) -> Result<Self, SendError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            url: format!("{base}/bot{token}/sendMessage"),
            chat_id: chat_id.to_string(),
        })
    }

    /// Read `TELEGRAM_TOKEN` and `TELEGRAM_CHAT_ID` from the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let token = std::env::var("TELEGRAM_TOKEN")
            .map_err(|_| anyhow::anyhow!("TELEGRAM_TOKEN is not set"))?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID")
            .map_err(|_| anyhow::anyhow!("TELEGRAM_CHAT_ID is not set"))?;
        Ok(Self::new(&token, &chat_id)?)
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, text: &str) -> Result<(), SendError> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "MarkdownV2",
                "disable_web_page_preview": true,
            }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Stdout sink for dry runs: prints what would have been sent.
pub struct StdoutSink;

#[async_trait]
impl NotificationSink for StdoutSink {
    async fn send(&self, text: &str) -> Result<(), SendError> {
        println!("{text}\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Listing;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn purchase(name: &str, price: Option<u64>) -> Purchase {
        Purchase::new(Listing {
            name: name.to_string(),
            price,
            address: format!("EQ{name}"),
            owner: "EQowner".to_string(),
            is_selling: true,
        })
    }

    fn catalog_with(names: &[&str]) -> Catalog {
        Catalog::from_entries(names.iter().enumerate().map(|(i, name)| {
            (
                name.to_string(),
                CatalogEntry {
                    address: format!("EQ{name}"),
                    rarity_score: 35.16,
                    rating_rank: (i + 1) as u32,
                },
            )
        }))
    }

    #[test]
    fn catalog_miss_produces_no_message() {
        let catalog = catalog_with(&["TON PUNK #1"]);
        let purchases = vec![purchase("TON PUNK #1", Some(100)), purchase("UNKNOWN", Some(50))];
        let messages = render(&purchases, &catalog);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("TON PUNK \\#1"));
    }

    #[test]
    fn messages_follow_input_order() {
        let catalog = catalog_with(&["A", "B", "C"]);
        let purchases = vec![
            purchase("C", Some(1)),
            purchase("A", Some(2)),
            purchase("B", Some(3)),
        ];
        let messages = render(&purchases, &catalog);
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("*C*"));
        assert!(messages[1].contains("*A*"));
        assert!(messages[2].contains("*B*"));
    }

    #[test]
    fn message_carries_link_rank_and_score() {
        let catalog = catalog_with(&["A"]);
        let messages = render(&[purchase("A", Some(120))], &catalog);
        assert!(messages[0].contains("[BUY](https://beta.disintar.io/object/EQA)"));
        assert!(messages[0].contains("*120* 💎"));
        assert!(messages[0].contains("Rating rank: *1* / 5149"));
        assert!(messages[0].contains("Rarity score: *35\\.16*"));
    }

    #[test]
    fn unpriced_purchase_renders_placeholder() {
        let catalog = catalog_with(&["A"]);
        let messages = render(&[purchase("A", None)], &catalog);
        assert!(messages[0].contains("*n/a* 💎"));
    }

    #[test]
    fn escapes_markdown_specials() {
        assert_eq!(escape_markdown("TON PUNK #93"), "TON PUNK \\#93");
        assert_eq!(escape_markdown("a.b-c!"), "a\\.b\\-c\\!");
        assert_eq!(escape_markdown("plain"), "plain");
    }

    struct FlakySink {
        sent: Arc<Mutex<Vec<String>>>,
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl NotificationSink for FlakySink {
        async fn send(&self, text: &str) -> Result<(), SendError> {
            // first send fails, the rest go through
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(SendError::Status(429));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_send_does_not_abort_the_rest() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let attempts = Arc::new(AtomicUsize::new(0));
        let sink = Box::new(FlakySink {
            sent: Arc::clone(&sent),
            attempts: Arc::clone(&attempts),
        });
        let notifier = Notifier::new(catalog_with(&["A", "B", "C"]), sink);

        let purchases = vec![
            purchase("A", Some(1)),
            purchase("B", Some(2)),
            purchase("C", Some(3)),
        ];
        notifier.notify_all(&purchases).await;

        // three attempts, first dropped, the other two delivered in order
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].contains("*B*"));
        assert!(sent[1].contains("*C*"));
    }
}
