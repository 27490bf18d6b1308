//! Probe: entities API listing pages
//!
//! Hits POST https://beta.disintar.io/api/get_entities/ for the TON Punks
//! collection and documents:
//! - csrf token acquisition from the collection page
//! - Response shape and per-record fields
//! - Pagination (page/limit form fields)
//! - Name duplication across pages (join-key quality)
//! - Price distribution (null vs priced, selling flags)

use std::collections::HashSet;
use std::time::Instant;

use anyhow::Result;
use tonpunks_watch::api::{CredentialSource, MarketClient, PageFetcher};

#[tokio::main]
async fn main() -> Result<()> {
    let client = MarketClient::new()?;

    println!("=== Probe: entities API listings ===");
    println!();

    // 1. Acquire csrf token
    println!("--- 1. csrf token acquisition ---");
    let start = Instant::now();
    client.refresh_credentials().await?;
    println!("Token acquired in {:?}", start.elapsed());
    println!();

    // 2. Fetch page 0
    println!("--- 2. Fetch page 0 (limit=21) ---");
    let start = Instant::now();
    let page0 = client.get_page(0, 21).await?;
    let latency = start.elapsed();
    println!("Record count: {}", page0.len());
    println!("Latency: {:?}", latency);
    if let Some(first) = page0.first() {
        println!("\nSample listing (first):");
        println!("{}", serde_json::to_string_pretty(first)?);
    }
    println!();

    // 3. Pagination: page 1 should not repeat page 0
    println!("--- 3. Pagination: page 1 ---");
    let page1 = client.get_page(1, 21).await?;
    println!("Record count: {}", page1.len());
    let names0: HashSet<&str> = page0.iter().map(|l| l.name.as_str()).collect();
    let overlap = page1.iter().filter(|l| names0.contains(l.name.as_str())).count();
    println!("Names overlapping with page 0: {overlap}");
    println!();

    // 4. Name uniqueness within the fetched window
    println!("--- 4. Name uniqueness check ---");
    let mut names = HashSet::new();
    let mut duplicates = 0;
    for listing in page0.iter().chain(page1.iter()) {
        if !names.insert(listing.name.as_str()) {
            duplicates += 1;
        }
    }
    println!("Total records: {}", page0.len() + page1.len());
    println!("Unique names: {}", names.len());
    println!("Duplicate names: {duplicates}");
    println!();

    // 5. Price / selling distribution
    println!("--- 5. Price distribution ---");
    let all: Vec<_> = page0.iter().chain(page1.iter()).collect();
    let unpriced = all.iter().filter(|l| l.price.is_none()).count();
    let selling = all.iter().filter(|l| l.is_selling).count();
    let prices: Vec<u64> = all.iter().filter_map(|l| l.price).collect();
    println!("Unpriced (null): {unpriced}");
    println!("Selling: {selling} / {}", all.len());
    if let (Some(min), Some(max)) = (prices.iter().min(), prices.iter().max()) {
        println!("Price range: {min}..{max}");
    }
    println!();

    // 6. Latency over 3 requests
    println!("--- 6. Latency over 3 requests ---");
    let mut latencies = Vec::new();
    for i in 0..3 {
        let start = Instant::now();
        let _ = client.get_page(0, 21).await?;
        let latency = start.elapsed();
        println!("  Request {}: {:?}", i + 1, latency);
        latencies.push(latency);
    }
    let avg = latencies.iter().sum::<std::time::Duration>() / latencies.len() as u32;
    println!("  Average: {:?}", avg);
    println!();

    println!("=== Probe complete ===");
    Ok(())
}
