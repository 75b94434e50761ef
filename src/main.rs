//! marksync demo: two sessions of one identity sharing an in-memory store.
//!
//! Walks through the sync paths end to end: an insert in one session reaching
//! the other over the broadcast hint, a two-press delete reaching the other
//! over the change feed, and validation rejecting bad input.

use std::error::Error;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;

use marksync::app::App;
use marksync::rpc_handler::handle_method;
use marksync::telemetry::init_tracing;
use marksync::types::bookmark::{count_label, Bookmark};
use marksync::types::identity::Identity;
use marksync::types::settings::SyncSettings;
use marksync::types::status::ConnectionStatus;

const PROPAGATION_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing("warn");

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                marksync v{} — Demo Mode                   ║", env!("CARGO_PKG_VERSION"));
    println!("║        Real-time bookmark sync between open sessions         ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let app = App::new(SyncSettings::default())?;
    let identity = Identity::new("demo-user")?;

    section("Sessions");
    let tab_a = app.open_session(identity.clone()).await?;
    let tab_b = app.open_session(identity.clone()).await?;
    let (a, b) = (tab_a.handle(), tab_b.handle());
    wait_until(&mut a.subscribe_status(), |s| *s == ConnectionStatus::Connected).await?;
    println!("  Opened two sessions for '{}'", identity);
    println!("  Status A: {}", a.status().label());
    println!(
        "  Subscriptions: {} feed, {} broadcast",
        app.feed.active_subscriptions(),
        app.broadcast.active_subscriptions()
    );
    println!();

    section("Add in A, hint reaches B");
    let added = a.add("example.com", "Example").await?;
    println!("  A added \"{}\" -> {} ({})", added.title, added.url, added.domain());
    let mut b_items = b.subscribe_items();
    wait_until(&mut b_items, |items| items.iter().any(|x| x.id == added.id)).await?;
    print_list("B", &b.items());
    println!();

    section("Validation");
    for (url, title) in [("", "No URL"), ("https://", "Bare scheme"), ("not a url", "Spaces")] {
        match a.add(url, title).await {
            Ok(bookmark) => println!("  accepted {:?} as {}", url, bookmark.url),
            Err(err) => println!("  rejected {:?}: {}", url, err),
        }
    }
    println!();

    section("Two-press delete in B, feed reaches A");
    let params = serde_json::json!({"id": added.id});
    let first = handle_method(&b, "bookmark.delete", &params).await?;
    println!("  first press:  {}", first);
    let second = handle_method(&b, "bookmark.delete", &params).await?;
    println!("  second press: {}", second);
    let mut a_items = a.subscribe_items();
    wait_until(&mut a_items, |items| items.iter().all(|x| x.id != added.id)).await?;
    print_list("A", &a.items());
    println!();

    section("Shutdown");
    tab_a.shutdown().await;
    tab_b.shutdown().await;
    println!(
        "  Subscriptions after shutdown: {} feed, {} broadcast",
        app.feed.active_subscriptions(),
        app.broadcast.active_subscriptions()
    );

    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("  ✅ Sync paths demonstrated successfully!");
    println!("═══════════════════════════════════════════════════════════════");
    Ok(())
}

fn section(name: &str) {
    println!("───────────────────────────────────────────────────────────────");
    println!("  📦 {}", name);
    println!("───────────────────────────────────────────────────────────────");
}

fn print_list(who: &str, items: &[Bookmark]) {
    println!("  {} shows {}:", who, count_label(items.len()));
    for item in items {
        println!("    - {} [{}] {}", item.title, item.domain(), item.created_on());
    }
}

async fn wait_until<T>(
    rx: &mut watch::Receiver<T>,
    predicate: impl FnMut(&T) -> bool,
) -> Result<(), Box<dyn Error>> {
    timeout(PROPAGATION_TIMEOUT, rx.wait_for(predicate)).await??;
    Ok(())
}
