//! Timeline command implementation

use anyhow::Result;

use crate::store::SessionStore;

pub fn run(store: &SessionStore) -> Result<()> {
    let rows = store.timeline()?;

    if rows.is_empty() {
        println!("No listening history found. Run 'listenlog sync' first.");
        return Ok(());
    }

    println!(
        "{:<12} {:<12} {:<8} {}",
        "First", "Last", "Sessions", "Title"
    );
    println!("{}", "-".repeat(80));

    for row in rows {
        let title = row
            .title
            .as_deref()
            .map(|t| {
                if t.chars().count() > 45 {
                    format!("{}...", t.chars().take(42).collect::<String>())
                } else {
                    t.to_string()
                }
            })
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<12} {:<12} {:<8} {}",
            day(&row.first_listen),
            day(&row.last_listen),
            row.session_count,
            title,
        );
    }

    Ok(())
}

/// `YYYY-MM-DD` prefix of a stored instant
fn day(ts: &str) -> &str {
    ts.get(..10).unwrap_or(ts)
}
