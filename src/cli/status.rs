//! Status command implementation

use anyhow::Result;

use crate::store::SessionStore;

pub fn run(store: &SessionStore) -> Result<()> {
    let bounds = store.history_bounds()?;

    println!("Sessions:     {}", bounds.session_count);
    println!(
        "First listen: {}",
        bounds.first_listen.as_deref().unwrap_or("-")
    );
    println!(
        "Last listen:  {}",
        bounds.last_listen.as_deref().unwrap_or("-")
    );
    Ok(())
}
