//! Digest command implementation.

use super::Context;
use leaguesync_core::{DigestTree, DigestTreeStore, Sha256Hasher};

/// Runs the digest command.
pub async fn run(ctx: &Context, subject: &str, event_type: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = DigestTreeStore::new(std::sync::Arc::clone(ctx.events.document_store()));
    let tree = store.get(subject, event_type, &Sha256Hasher).await?;

    if tree == DigestTree::empty(&Sha256Hasher) {
        println!("No digest stored for {subject}/{event_type}");
        return Ok(());
    }
    println!("Root:   {}", tree.root_hash());
    println!("Leaves: {}", tree.leaves().len());
    for leaf in tree.leaves() {
        println!("  {:>10}  {}", leaf.key.as_deref().unwrap_or("?"), leaf.hash);
    }
    Ok(())
}
