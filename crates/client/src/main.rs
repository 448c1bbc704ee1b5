//! Demo entry point: opens the client, optionally signs in a demo account,
//! refreshes and prints the snapshot.

use anyhow::Context;

use cardkeep_client::{CardClient, ClientConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    cardkeep_observability::init();

    let config = ClientConfig::from_env().context("failed to load client configuration")?;
    let client = CardClient::open(&config)?;

    if let (Ok(email), Ok(password)) = (
        std::env::var("CARDKEEP_DEMO_EMAIL"),
        std::env::var("CARDKEEP_DEMO_PASSWORD"),
    ) {
        let identity = client
            .sign_in_offline(&email, &password)
            .await
            .with_context(|| format!("demo sign-in failed for {email}"))?;
        tracing::info!(identity_id = %identity.id, role = %identity.role, "demo account signed in");
    } else {
        tracing::info!(actor = ?client.session.current().role(), "using restored session");
    }

    let cards = client.cards.refresh(None).await.context("initial refresh failed")?;
    tracing::info!(cards = cards.len(), backend = %client.cards.active_backend(), "ready");

    let snapshot = client.cards.snapshot();
    println!("{}", serde_json::to_string_pretty(&*snapshot)?);
    Ok(())
}
