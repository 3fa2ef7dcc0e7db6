//! smledger: SM ticket ledger HTTP service.
//!
//! Reads ~/.smledger/config.json (with SUPABASE_URL, SUPABASE_SERVICE_ROLE_KEY
//! and SMLEDGER_HTTP_BIND overrides) and serves the API. Log level comes from
//! RUST_LOG and defaults to info.

use smledger_lib::state::load_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;

    smledger_lib::run(config).await
}
