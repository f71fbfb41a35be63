//! # Dataset Market Node
//!
//! Hosts one [`Marketplace`] and serves it over a line-delimited JSON console.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Initialise logging (stderr)
//! 3. Restore the ledger from the snapshot file, or start empty
//! 4. Serve commands from stdin until EOF or Ctrl+C
//!
//! Commands run strictly one after another. When a snapshot path is
//! configured, the ledger is written back after every committed mutation.
//!
//! The snapshot carries the event history, so event sequence numbers keep
//! counting up across restarts. The token ledger behind the node is the
//! in-memory development ledger; its balances are not part of the snapshot.

pub mod config;
pub mod console;
pub mod store;
pub mod telemetry;

use anyhow::{Context, Result};
use dm_registry::adapters::{InMemoryEventLog, InMemoryTokenLedger};
use dm_registry::ports::inbound::DatasetMarketApi;
use dm_registry::service::Marketplace;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info};

use crate::config::NodeConfig;
use crate::console::{Console, NodeMarket};
use crate::store::SnapshotStore;

/// A running node.
pub struct Node {
    console: Console,
    store: Option<SnapshotStore>,
}

impl Node {
    /// Build the marketplace, restoring from the snapshot file if one exists.
    pub async fn start(config: NodeConfig) -> Result<Self> {
        let tokens = Arc::new(InMemoryTokenLedger::new());
        let store = config.snapshot_path.as_ref().map(SnapshotStore::new);

        let snapshot = match &store {
            Some(store) => store
                .load()
                .await
                .with_context(|| format!("loading {}", store.path().display()))?,
            None => None,
        };

        let market: NodeMarket = match snapshot {
            Some(mut snapshot) => {
                info!(
                    datasets = snapshot.registry.total(),
                    events = snapshot.events.len(),
                    "restoring ledger snapshot"
                );
                let events = InMemoryEventLog::from_records(std::mem::take(&mut snapshot.events))
                    .context("snapshot rejected")?;
                Marketplace::restore(config.market, snapshot, tokens, Arc::new(events))
                    .context("snapshot rejected")?
            }
            None => Marketplace::new(config.market, tokens, Arc::new(InMemoryEventLog::new()))
                .context("invalid market configuration")?,
        };

        for token in market.payment_tokens() {
            market.token_gateway().register_token(token.address);
        }

        info!(
            version = dm_registry::VERSION,
            persistent = store.is_some(),
            "dataset market node ready"
        );
        Ok(Self {
            console: Console::new(Arc::new(market)),
            store,
        })
    }

    /// The command console.
    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Read commands from `reader` until EOF, writing one response per line.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await.context("reading command")? {
            if line.trim().is_empty() {
                continue;
            }

            let outcome = self.console.handle_line(&line);
            if outcome.committed {
                self.persist().await;
            }

            let mut encoded =
                serde_json::to_string(&outcome.response).context("encoding response")?;
            encoded.push('\n');
            writer
                .write_all(encoded.as_bytes())
                .await
                .context("writing response")?;
            writer.flush().await.context("flushing response")?;
        }
        info!("command stream closed");
        Ok(())
    }

    async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let market = self.console.market();
        let snapshot = market.snapshot().with_events(market.event_sink().all());
        if let Err(e) = store.save(&snapshot).await {
            // The mutation already committed in memory; keep serving.
            error!(error = %e, "failed to persist snapshot");
        }
    }
}
