// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `solanagram worker`: the process that runs inside each worker container.

use std::sync::Arc;

use solanagram_config::SolanagramConfig;
use solanagram_core::SolanagramError;
use solanagram_storage::SqliteStore;
use solanagram_telegram::TelegramMessaging;
use solanagram_worker::Exit;
use tracing::warn;

use crate::shutdown;

/// Runs the worker until shutdown. `Ok(false)` when the supervisor gave up.
pub async fn run_worker(config: &SolanagramConfig) -> Result<bool, SolanagramError> {
    let store = Arc::new(SqliteStore::open(&config.storage).await?);
    let messaging = Arc::new(TelegramMessaging::new());
    let cancel = shutdown::install_signal_handler();

    let exit = solanagram_worker::run(config, messaging, store.clone(), cancel).await?;

    match Arc::try_unwrap(store) {
        Ok(store) => store.close().await?,
        Err(_) => warn!("store still shared at exit, skipping close"),
    }
    Ok(exit == Exit::Shutdown)
}
