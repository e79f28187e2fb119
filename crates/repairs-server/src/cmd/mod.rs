pub mod create;
pub mod list;
pub mod serve;
pub mod show;

use crate::output::{CliError, OutputMode, render_error};
use anyhow::Context;
use repairs_core::config::{ServiceConfig, StorageBackend};
use repairs_core::error::{ErrorCode, RepairError};
use repairs_core::store::SqliteStore;

/// Open the SQLite store for one-shot commands.
///
/// The memory backend is rejected: tickets would vanish when the command exits.
pub fn open_cli_store(config: &ServiceConfig, output: OutputMode) -> anyhow::Result<SqliteStore> {
    if config.storage.backend == StorageBackend::Memory {
        let err = RepairError::Config(
            "the memory backend does not persist between commands".to_string(),
        );
        render_error(
            output,
            &CliError::with_details(
                err.to_string(),
                "set REPAIRS_STORAGE=sqlite or [storage] backend = \"sqlite\"",
                ErrorCode::InvalidConfig.code(),
            ),
        )?;
        return Err(err.into());
    }

    SqliteStore::open(&config.storage.path)
        .with_context(|| format!("open repair store {}", config.storage.path.display()))
}

/// Render a ticket-operation failure, then hand it back for the exit status.
pub fn fail(output: OutputMode, err: RepairError) -> anyhow::Result<()> {
    render_error(output, &CliError::from(&err))?;
    Err(err.into())
}
