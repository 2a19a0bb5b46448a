use bnlab_core::storage::Storage;

use crate::runtime_config;

/// Opens the session database and applies pending migrations.
pub(crate) fn initialize_storage() -> Result<Storage, String> {
    let path = runtime_config::db_path();
    let storage = Storage::open(&path).map_err(|err| format!("open {path}: {err}"))?;
    storage
        .init()
        .map_err(|err| format!("migrate {path}: {err}"))?;
    Ok(storage)
}
