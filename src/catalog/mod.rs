//! Banks, their transaction types and standard protocols: the reference
//! data mapping configs are classified by.

pub mod bank;
pub mod export;
pub mod import;
pub mod protocol;
pub mod transaction_type;

pub use bank::{Bank, BankDraft};
pub use export::{BankPluginPackage, PluginExport};
pub use import::{HeuristicExtractor, ImportRequest, ProtocolCandidate, ProtocolExtractor};
pub use protocol::{ProtocolDraft, StandardProtocol};
pub use transaction_type::{TransactionType, TransactionTypeDraft, TRANSACTION_TYPE_PRESETS};

use crate::db_operations::DbOperations;
use crate::error::{MapError, MapResult};
use std::sync::{Arc, Mutex, MutexGuard};

/// Reference data store. Saves and deletes are serialized so uniqueness
/// checks and cascades see a stable view.
pub struct Catalog {
    db_ops: Arc<DbOperations>,
    write_lock: Mutex<()>,
}

impl Catalog {
    pub fn new(db_ops: Arc<DbOperations>) -> Self {
        Self {
            db_ops,
            write_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> MapResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| MapError::Database("Catalog lock poisoned".to_string()))
    }
}
