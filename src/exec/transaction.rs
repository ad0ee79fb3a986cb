//! Session transaction coordination: BEGIN / COMMIT / ROLLBACK and the
//! implicit auto-commit path.
//!
//! One coordinator per engine. Statements issued while an explicit
//! transaction is open run inside it and are serialized by the
//! coordinator's lock; statements outside a transaction are free to run
//! concurrently.

use parking_lot::{Mutex, ReentrantMutex};

use crate::storage::{GraphStorage, StorageTransaction};
use crate::{Error, Result};

pub struct TransactionCoordinator {
    current: Mutex<Option<Box<dyn StorageTransaction>>>,
    /// Serializes statements that execute within the open transaction.
    statement_lock: ReentrantMutex<()>,
}

impl TransactionCoordinator {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            statement_lock: ReentrantMutex::new(()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.lock().is_some()
    }

    /// BEGIN. Errors if a transaction is already open.
    pub fn begin(&self, storage: &dyn GraphStorage) -> Result<()> {
        let mut current = self.current.lock();
        if current.is_some() {
            return Err(Error::TxError(
                "A transaction is already open in this session".into(),
            ));
        }
        *current = Some(storage.begin()?);
        tracing::debug!("explicit transaction started");
        Ok(())
    }

    /// COMMIT. Errors if no transaction is open.
    pub fn commit(&self) -> Result<()> {
        let tx = self
            .current
            .lock()
            .take()
            .ok_or_else(|| Error::TxError("No open transaction to commit".into()))?;
        tx.commit()
    }

    /// ROLLBACK. Errors if no transaction is open.
    pub fn rollback(&self) -> Result<()> {
        let tx = self
            .current
            .lock()
            .take()
            .ok_or_else(|| Error::TxError("No open transaction to roll back".into()))?;
        tx.rollback()
    }

    /// Run a statement inside the open explicit transaction. Statement
    /// errors leave the transaction open and uncommitted — the client
    /// decides whether to ROLLBACK.
    pub fn run_in_explicit<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self.statement_lock.lock();
        f()
    }

    /// Implicit auto-commit path: wrap the statement in its own storage
    /// transaction, commit on success, roll back on error.
    pub fn run_implicit_write<T>(
        &self,
        storage: &dyn GraphStorage,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let tx = storage.begin()?;
        match f() {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                // Roll back best-effort; the statement error wins
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!(error = %rollback_err, "implicit rollback failed");
                }
                Err(err)
            }
        }
    }
}

impl Default for TransactionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
