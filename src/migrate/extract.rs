//! Keyset-paged batches of rows to convert.

use super::plan::ConversionTarget;
use crate::errors::MigrationError;
use crate::store::{Row, Store};

/// Walks a target's populated rows in id order, one bounded batch at a time.
///
/// The cursor only moves forward: rows are fetched with `id > last_id`, so
/// rows rewritten by earlier batches are never fetched again.
pub struct BatchCursor<'a> {
    store: &'a dyn Store,
    target: &'a ConversionTarget,
    batch_size: usize,
    last_id: Option<i64>,
    exhausted: bool,
}

impl<'a> BatchCursor<'a> {
    pub fn new(store: &'a dyn Store, target: &'a ConversionTarget, batch_size: usize) -> Self {
        Self {
            store,
            target,
            batch_size: batch_size.max(1),
            last_id: None,
            exhausted: false,
        }
    }

    /// The next batch, or `None` once the target is exhausted.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Row>>, MigrationError> {
        if self.exhausted {
            return Ok(None);
        }

        let rows = self
            .store
            .fetch_rows(self.target, self.last_id, self.batch_size)
            .await
            .map_err(|e| MigrationError::persistence(self.target.table(), e))?;

        if rows.len() < self.batch_size {
            self.exhausted = true;
        }
        match rows.last() {
            Some(last) => {
                self.last_id = Some(last.id);
                Ok(Some(rows))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }
}
