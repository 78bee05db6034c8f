//! Run and trade-result persistence port.

use crate::domain::error::PipreplayError;
use crate::domain::metrics::RunSummary;
use crate::domain::outcome::TradeResult;
use crate::domain::report::{RunMeta, StoredRun};

pub trait RunStorePort {
    /// Persist a run header together with its results and return the new id.
    /// Nothing is stored when any part of the write fails.
    fn store_run(
        &self,
        meta: &RunMeta,
        summary: &RunSummary,
        results: &[TradeResult],
    ) -> Result<String, PipreplayError>;

    fn load_run(&self, run_id: &str) -> Result<Option<StoredRun>, PipreplayError>;

    /// Results of a run ordered by trade date, then entry time.
    fn load_results(&self, run_id: &str) -> Result<Vec<TradeResult>, PipreplayError>;

    /// Most recent runs first.
    fn list_runs(&self, limit: usize) -> Result<Vec<StoredRun>, PipreplayError>;

    /// Delete a run and its results; `false` when the id was unknown.
    fn delete_run(&self, run_id: &str) -> Result<bool, PipreplayError>;
}
