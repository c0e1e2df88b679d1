//! Shared test utilities for integration tests

use convoguard::error::ExecutionError;
use convoguard::execute::{QueryExecutionAdapter, QueryResult};
use convoguard::query::{ContextKind, FilteredQuery};
use convoguard::store::{ConversationStore, Fixture, MemoryStore};
use parking_lot::Mutex;
use std::sync::Arc;

/// C1 (alice, bob), C2 (carol), C3 (bob); two messages in C1, one in C2
pub const FIXTURE: &str = r#"
[[users]]
username = "alice"
display_name = "Alice"

[[users]]
username = "bob"
display_name = "Bob"

[[users]]
username = "carol"

[[conversations]]
id = "C1"
title = "Launch plan"
status = "active"
members = ["alice", "bob"]

[[conversations]]
id = "C2"
title = "Payroll"
status = "active"
members = ["carol"]

[[conversations]]
id = "C3"
title = "Retro"
status = "archived"
members = ["bob"]

[[messages]]
id = 1
conversation = "C1"
sender = "alice"
text = "kickoff at 10"

[[messages]]
id = 2
conversation = "C1"
sender = "bob"
text = "moved to 11"

[[messages]]
id = 3
conversation = "C2"
sender = "carol"
text = "payslips sent"
"#;

pub fn seed(store: &dyn ConversationStore) {
    Fixture::from_toml(FIXTURE).unwrap().apply(store).unwrap();
}

pub fn memory_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    seed(store.as_ref());
    store
}

/// Executor that records every query it receives and delegates to an inner executor
pub struct RecordingExecutor<E> {
    inner: E,
    seen: Mutex<Vec<(FilteredQuery, ContextKind)>>,
}

impl<E: QueryExecutionAdapter> RecordingExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<(FilteredQuery, ContextKind)> {
        self.seen.lock().clone()
    }
}

impl<E: QueryExecutionAdapter> QueryExecutionAdapter for RecordingExecutor<E> {
    fn execute(
        &self,
        query: &FilteredQuery,
        kind: ContextKind,
    ) -> Result<QueryResult, ExecutionError> {
        self.seen.lock().push((query.clone(), kind));
        self.inner.execute(query, kind)
    }
}
