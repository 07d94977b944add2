use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

use crate::backend::{Bootstrap, Connect, ContainerInfo, ErrorLogBackend};
use crate::config::CappedPolicy;
use crate::error::{StoreError, StoreResult};
use crate::record::{PersistedRecord, RecordId};

/// Connection string prefix accepted by [`MemoryBackend::connect`].
pub const MEMORY_SCHEME: &str = "memory://";

#[derive(Clone, Copy, Debug)]
struct Bounds {
    max_bytes: u64,
    max_documents: u64,
}

#[derive(Debug)]
struct StoredRow {
    id: RecordId,
    size: u64,
    record: PersistedRecord,
}

/// One container: rows in insertion order, oldest at the front.
#[derive(Debug, Default)]
struct Container {
    bounds: Option<Bounds>,
    rows: VecDeque<StoredRow>,
    error_ids: HashSet<String>,
    bytes: u64,
}

impl Container {
    fn evict_oldest(&mut self) {
        if let Some(row) = self.rows.pop_front() {
            self.bytes -= row.size;
            self.error_ids.remove(&row.record.error_id);
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    databases: HashMap<String, HashMap<String, Container>>,
    next_id: u64,
}

/// In-memory error log backend.
///
/// Intended for tests and embedding. All containers live behind a single
/// `RwLock`, so bootstrap and capped eviction are atomic with respect to
/// every other operation. Data is lost when the backend is dropped.
pub struct MemoryBackend {
    inner: RwLock<Inner>,
}

impl MemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Names of the containers in `database`, sorted.
    pub fn container_names(&self, database: &str) -> StoreResult<Vec<String>> {
        let inner = self.inner.read().map_err(StoreError::poisoned)?;
        let mut names: Vec<String> = inner
            .databases
            .get(database)
            .map(|db| db.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    /// Total bytes held by a container.
    pub fn container_bytes(&self, database: &str, container: &str) -> StoreResult<u64> {
        let inner = self.inner.read().map_err(StoreError::poisoned)?;
        Ok(lookup(&inner, database, container)?.bytes)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Connect for MemoryBackend {
    fn connect(connection_string: &str) -> StoreResult<Self> {
        if connection_string.starts_with(MEMORY_SCHEME) {
            Ok(Self::new())
        } else {
            Err(StoreError::BackendUnavailable(format!(
                "not a memory connection string: {connection_string:?}"
            )))
        }
    }
}

fn lookup<'a>(inner: &'a Inner, database: &str, container: &str) -> StoreResult<&'a Container> {
    inner
        .databases
        .get(database)
        .and_then(|db| db.get(container))
        .ok_or_else(|| {
            StoreError::BackendUnavailable(format!("container {database}.{container} does not exist"))
        })
}

impl ErrorLogBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "In-Memory"
    }

    fn ensure_container(
        &self,
        database: &str,
        container: &str,
        policy: &CappedPolicy,
    ) -> StoreResult<Bootstrap> {
        let mut inner = self.inner.write().map_err(StoreError::poisoned)?;
        let db = inner.databases.entry(database.to_string()).or_default();
        if db.contains_key(container) {
            return Ok(Bootstrap::Existing);
        }
        let bounds = policy.enabled.then(|| Bounds {
            max_bytes: policy.effective_max_bytes(),
            max_documents: policy.effective_max_documents(),
        });
        db.insert(
            container.to_string(),
            Container {
                bounds,
                ..Default::default()
            },
        );
        Ok(Bootstrap::Created)
    }

    fn container_info(&self, database: &str, container: &str) -> StoreResult<Option<ContainerInfo>> {
        let inner = self.inner.read().map_err(StoreError::poisoned)?;
        let info = inner
            .databases
            .get(database)
            .and_then(|db| db.get(container))
            .map(|c| ContainerInfo {
                capped: c.bounds.is_some(),
                max_bytes: c.bounds.map(|b| b.max_bytes),
                max_documents: c.bounds.map(|b| b.max_documents),
                count: c.rows.len() as u64,
            });
        Ok(info)
    }

    fn insert(
        &self,
        database: &str,
        container: &str,
        mut record: PersistedRecord,
    ) -> StoreResult<RecordId> {
        let size = record.approximate_size()?;
        let mut inner = self.inner.write().map_err(StoreError::poisoned)?;
        inner.next_id += 1;
        let id = RecordId(inner.next_id);

        let c = inner
            .databases
            .get_mut(database)
            .and_then(|db| db.get_mut(container))
            .ok_or_else(|| {
                StoreError::WriteFailure(format!("container {database}.{container} does not exist"))
            })?;

        if c.error_ids.contains(&record.error_id) {
            return Err(StoreError::WriteFailure(format!(
                "duplicate error id {}",
                record.error_id
            )));
        }
        if let Some(bounds) = c.bounds {
            if size > bounds.max_bytes {
                return Err(StoreError::WriteFailure(format!(
                    "record of {size} bytes exceeds capped container size {}",
                    bounds.max_bytes
                )));
            }
        }

        record.id = Some(id);
        c.error_ids.insert(record.error_id.clone());
        c.bytes += size;
        c.rows.push_back(StoredRow { id, size, record });

        if let Some(bounds) = c.bounds {
            while c.rows.len() as u64 > bounds.max_documents || c.bytes > bounds.max_bytes {
                c.evict_oldest();
            }
        }
        Ok(id)
    }

    fn find_by_error_id(
        &self,
        database: &str,
        container: &str,
        error_id: &str,
    ) -> StoreResult<Option<PersistedRecord>> {
        let inner = self.inner.read().map_err(StoreError::poisoned)?;
        let c = lookup(&inner, database, container)?;
        Ok(c
            .rows
            .iter()
            .find(|row| row.record.error_id == error_id)
            .map(|row| row.record.clone()))
    }

    fn find_page(
        &self,
        database: &str,
        container: &str,
        skip: usize,
        limit: usize,
    ) -> StoreResult<Vec<PersistedRecord>> {
        let inner = self.inner.read().map_err(StoreError::poisoned)?;
        let c = lookup(&inner, database, container)?;
        let mut rows: Vec<&StoredRow> = c.rows.iter().collect();
        rows.sort_by(|a, b| {
            b.record
                .time
                .cmp(&a.record.time)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|row| row.record.clone())
            .collect())
    }

    fn count(&self, database: &str, container: &str) -> StoreResult<u64> {
        let inner = self.inner.read().map_err(StoreError::poisoned)?;
        Ok(lookup(&inner, database, container)?.rows.len() as u64)
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let containers = self
            .inner
            .read()
            .map(|inner| inner.databases.values().map(HashMap::len).sum::<usize>())
            .unwrap_or(0);
        f.debug_struct("MemoryBackend")
            .field("container_count", &containers)
            .finish()
    }
}
