use crate::core::{Ownership, Result, SubscriptionId};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Writers to the same (owner, subscription) pair serialize on one mutex.
pub type LockScope = (Ownership, SubscriptionId);

/// Held scope locks; released on drop.
pub struct ScopeGuard {
    scopes: Vec<LockScope>,
    _scope_guards: Vec<OwnedMutexGuard<()>>,
    _partition_guards: Vec<OwnedRwLockReadGuard<()>>,
}

impl ScopeGuard {
    pub fn covers(&self, scope: &LockScope) -> bool {
        self.scopes.binary_search(scope).is_ok()
    }

    pub fn scopes(&self) -> &[LockScope] {
        &self.scopes
    }
}

/// Exclusive hold on a whole ownership partition.
pub struct PartitionGuard {
    _guard: OwnedRwLockWriteGuard<()>,
}

/// Lock table for mutations.
///
/// Scoped writers hold their partition shared plus one mutex per scope.
/// Partition-wide operations hold the partition exclusively. Everything is
/// acquired in sorted order.
#[derive(Debug)]
pub struct ScopeLocks {
    others: Arc<RwLock<()>>,
    dpc: Arc<RwLock<()>>,
    scopes: Mutex<HashMap<LockScope, Arc<AsyncMutex<()>>>>,
}

impl Default for ScopeLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeLocks {
    pub fn new() -> Self {
        Self {
            others: Arc::new(RwLock::new(())),
            dpc: Arc::new(RwLock::new(())),
            scopes: Mutex::new(HashMap::new()),
        }
    }

    fn partition(&self, ownership: Ownership) -> Arc<RwLock<()>> {
        match ownership {
            Ownership::Others => Arc::clone(&self.others),
            Ownership::Dpc => Arc::clone(&self.dpc),
        }
    }

    fn scope_mutexes(&self, scopes: &[LockScope]) -> Result<Vec<Arc<AsyncMutex<()>>>> {
        let mut registry = self.scopes.lock()?;
        Ok(scopes
            .iter()
            .map(|scope| Arc::clone(registry.entry(*scope).or_default()))
            .collect())
    }

    /// Lock every scope in `scopes`.
    pub async fn lock(&self, scopes: impl IntoIterator<Item = LockScope>) -> Result<ScopeGuard> {
        let scopes: Vec<LockScope> = scopes.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let owners: BTreeSet<Ownership> = scopes.iter().map(|(owner, _)| *owner).collect();

        let mut partition_guards = Vec::with_capacity(owners.len());
        for owner in owners {
            partition_guards.push(self.partition(owner).read_owned().await);
        }

        let mutexes = self.scope_mutexes(&scopes)?;
        let mut scope_guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            scope_guards.push(mutex.lock_owned().await);
        }

        Ok(ScopeGuard {
            scopes,
            _scope_guards: scope_guards,
            _partition_guards: partition_guards,
        })
    }

    /// Lock a whole partition against every scoped writer.
    pub async fn lock_partition(&self, ownership: Ownership) -> PartitionGuard {
        PartitionGuard {
            _guard: self.partition(ownership).write_owned().await,
        }
    }
}
