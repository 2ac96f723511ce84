//! Process-wide cache of disposal contracts.
//!
//! A contract is a pure function of a type's structure within one
//! compilation snapshot, so entries are keyed by type identity and the
//! whole cache is invalidated when the snapshot changes. Concurrent
//! readers never block each other; two callers racing to compute the
//! same entry both compute (idempotent, identical results) and the
//! second insert is a no-op.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::model::TypeId;

use super::classify::DisposableContract;

#[derive(Debug, Default)]
struct Shard {
    snapshot: u64,
    contracts: HashMap<TypeId, DisposableContract>,
}

/// Lazily populated contract cache, safe for concurrent use.
#[derive(Debug, Default)]
pub struct ContractCache {
    inner: RwLock<Shard>,
}

impl ContractCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the contract for `ty`, computing it on first request.
    ///
    /// `compute` runs outside any lock; duplicate concurrent computes
    /// are acceptable by design.
    pub fn get_or_compute<E>(
        &self,
        snapshot: u64,
        ty: TypeId,
        compute: impl FnOnce() -> Result<DisposableContract, E>,
    ) -> Result<DisposableContract, E> {
        {
            let shard = self.inner.read().expect("contract cache poisoned");
            if shard.snapshot == snapshot {
                if let Some(contract) = shard.contracts.get(&ty) {
                    tracing::debug!(?ty, "contract cache hit");
                    return Ok(contract.clone());
                }
            }
        }

        let contract = compute()?;

        let mut shard = self.inner.write().expect("contract cache poisoned");
        if shard.snapshot != snapshot {
            // snapshot changed underneath us: invalidate wholesale
            shard.snapshot = snapshot;
            shard.contracts.clear();
        }
        shard
            .contracts
            .entry(ty)
            .or_insert_with(|| contract.clone());
        Ok(contract)
    }

    /// Drop every entry regardless of snapshot.
    pub fn invalidate(&self) {
        let mut shard = self.inner.write().expect("contract cache poisoned");
        shard.contracts.clear();
    }

    /// Number of cached entries; test and telemetry helper.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .expect("contract cache poisoned")
            .contracts
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classify::ContractKind;

    fn direct() -> DisposableContract {
        DisposableContract {
            kind: ContractKind::Direct,
            release_methods: vec![],
        }
    }

    #[test]
    fn first_caller_computes_second_reads() {
        let cache = ContractCache::new();
        let mut computes = 0;

        for _ in 0..2 {
            let contract: Result<_, ()> = cache.get_or_compute(1, TypeId(0), || {
                computes += 1;
                Ok(direct())
            });
            assert_eq!(contract.unwrap().kind, ContractKind::Direct);
        }

        assert_eq!(computes, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn snapshot_change_invalidates_wholesale() {
        let cache = ContractCache::new();
        let _: Result<_, ()> = cache.get_or_compute(1, TypeId(0), || Ok(direct()));
        let _: Result<_, ()> = cache.get_or_compute(1, TypeId(1), || Ok(direct()));
        assert_eq!(cache.len(), 2);

        let mut computed = false;
        let _: Result<_, ()> = cache.get_or_compute(2, TypeId(0), || {
            computed = true;
            Ok(direct())
        });
        assert!(computed, "stale entry must not satisfy a new snapshot");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn compute_errors_leave_no_entry() {
        let cache = ContractCache::new();
        let err: Result<DisposableContract, &str> =
            cache.get_or_compute(1, TypeId(0), || Err("interrupted"));
        assert!(err.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_readers_do_not_block() {
        use std::sync::Arc;
        let cache = Arc::new(ContractCache::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let contract: Result<_, ()> =
                        cache.get_or_compute(1, TypeId(0), || Ok(direct()));
                    contract.unwrap().kind
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), ContractKind::Direct);
        }
        assert_eq!(cache.len(), 1);
    }
}
