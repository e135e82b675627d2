use std::sync::Arc;

use envlane::fs::MockFileSystem;
use envlane::sequence::MemorySequenceStore;
use envlane_test_utils::builders::{mock_allocator, shared_mock_allocator};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    // Restarting between batches (a fresh allocator over the same files)
    // never reissues or reorders IDs.
    #[test]
    fn ids_increase_across_restarts(
        batches in proptest::collection::vec(1..8usize, 1..6),
        base in 0..1000u64,
    ) {
        let rt = runtime();
        let fs = MockFileSystem::new();
        let mut issued = Vec::new();

        for batch in batches {
            let allocator = mock_allocator(&fs).with_base(base);
            for _ in 0..batch {
                issued.push(rt.block_on(allocator.next()).unwrap());
            }
        }

        prop_assert_eq!(issued[0], base + 1);
        prop_assert!(issued.windows(2).all(|w| w[1] == w[0] + 1));
    }

    // Instances sharing a store stay strictly increasing whatever the
    // interleaving and whatever outages the store goes through.
    #[test]
    fn shared_ids_never_repeat(
        steps in proptest::collection::vec((0..3usize, any::<bool>()), 1..40),
    ) {
        let rt = runtime();
        let store = MemorySequenceStore::with_value(0);
        let allocators: Vec<_> = (0..3)
            .map(|_| shared_mock_allocator(&MockFileSystem::new(), Arc::new(store.clone())))
            .collect();

        let mut per_instance: Vec<Vec<u64>> = vec![Vec::new(); allocators.len()];
        let mut healthy = Vec::new();
        for (who, outage) in steps {
            store.set_outage(outage);
            let id = rt.block_on(allocators[who].next()).unwrap();
            per_instance[who].push(id);
            if !outage {
                healthy.push(id);
            }
        }

        for ids in &per_instance {
            prop_assert!(ids.windows(2).all(|w| w[1] > w[0]));
        }
        // While the store is reachable, every issued ID is globally unique.
        prop_assert!(healthy.windows(2).all(|w| w[1] > w[0]));
    }
}
