//! Property-based tests for topology planning and listing parsing

use cluster_bootstrap::topology::{assign_replicas, master_count, parse_cluster_nodes, validate};
use proptest::prelude::*;
use std::collections::HashSet;

// Validation accepts exactly the evenly divisible splits with at least 3 masters
proptest! {
    #[test]
    fn test_validate_iff_even_split_with_three_masters(
        node_count in 0usize..200,
        replica_count in 0usize..10
    ) {
        let expected = node_count % (replica_count + 1) == 0
            && node_count / (replica_count + 1) >= 3;
        prop_assert_eq!(validate(node_count, replica_count).is_ok(), expected);
    }
}

// assign_replicas is a bijection from (master, slot) onto [masters, nodes)
proptest! {
    #[test]
    fn test_assignment_is_bijection(masters in 3usize..40, replica_count in 0usize..6) {
        let node_count = masters * (replica_count + 1);
        prop_assert_eq!(master_count(node_count, replica_count), masters);

        let assignment = assign_replicas(node_count, replica_count);
        prop_assert_eq!(assignment.len(), masters * replica_count);

        let replicas: HashSet<usize> = assignment.iter().map(|a| a.replica.0).collect();
        prop_assert_eq!(replicas.len(), assignment.len());
        let expected: HashSet<usize> = (masters..node_count).collect();
        prop_assert_eq!(replicas, expected);

        let pairs: HashSet<(usize, usize)> =
            assignment.iter().map(|a| (a.master.0, a.slot)).collect();
        prop_assert_eq!(pairs.len(), assignment.len());

        for pair in &assignment {
            prop_assert!(pair.master.0 < masters);
            prop_assert!(pair.slot < replica_count);
            prop_assert_eq!(pair.replica.0, pair.master.0 + (pair.slot + 1) * masters);
        }
    }
}

// Line order does not change the parsed map
proptest! {
    #[test]
    fn test_listing_order_independent(
        ports in prop::collection::hash_set(1u16..=u16::MAX, 1..12),
        seed in any::<u64>()
    ) {
        let mut lines: Vec<String> = ports
            .iter()
            .map(|port| format!("id{} 127.0.0.1:{}@{} master - 0 0 1 connected", port, port, port))
            .collect();

        let forward = parse_cluster_nodes(&lines.join("\n"));

        // deterministic shuffle driven by the seed
        let len = lines.len();
        let mut state = seed;
        for i in (1..len).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state >> 33) as usize % (i + 1);
            lines.swap(i, j);
        }
        let shuffled = parse_cluster_nodes(&lines.join("\n"));

        prop_assert_eq!(forward.len(), ports.len());
        prop_assert_eq!(&forward, &shuffled);
        for port in &ports {
            prop_assert_eq!(forward.get(port).cloned(), Some(format!("id{}", port)));
        }
    }
}

#[test]
fn test_three_lines_any_order() {
    let lines = [
        "a1 127.0.0.1:30000@40000 myself,master - 0 0 1 connected 0-5460",
        "b2 127.0.0.1:30001@40001 master - 0 0 2 connected 5461-10922",
        "c3 127.0.0.1:30002@40002 master - 0 0 3 connected 10923-16383",
    ];
    let orders = [[0, 1, 2], [2, 1, 0], [1, 2, 0]];
    for order in orders {
        let listing: Vec<&str> = order.iter().map(|i| lines[*i]).collect();
        let ids = parse_cluster_nodes(&listing.join("\n"));
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[&30000], "a1");
        assert_eq!(ids[&30001], "b2");
        assert_eq!(ids[&30002], "c3");
    }
}
