//! Property tests for partitioning, merging and compact block input

use cipherscan_scan::{
    merge_matches, parse_compact_blocks, partition_size, CompactBlock, CompactOrchardAction,
    CompactTx, MatchingTransaction,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::io::Write;

fn matching(txid: u8, height: u64) -> MatchingTransaction {
    MatchingTransaction {
        txid: format!("{:02x}", txid),
        height,
        timestamp: height * 75,
    }
}

proptest! {
    #[test]
    fn prop_partition_covers_every_block(total in 0usize..5_000, workers in 1usize..32) {
        let size = partition_size(total, workers);
        prop_assert!(size >= 1);
        // Every block lands in some worker's chunk
        prop_assert!(size * workers >= total);
        // and the chunk is no longer than it has to be
        if total > 0 {
            prop_assert!((size - 1) * workers < total);
        }
    }

    #[test]
    fn prop_merge_is_unique_and_descending(
        per_worker in prop::collection::vec(
            prop::collection::vec((0u8..40, 0u64..1_000), 0..20),
            0..8,
        )
    ) {
        let input: Vec<Vec<MatchingTransaction>> = per_worker
            .iter()
            .map(|w| w.iter().map(|(t, h)| matching(*t, *h)).collect())
            .collect();
        let distinct: HashSet<String> = input.iter().flatten().map(|m| m.txid.clone()).collect();

        let merged = merge_matches(input.clone());
        prop_assert_eq!(merged.len(), distinct.len());
        prop_assert!(merged.windows(2).all(|w| w[0].height >= w[1].height));

        // First occurrence in worker order is the one kept
        for m in &merged {
            let first = input.iter().flatten().find(|x| x.txid == m.txid).unwrap();
            prop_assert_eq!(first, m);
        }
    }

    #[test]
    fn prop_compact_blocks_json_roundtrip(heights in prop::collection::vec(0u64..3_000_000, 0..10)) {
        let blocks: Vec<CompactBlock> = heights
            .iter()
            .map(|h| CompactBlock {
                height: *h,
                hash: format!("{:064x}", h),
                time: 1_477_641_360 + h * 75,
                vtx: vec![CompactTx {
                    hash: format!("tx{}", h),
                    actions: vec![CompactOrchardAction {
                        nullifier: "00".repeat(32),
                        cmx: "01".repeat(32),
                        ephemeral_key: "02".repeat(32),
                        ciphertext: "03".repeat(52),
                    }],
                    outputs: Vec::new(),
                }],
            })
            .collect();
        let json = serde_json::to_string(&blocks).unwrap();
        prop_assert_eq!(parse_compact_blocks(&json).unwrap(), blocks);
    }
}

#[test]
fn test_parse_blocks_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[
            {{"height": "2000000", "hash": "ab", "time": "1669000000",
              "vtx": [{{"txid": "deadbeef", "outputs": [
                {{"cmu": "11", "ephemeralKey": "22", "ciphertext": "33"}}
              ]}}]}},
            {{"height": 2000001}}
        ]"#
    )
    .unwrap();

    let json = std::fs::read_to_string(file.path()).unwrap();
    let blocks = parse_compact_blocks(&json).unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].vtx[0].hash, "deadbeef");
    assert!(blocks[0].vtx[0].actions.is_empty());
    assert_eq!(blocks[0].output_count(), 1);
    assert_eq!(blocks[1].time, 0);
    assert!(blocks[1].vtx.is_empty());
}
