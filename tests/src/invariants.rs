//! Invariant tests (spec.md §8, items 1-4 and 6-8) against the in-memory
//! mock adapter. Item 5 (partitioner properties) is exercised directly in
//! `rdiff_partition`; item 7 (cross-engine equivalence) would need two
//! live engines and is out of scope for this network-free suite.

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use chrono::NaiveDateTime;
    use tokio_stream::StreamExt;

    use rdiff_adapter::contract::DatabaseAdapter;
    use rdiff_common::types::{ColumnType, DiffRecord, Sign, TablePath, Value};
    use rdiff_engine::{DiffStatsSnapshot, TableDiffer};
    use rdiff_segment::{KeyKind, TableSegment};

    use crate::mock_adapter::MockAdapter;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn segment(adapter: &Arc<MockAdapter>) -> TableSegment {
        let dyn_adapter: Arc<dyn DatabaseAdapter> = adapter.clone();
        TableSegment::new(
            dyn_adapter,
            TablePath::parse("events").unwrap(),
            "id".to_string(),
            KeyKind::Integer,
            None,
            vec!["rating".to_string()],
            false,
        )
    }

    fn filled_adapter(ids: &[i64]) -> Arc<MockAdapter> {
        let adapter = Arc::new(MockAdapter::new(vec![
            ("id", ColumnType::Integer),
            ("rating", ColumnType::Integer),
        ]));
        for &id in ids {
            adapter.push_row(vec![("id", Value::Integer(id)), ("rating", Value::Integer(9))]);
        }
        adapter
    }

    async fn collect(a: TableSegment, b: TableSegment) -> (Vec<DiffRecord>, DiffStatsSnapshot) {
        let (mut stream, stats) = TableDiffer::default().diff_tables(a, b);
        let mut records = Vec::new();
        while let Some(item) = stream.next().await {
            records.push(item.unwrap());
        }
        (records, stats.snapshot())
    }

    #[tokio::test]
    async fn reflexivity_diffing_a_table_against_itself_is_empty() {
        let adapter = filled_adapter(&[1, 2, 3, 4, 5]);
        let (records, _) = collect(segment(&adapter), segment(&adapter)).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn anti_symmetry_swapping_sides_swaps_the_signs() {
        let a = filled_adapter(&[1, 2, 3]);
        let b = filled_adapter(&[1, 2]);

        let (forward, _) = collect(segment(&a), segment(&b)).await;
        let (backward, _) = collect(segment(&b), segment(&a)).await;

        assert_eq!(forward.len(), 1);
        assert_eq!(backward.len(), 1);
        assert_eq!(forward[0].sign, Sign::Minus);
        assert_eq!(backward[0].sign, Sign::Plus);
        assert_eq!(forward[0].row, backward[0].row);
    }

    #[tokio::test]
    async fn count_conservation_holds_for_unique_keys() {
        let a = filled_adapter(&[1, 2, 3, 4]);
        let b = filled_adapter(&[1, 2, 5]);
        let (records, stats) = collect(segment(&a), segment(&b)).await;

        let minus = records.iter().filter(|r| r.sign == Sign::Minus).count() as i64;
        let plus = records.iter().filter(|r| r.sign == Sign::Plus).count() as i64;
        assert!(minus as u64 <= stats.table1_count);
        assert!(plus as u64 <= stats.table2_count);
        assert_eq!(stats.table1_count as i64 - stats.table2_count as i64, minus - plus);
    }

    #[tokio::test]
    async fn key_monotonicity_output_keys_are_non_decreasing() {
        let a = filled_adapter(&[1, 2, 3, 4, 5, 6, 7]);
        let b = filled_adapter(&[2, 4, 6]);
        let (records, _) = collect(segment(&a), segment(&b)).await;

        let keys: Vec<i64> = records
            .iter()
            .map(|r| r.row[0].parse().expect("normalized key is an integer string"))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[tokio::test]
    async fn checksum_stability_is_independent_of_row_insertion_order() {
        let forward = Arc::new(MockAdapter::new(vec![
            ("id", ColumnType::Integer),
            ("rating", ColumnType::Integer),
        ]));
        let reversed = Arc::new(MockAdapter::new(vec![
            ("id", ColumnType::Integer),
            ("rating", ColumnType::Integer),
        ]));
        for id in [1, 2, 3] {
            forward.push_row(vec![("id", Value::Integer(id)), ("rating", Value::Integer(id * 10))]);
        }
        for id in [3, 2, 1] {
            reversed.push_row(vec![("id", Value::Integer(id)), ("rating", Value::Integer(id * 10))]);
        }

        let seg_forward = segment(&forward).with_schema().await.unwrap().new_key_bounds(0, 10).unwrap();
        let seg_reversed = segment(&reversed).with_schema().await.unwrap().new_key_bounds(0, 10).unwrap();

        assert_eq!(
            seg_forward.checksum().await.unwrap(),
            seg_reversed.checksum().await.unwrap()
        );
    }

    #[tokio::test]
    async fn bound_validation_rejects_inverted_ranges() {
        let adapter = filled_adapter(&[]);
        let seg = segment(&adapter);
        assert!(seg.new_key_bounds(10, 1).is_err());
        assert!(seg.new_update_bounds(ts("2024-01-02 00:00:00"), ts("2024-01-01 00:00:00")).is_err());
    }

    #[tokio::test]
    async fn bound_validation_rejects_update_bounds_without_an_update_column() {
        let adapter = filled_adapter(&[]);
        let seg = segment(&adapter);
        let same = ts("2024-01-01 00:00:00");
        assert!(seg.new_update_bounds(same, same).is_err());
    }
}
