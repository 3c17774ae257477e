//! End-to-end scenarios S1-S6 (spec.md §8) against the in-memory mock
//! adapter.

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

    fn int_segment(adapter: &Arc<MockAdapter>, update_column: bool) -> TableSegment {
        let dyn_adapter: Arc<dyn DatabaseAdapter> = adapter.clone();
        TableSegment::new(
            dyn_adapter,
            TablePath::parse("ratings").unwrap(),
            "userid".to_string(),
            KeyKind::Integer,
            update_column.then(|| "ts".to_string()),
            vec!["rating".to_string(), "ts".to_string()],
            false,
        )
    }

    fn uuid_segment(adapter: &Arc<MockAdapter>) -> TableSegment {
        let dyn_adapter: Arc<dyn DatabaseAdapter> = adapter.clone();
        TableSegment::new(
            dyn_adapter,
            TablePath::parse("comments").unwrap(),
            "id".to_string(),
            KeyKind::Uuid,
            None,
            vec!["comment".to_string()],
            false,
        )
    }

    async fn collect(a: TableSegment, b: TableSegment, differ: TableDiffer) -> (Vec<DiffRecord>, DiffStatsSnapshot) {
        let (mut stream, stats) = differ.diff_tables(a, b);
        let mut records = Vec::new();
        while let Some(item) = stream.next().await {
            records.push(item.unwrap());
        }
        (records, stats.snapshot())
    }

    fn empty_ratings_adapter() -> Arc<MockAdapter> {
        Arc::new(MockAdapter::new(vec![
            ("userid", ColumnType::Integer),
            ("rating", ColumnType::Integer),
            ("ts", ColumnType::Temporal { precision: 6, rounds_on_precision_loss: true }),
        ]))
    }

    #[tokio::test]
    async fn s1_empty_vs_empty_is_an_empty_diff() {
        let a = empty_ratings_adapter();
        let b = empty_ratings_adapter();
        let (records, stats) = collect(int_segment(&a, false), int_segment(&b, false), TableDiffer::default()).await;
        assert!(records.is_empty());
        assert_eq!(stats.rows_downloaded, 0);
    }

    #[tokio::test]
    async fn s2_small_diff_below_threshold() {
        let a = empty_ratings_adapter();
        a.push_row(vec![
            ("userid", Value::Integer(1)),
            ("rating", Value::Integer(9)),
            ("ts", Value::Temporal(ts("2022-01-01 00:00:00"), 6)),
        ]);
        a.push_row(vec![
            ("userid", Value::Integer(2)),
            ("rating", Value::Integer(9)),
            ("ts", Value::Temporal(ts("2022-01-01 00:00:00"), 6)),
        ]);
        let b = empty_ratings_adapter();
        b.push_row(vec![
            ("userid", Value::Integer(1)),
            ("rating", Value::Integer(9)),
            ("ts", Value::Temporal(ts("2022-01-01 00:00:00"), 6)),
        ]);

        let (records, _) = collect(int_segment(&a, false), int_segment(&b, false), TableDiffer::default()).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sign, Sign::Minus);
        assert_eq!(records[0].row[0], "2");
        assert_eq!(records[0].row[2], "2022-01-01 00:00:00.000000");
    }

    #[tokio::test]
    async fn s3_diff_above_threshold_forces_bisection() {
        let a = empty_ratings_adapter();
        for id in 1..=5 {
            a.push_row(vec![
                ("userid", Value::Integer(id)),
                ("rating", Value::Integer(9)),
                ("ts", Value::Temporal(ts("2022-01-01 00:00:00"), 6)),
            ]);
        }
        let b = empty_ratings_adapter();
        for id in 1..=4 {
            b.push_row(vec![
                ("userid", Value::Integer(id)),
                ("rating", Value::Integer(9)),
                ("ts", Value::Temporal(ts("2022-01-01 00:00:00"), 6)),
            ]);
        }

        let differ = TableDiffer::new(3, 4, 1).unwrap();
        let (records, stats) = collect(int_segment(&a, false), int_segment(&b, false), differ).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sign, Sign::Minus);
        assert_eq!(records[0].row[0], "5");
        assert!(stats.segments_checksummed >= 1);
    }

    #[tokio::test]
    async fn s4_row_modification_interleaves_minus_and_plus_by_key() {
        let a = empty_ratings_adapter();
        let b = empty_ratings_adapter();
        let t1 = ts("2022-01-01 00:00:00");
        let t2 = ts("2022-06-01 00:00:00");
        for id in 1..=5 {
            let a_ts = if id % 2 == 0 { t2 } else { t1 };
            a.push_row(vec![
                ("userid", Value::Integer(id)),
                ("rating", Value::Integer(9)),
                ("ts", Value::Temporal(a_ts, 6)),
            ]);
            b.push_row(vec![
                ("userid", Value::Integer(id)),
                ("rating", Value::Integer(9)),
                ("ts", Value::Temporal(t1, 6)),
            ]);
        }

        let (records, _) = collect(int_segment(&a, false), int_segment(&b, false), TableDiffer::default()).await;

        let changed_keys: Vec<i64> = (1..=5).filter(|id| id % 2 == 0).collect();
        assert_eq!(records.len(), changed_keys.len() * 2);
        for pair in records.chunks(2) {
            assert_eq!(pair[0].sign, Sign::Minus);
            assert_eq!(pair[1].sign, Sign::Plus);
            assert_eq!(pair[0].row[0], pair[1].row[0]);
        }
        let keys: Vec<i64> = records
            .iter()
            .step_by(2)
            .map(|r| r.row[0].parse().expect("normalized key is an integer string"))
            .collect();
        assert_eq!(keys, changed_keys);
    }

    #[tokio::test]
    async fn s5_uuid_keys_diff_on_the_extra_row_and_reject_malformed_ones() {
        let a = Arc::new(MockAdapter::new(vec![("id", ColumnType::Uuid), ("comment", ColumnType::Text)]));
        let b = Arc::new(MockAdapter::new(vec![("id", ColumnType::Uuid), ("comment", ColumnType::Text)]));

        let mut uuids = Vec::new();
        for i in 0u32..100 {
            let uuid = format!("00000000-0000-0000-0000-{i:012x}");
            a.push_row(vec![("id", Value::Uuid(uuid.clone())), ("comment", Value::Text("c".into()))]);
            b.push_row(vec![("id", Value::Uuid(uuid.clone())), ("comment", Value::Text("c".into()))]);
            uuids.push(uuid);
        }
        let extra_uuid = "00000000-0000-0000-0000-0000000000ff".to_string();
        a.push_row(vec![("id", Value::Uuid(extra_uuid.clone())), ("comment", Value::Text("extra".into()))]);

        let (records, _) = collect(uuid_segment(&a), uuid_segment(&b), TableDiffer::default()).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sign, Sign::Minus);
        assert_eq!(records[0].row[0], extra_uuid);

        let bad = Arc::new(MockAdapter::new(vec![("id", ColumnType::Uuid), ("comment", ColumnType::Text)]));
        bad.push_row(vec![("id", Value::Uuid("not-a-uuid".into())), ("comment", Value::Text("c".into()))]);
        let seg = uuid_segment(&bad).with_schema().await.unwrap();
        assert!(seg.discover_key_bounds().await.is_err());
    }

    #[tokio::test]
    async fn s6_update_time_filter_narrows_the_compared_range() {
        let a = empty_ratings_adapter();
        let b = empty_ratings_adapter();
        let now = ts("2022-06-01 00:00:00");
        let floor = ts("2000-01-01 00:00:00");
        let ceiling = now + chrono::Duration::days(1);
        let offsets = [
            now - chrono::Duration::days(50),
            now - chrono::Duration::hours(3),
            now - chrono::Duration::minutes(10),
            now - chrono::Duration::seconds(1),
            now,
        ];
        for (i, when) in offsets.iter().enumerate() {
            a.push_row(vec![
                ("userid", Value::Integer(i as i64)),
                ("rating", Value::Integer(9)),
                ("ts", Value::Temporal(*when, 6)),
            ]);
        }
        // target has everything except the row at index 1 ("t-3h").
        for (i, when) in offsets.iter().enumerate() {
            if i == 1 {
                continue;
            }
            b.push_row(vec![
                ("userid", Value::Integer(i as i64)),
                ("rating", Value::Integer(9)),
                ("ts", Value::Temporal(*when, 6)),
            ]);
        }

        // Strictly between offsets[3] ("t-1s") and offsets[4] ("t"): the
        // `<` upper bound keeps offsets[0..=3], i.e. 4 rows on each side
        // before accounting for the missing "t-3h" row.
        let max_update = now - chrono::Duration::milliseconds(500);
        let seg_a = int_segment(&a, true).new_update_bounds(floor, max_update).unwrap();
        let seg_b = int_segment(&b, true).new_update_bounds(floor, max_update).unwrap();
        let (records, stats) = collect(seg_a, seg_b, TableDiffer::default()).await;
        assert_eq!(stats.table1_count, 4);
        assert_eq!(stats.table2_count, 3);
        assert_eq!(records.len(), 1);

        // >= "t-1s": keeps offsets[3..=4], present on both sides.
        let min_update = offsets[3];
        let seg_a = int_segment(&a, true).new_update_bounds(min_update, ceiling).unwrap();
        let seg_b = int_segment(&b, true).new_update_bounds(min_update, ceiling).unwrap();
        let (records, stats) = collect(seg_a, seg_b, TableDiffer::default()).await;
        assert_eq!(stats.table1_count, 2);
        assert_eq!(stats.table2_count, 2);
        assert!(records.is_empty());
    }
}
