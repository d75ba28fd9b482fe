use chrono::{DateTime, Duration, Utc};

use historian::event::fields;
use historian::{
    Engine, EntityKey, EventDeletion, EventFilter, EventId, EventRecord, FilterExpr, HistorianConfig, HistoryError,
    ReadEventsRequest, ReadRawRequest, StatusCode, TimestampedValue, Variant,
};

fn t(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs)
}

fn engine_with_capacity(value_capacity: usize, event_capacity: usize) -> Engine {
    Engine::new(HistorianConfig {
        value_capacity,
        event_capacity,
        ..HistorianConfig::default()
    })
    .unwrap()
}

fn seed_values(engine: &Engine, key: &str, times: impl IntoIterator<Item = i64>) {
    for secs in times {
        #[allow(clippy::cast_precision_loss)]
        let value = TimestampedValue::good(secs as f64, t(secs));
        engine.on_value_produced(key, value).unwrap();
    }
}

fn times_of(values: &[TimestampedValue]) -> Vec<i64> {
    values.iter().map(|v| v.source_time.timestamp()).collect()
}

#[test]
fn history_keeps_only_the_newest_values() {
    let engine = engine_with_capacity(5, 5);
    engine.historize_values("MyLevel").unwrap();
    seed_values(&engine, "MyLevel", 1..=8);

    let page = engine.read_history(&EntityKey::from("MyLevel"), &ReadRawRequest::all()).unwrap();
    assert_eq!(times_of(&page.items), vec![4, 5, 6, 7, 8]);
    assert!(page.continuation.is_none());
}

#[test]
fn paginated_forward_read_visits_every_value_once() {
    let engine = engine_with_capacity(100, 10);
    let key = EntityKey::from("MyLevel");
    engine.historize_values("MyLevel").unwrap();
    seed_values(&engine, "MyLevel", 1..=10);

    let request = ReadRawRequest::new(Some(t(2)), Some(t(9))).with_bounds(true).with_max_values(3);
    let mut collected = Vec::new();
    let mut pages = 0;
    let mut next = request;
    loop {
        let page = engine.read_history(&key, &next).unwrap();
        pages += 1;
        collected.extend(page.items);
        match page.continuation {
            Some(cp) => next = request.resume(Some(cp)),
            None => break,
        }
    }

    assert_eq!(times_of(&collected), (2..=9).collect::<Vec<_>>());
    assert_eq!(pages, 3);
}

#[test]
fn exclusive_bounds_drop_edge_values() {
    let engine = engine_with_capacity(100, 10);
    let key = EntityKey::from("MyLevel");
    engine.historize_values("MyLevel").unwrap();
    seed_values(&engine, "MyLevel", 1..=5);

    let page = engine.read_history(&key, &ReadRawRequest::new(Some(t(2)), Some(t(4)))).unwrap();
    assert_eq!(times_of(&page.items), vec![3]);
}

#[test]
fn end_only_read_scans_backward_from_newest() {
    let engine = engine_with_capacity(100, 10);
    let key = EntityKey::from("MyLevel");
    engine.historize_values("MyLevel").unwrap();
    seed_values(&engine, "MyLevel", 1..=6);

    let request = ReadRawRequest::new(None, Some(t(4))).with_bounds(true).with_max_values(2);
    let first = engine.read_history(&key, &request).unwrap();
    assert_eq!(times_of(&first.items), vec![4, 3]);

    let second = engine.read_history(&key, &request.resume(first.continuation)).unwrap();
    assert_eq!(times_of(&second.items), vec![2, 1]);
    assert!(second.continuation.is_none());
}

#[test]
fn stepped_read_returns_last_value_at_or_before() {
    let engine = engine_with_capacity(100, 10);
    let key = EntityKey::from("MyLevel");
    engine.historize_values("MyLevel").unwrap();
    engine.on_value_produced("MyLevel", TimestampedValue::good(1.0, t(10))).unwrap();
    engine.on_value_produced("MyLevel", TimestampedValue::good(2.0, t(20))).unwrap();

    let values = engine.read_at_times(&key, &[t(15), t(5), t(25)]).unwrap();

    assert_eq!(values[0].value, Variant::Float(1.0));
    assert_eq!(values[0].source_time, t(15));
    assert_eq!(values[1].value, Variant::Null);
    assert_eq!(values[1].status, StatusCode::BadNoData);
    assert_eq!(values[2].value, Variant::Float(2.0));
}

#[test]
fn delete_by_range_and_at_times() {
    let engine = engine_with_capacity(100, 10);
    let key = EntityKey::from("MyLevel");
    engine.historize_values("MyLevel").unwrap();
    seed_values(&engine, "MyLevel", 1..=10);

    let removed = engine.delete_history(&key, Some(t(3)), Some(t(6))).unwrap();
    assert_eq!(removed, 3);

    let results = engine.delete_at_times(&key, &[t(7), t(4), t(9)]).unwrap();
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(HistoryError::NoData { .. })));
    assert!(results[2].is_ok());

    let page = engine.read_history(&key, &ReadRawRequest::all()).unwrap();
    assert_eq!(times_of(&page.items), vec![1, 2, 6, 8, 10]);

    let err = engine.delete_history(&key, Some(t(1)), None).unwrap_err();
    assert!(err.is_validation());
}

fn event(engine: &Engine, secs: i64, severity: u16) -> EventRecord {
    EventRecord::base(
        engine.event_ids().next_id(),
        "LevelEvent",
        &EntityKey::from("MyLevel.Alarm"),
        t(secs),
        format!("level event {secs}"),
        severity,
    )
}

#[test]
fn event_history_filters_before_paginating() {
    let engine = engine_with_capacity(10, 100);
    let source = EntityKey::from("MyLevel.Alarm");
    engine.historize_events("MyLevel.Alarm").unwrap();
    for secs in 1..=10 {
        let severity = if secs % 2 == 0 { 700 } else { 500 };
        engine.on_event_produced("MyLevel.Alarm", event(&engine, secs, severity)).unwrap();
    }

    let filter = EventFilter::new(
        vec![fields::TIME.into(), fields::SEVERITY.into()],
        Some(FilterExpr::greater_than_or_equal(fields::SEVERITY, 700)),
    )
    .unwrap();
    let request = ReadEventsRequest::new(Some(t(1)), Some(t(10)), filter).with_max_values(3);

    let first = engine.read_event_history(&source, &request).unwrap();
    assert_eq!(first.items.len(), 3);
    assert_eq!(first.items[0][0], Variant::DateTime(t(2)));
    assert_eq!(first.items[0][1], Variant::Int(700));

    let second = engine
        .read_event_history(&source, &request.clone().resume(first.continuation))
        .unwrap();
    assert_eq!(second.items.len(), 2);
    assert_eq!(second.items[1][0], Variant::DateTime(t(10)));
    assert!(second.continuation.is_none());
}

#[test]
fn event_deletion_reports_unknown_ids() {
    let engine = engine_with_capacity(10, 100);
    let source = EntityKey::from("MyLevel.Alarm");
    engine.historize_events("MyLevel.Alarm").unwrap();
    let kept = event(&engine, 1, 500);
    let gone = event(&engine, 2, 500);
    engine.on_event_produced("MyLevel.Alarm", kept).unwrap();
    engine.on_event_produced("MyLevel.Alarm", gone.clone()).unwrap();

    let outcome = engine
        .delete_events(&source, &[gone.event_id.clone(), EventId::from_bytes(vec![0xAB; 16])])
        .unwrap();
    assert_eq!(outcome, vec![EventDeletion::Removed, EventDeletion::Unresolved]);

    let request = ReadEventsRequest::new(None, None, EventFilter::select_all_standard());
    assert_eq!(engine.read_event_history(&source, &request).unwrap().items.len(), 1);
}

#[test]
fn unsupported_history_operations() {
    let engine = engine_with_capacity(10, 10);
    let key = EntityKey::from("MyLevel");
    engine.historize_values("MyLevel").unwrap();
    let historian = engine.historian();

    assert!(historian.read_processed(&key).unwrap_err().is_unsupported());
    assert!(historian.read_modified(&key).unwrap_err().is_unsupported());
    assert!(historian.update_data(&key, &[]).unwrap_err().is_unsupported());
    assert!(historian.delete_modified(&key).unwrap_err().is_unsupported());
}
