use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};

use historian::{
    DataChangeFilter, DataChangeTrigger, Deadband, Engine, EntityKey, HistorianConfig, MonitoredItem, Notification,
    SubscriptionError, TimestampedValue, Variant,
};

fn t(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(secs)
}

fn engine() -> Engine {
    Engine::new(HistorianConfig::default()).unwrap()
}

#[test]
fn every_observer_sees_each_value_until_unsubscribed() {
    let engine = engine();
    let counters: Vec<Arc<AtomicUsize>> = (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    let handles: Vec<_> = counters
        .iter()
        .map(|counter| {
            let counter = Arc::clone(counter);
            engine.subscribe("MyLevel", MonitoredItem::Values, move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            })
        })
        .collect();

    assert_eq!(engine.on_value_produced("MyLevel", TimestampedValue::good(1.0, t(1))).unwrap(), 3);

    engine.unsubscribe(handles[1]).unwrap();
    assert_eq!(engine.on_value_produced("MyLevel", TimestampedValue::good(2.0, t(2))).unwrap(), 2);

    let seen: Vec<usize> = counters.iter().map(|c| c.load(Ordering::Relaxed)).collect();
    assert_eq!(seen, vec![2, 1, 2]);

    let err = engine.unsubscribe(handles[1]).unwrap_err();
    assert!(matches!(
        err,
        historian::HistorianError::Subscription(SubscriptionError::UnknownHandle { .. })
    ));
}

#[test]
fn observers_only_see_their_own_entity() {
    let engine = engine();
    let level = engine.subscribe_stream("MyLevel", MonitoredItem::Values);
    let item = engine.subscribe_stream("DataItem0", MonitoredItem::Values);

    engine.on_value_produced("DataItem0", TimestampedValue::good(3.0, t(1))).unwrap();

    assert!(level.is_empty());
    let notification = item.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(notification.key(), &EntityKey::from("DataItem0"));
    assert_eq!(notification.value().map(|v| &v.value), Some(&Variant::Float(3.0)));
}

#[test]
fn stream_receives_values_from_another_thread() {
    let engine = Arc::new(engine());
    let stream = engine.subscribe_stream("MyLevel", MonitoredItem::Values);

    let producer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 0..20 {
                let value = TimestampedValue::good(f64::from(i), t(i64::from(i)));
                engine.on_value_produced("MyLevel", value).unwrap();
            }
        })
    };
    producer.join().unwrap();

    let mut received = Vec::new();
    while let Ok(Notification::DataChange { value, .. }) = stream.recv_timeout(Duration::from_millis(200)) {
        received.push(value.value);
        if received.len() == 20 {
            break;
        }
    }
    let expected: Vec<Variant> = (0..20).map(|i| Variant::Float(f64::from(i))).collect();
    assert_eq!(received, expected);
}

#[test]
fn dropping_a_stream_unsubscribes() {
    let engine = engine();
    let key = EntityKey::from("MyLevel");
    let stream = engine.subscribe_stream("MyLevel", MonitoredItem::Values);
    assert_eq!(engine.registry().observer_count(&key), 1);

    drop(stream);
    assert_eq!(engine.registry().observer_count(&key), 0);
    assert_eq!(engine.on_value_produced("MyLevel", TimestampedValue::good(1.0, t(1))).unwrap(), 0);
}

#[test]
fn slow_stream_drops_instead_of_blocking() {
    let engine = Engine::new(HistorianConfig {
        stream_capacity: 2,
        ..HistorianConfig::default()
    })
    .unwrap();
    let stream = engine.subscribe_stream("MyLevel", MonitoredItem::Values);

    for i in 0..5 {
        engine.on_value_produced("MyLevel", TimestampedValue::good(f64::from(i), t(i64::from(i)))).unwrap();
    }

    assert_eq!(stream.len(), 2);
    assert_eq!(engine.registry().dropped_notifications(), 3);
}

#[test]
fn deadband_suppresses_small_changes() {
    let engine = engine();
    let filter = DataChangeFilter::new(DataChangeTrigger::StatusValue, Deadband::Absolute(5.0)).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.subscribe("MyLevel", MonitoredItem::Data(filter), move |n| {
        if let Some(v) = n.value() {
            sink.lock().unwrap().push(v.value.clone());
        }
    });

    for (i, level) in [10.0, 12.0, 16.0, 17.0, 9.0].into_iter().enumerate() {
        let secs = i64::try_from(i).unwrap();
        engine.on_value_produced("MyLevel", TimestampedValue::good(level, t(secs))).unwrap();
    }

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![Variant::Float(10.0), Variant::Float(16.0), Variant::Float(9.0)]
    );
}

#[test]
fn percent_deadband_is_rejected() {
    let err = DataChangeFilter::new(DataChangeTrigger::StatusValue, Deadband::Percent(10.0)).unwrap_err();
    assert!(matches!(err, historian::ValidationError::UnsupportedFilter { .. }));
}
