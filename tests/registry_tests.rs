//! ActiveDatabaseRegistry tests

mod common;

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use common::{FixtureOpener, full_db};
use ipresolver::services::geoip::{
    ActiveDatabaseRegistry, DatabaseHandle, DatabaseOpener, LookupService,
};

fn open_handle(dir: &std::path::Path, label: &str) -> Arc<DatabaseHandle> {
    let path = dir.join(format!("{}.mmdb", label));
    std::fs::write(&path, full_db(label)).unwrap();
    let db = FixtureOpener::default().open(&path).unwrap();
    Arc::new(DatabaseHandle::new(db, path, 1000))
}

#[test]
fn test_empty_registry_reports_unavailable() {
    let registry = ActiveDatabaseRegistry::new();

    assert!(registry.current().is_none());
    assert!(!registry.is_available());
    assert_eq!(registry.generation(), None);
}

#[test]
fn test_publish_returns_superseded_handle() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ActiveDatabaseRegistry::new();
    let v1 = open_handle(dir.path(), "v1");
    let v2 = open_handle(dir.path(), "v2");

    assert!(registry.publish(v1.clone()).is_none());
    assert_eq!(registry.generation(), Some(v1.generation()));

    let previous = registry.publish(v2.clone()).unwrap();
    assert!(Arc::ptr_eq(&previous, &v1));
    assert!(Arc::ptr_eq(&registry.current().unwrap(), &v2));
}

#[test]
fn test_handle_describes_where_it_came_from() {
    let dir = tempfile::tempdir().unwrap();
    let v1 = open_handle(dir.path(), "v1");
    let v2 = open_handle(dir.path(), "v2");

    assert_eq!(v1.source(), dir.path().join("v1.mmdb"));
    assert_eq!(v1.provider_name(), "Fixture");
    assert!(v2.generation() > v1.generation());
    assert!(v2.loaded_at() >= v1.loaded_at());
}

#[test]
fn test_held_handle_survives_replacement() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ActiveDatabaseRegistry::new();
    registry.publish(open_handle(dir.path(), "v1"));

    let held = registry.current().unwrap();
    registry.publish(open_handle(dir.path(), "v2"));
    drop(dir);

    let ip: IpAddr = "203.0.113.7".parse().unwrap();
    let record = held.lookup(ip).unwrap().unwrap();
    assert_eq!(record.city.as_deref(), Some("City-v1"));
}

#[test]
fn test_concurrent_lookups_never_mix_generations() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ActiveDatabaseRegistry::new());
    registry.publish(open_handle(dir.path(), "old"));
    let new_handle = open_handle(dir.path(), "new");

    let stop = Arc::new(AtomicBool::new(false));
    let seen_new = Arc::new(AtomicUsize::new(0));
    let service = LookupService::new(registry.clone());

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            let stop = stop.clone();
            let seen_new = seen_new.clone();
            std::thread::spawn(move || {
                let mut lookups = 0usize;
                while !stop.load(Ordering::Acquire) || lookups == 0 {
                    let record = service.lookup("203.0.113.7").unwrap();
                    let label = record
                        .city
                        .as_deref()
                        .and_then(|c| c.strip_prefix("City-"))
                        .unwrap()
                        .to_string();

                    // 同一条记录的所有字段必须来自同一个数据集
                    assert!(label == "old" || label == "new", "label {}", label);
                    assert_eq!(record.region_name, Some(format!("Region-{}", label)));
                    assert_eq!(record.time_zone, Some(format!("Zone/{}", label)));

                    if label == "new" {
                        seen_new.fetch_add(1, Ordering::Relaxed);
                    }
                    lookups += 1;
                }
                lookups
            })
        })
        .collect();

    std::thread::sleep(std::time::Duration::from_millis(20));
    registry.publish(new_handle);
    std::thread::sleep(std::time::Duration::from_millis(20));
    stop.store(true, Ordering::Release);

    let total: usize = readers.into_iter().map(|r| r.join().unwrap()).sum();
    assert!(total > 0);
    assert!(seen_new.load(Ordering::Relaxed) > 0);

    // 发布完成后不会再看到旧数据
    let after = service.lookup("203.0.113.7").unwrap();
    assert_eq!(after.city.as_deref(), Some("City-new"));
}
