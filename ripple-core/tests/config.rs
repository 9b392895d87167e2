//! Runtime configuration.
//!
//! The default store is process-wide, so this lives in its own test binary
//! with a single test.

use std::sync::Arc;

use ripple_core::graph::StoreKind;
use ripple_core::reactive::{Computed, Runtime, RuntimeConfig, Signal};

#[test]
fn configure_installs_default_store_once() {
    let config = RuntimeConfig::from_json(r#"{ "store": "locked" }"#).unwrap();
    assert_eq!(config.store, StoreKind::Locked);
    assert_eq!(RuntimeConfig::from_json("{}").unwrap(), RuntimeConfig::default());
    assert!(RuntimeConfig::from_json(r#"{ "store": "sharded" }"#).is_err());

    assert!(Runtime::configure(config));
    assert!(!Runtime::configure(RuntimeConfig::default()));

    let store = Runtime::store();
    assert!(Arc::ptr_eq(&store, &Runtime::store()));

    // Nodes built after configuration share the locked store.
    let base = Signal::new(2);
    let squared = Computed::new({
        let base = base.clone();
        move || base.get() * base.get()
    });
    assert_eq!(squared.get(), 4);
    base.set(3);
    assert_eq!(squared.get(), 9);
}
