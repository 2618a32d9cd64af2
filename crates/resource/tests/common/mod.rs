//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Once};

use elif_resource::{MemoryRemote, ResourceClass, ResourceConfig, Schema};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route association logs to the test output; `RUST_LOG=elif_resource=trace` shows resolutions
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct Fixture {
    pub schema: Arc<Schema>,
    pub remote: Arc<MemoryRemote>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(ResourceConfig::new())
    }

    pub fn with_config(config: ResourceConfig) -> Self {
        init_tracing();
        let schema = Schema::builder()
            .with_config(config)
            .build()
            .expect("valid config");

        Self {
            schema,
            remote: Arc::new(MemoryRemote::new()),
        }
    }

    /// Define a type backed by the shared in-memory remote
    pub fn define(&self, name: &str) -> Arc<ResourceClass> {
        self.schema
            .define(name)
            .remote(Arc::clone(&self.remote))
            .register()
            .expect("type registers")
    }

    pub fn seed(&self, class_name: &str, records: Vec<Value>) {
        for record in records {
            self.remote.insert(class_name, record).expect("seed record");
        }
    }
}
