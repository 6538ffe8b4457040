//! Counter demo: a store generated by the build script

#[flowstore::flow_store]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Counter {
    pub count: i64,
    pub label: String,
}

flowstore::include_store!(counter_store, "counter_store.rs");
pub use counter_store::CounterStore;

impl CounterStore {
    pub async fn increment(&self) {
        self.count(|count| count + 1).await;
    }

    pub async fn rename(&self, label: &str) {
        let label = label.to_string();
        self.label(move |_| label).await;
    }
}
