use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::errors::LoadError;
use crate::loader::TableSink;
use crate::loader::frame::CsvFrame;

/// 📦 A database that fits in a BTreeMap. Tables in, tables out, no Postgres required.
///
/// Clone-able because tests hand one copy to the loader and keep the other to
/// look inside afterwards. Every clone shares the same tables.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTableSink {
    tables: Arc<Mutex<BTreeMap<String, CsvFrame>>>,
}

impl InMemoryTableSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🔍 The current contents of `table`, if it was ever loaded.
    pub async fn table(&self, table: &str) -> Option<CsvFrame> {
        self.tables.lock().await.get(table).cloned()
    }

    /// 📋 Every table name, sorted.
    pub async fn table_names(&self) -> Vec<String> {
        self.tables.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl TableSink for InMemoryTableSink {
    /// 🔄 Replace, never append: whatever was there before is gone.
    async fn replace_table(&mut self, table: &str, frame: &CsvFrame) -> Result<(), LoadError> {
        self.tables
            .lock()
            .await
            .insert(table.to_string(), frame.clone());
        Ok(())
    }
}
