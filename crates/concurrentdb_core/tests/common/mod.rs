#![allow(dead_code)]

use concurrentdb_core::{CrudEngine, Entity, PrimaryKey, StoreConfig};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockEntity {
    pub id: String,
    pub test_value: i64,
    #[serde(default)]
    pub label: Option<String>,
}

impl MockEntity {
    pub fn new(test_value: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            test_value,
            label: None,
        }
    }

    pub fn with_id(id: &str, test_value: i64) -> Self {
        Self {
            id: id.to_string(),
            test_value,
            label: None,
        }
    }

    pub fn labeled(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }
}

impl Entity for MockEntity {
    const ENTITY_TYPE: &'static str = "mock_entity";

    fn primary_key(&self) -> PrimaryKey {
        self.id.clone()
    }
}

/// Second entity type living in the same store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

impl Entity for Tag {
    const ENTITY_TYPE: &'static str = "tag";

    fn primary_key(&self) -> PrimaryKey {
        self.name.clone()
    }
}

pub fn engine() -> CrudEngine {
    CrudEngine::open(StoreConfig::ephemeral()).unwrap()
}

pub fn keys(entities: &[MockEntity]) -> Vec<PrimaryKey> {
    entities.iter().map(|entity| entity.id.clone()).collect()
}

pub fn values(entities: &[MockEntity]) -> Vec<i64> {
    entities.iter().map(|entity| entity.test_value).collect()
}
