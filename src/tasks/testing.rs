//! In-memory gateway fakes for exercising the scheduled tasks.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::io::{self, ErrorKind};
use std::sync::Mutex;

use super::{AttachmentTotals, MetadataGateway, ObjectGateway};
use crate::services::metadata_store::MetadataError;
use crate::services::object_store::{ObjectStoreError, StoredObject};

/// Scriptable metadata gateway.
#[derive(Default)]
pub struct FakeMetadata {
    pub referenced: Vec<String>,
    pub ping_error: Option<String>,
    pub keys_error: Option<String>,
    pub count_error: Option<String>,
    pub items: u64,
    pub created_in_window: u64,
    pub updated_in_window: u64,
    pub totals: AttachmentTotals,
}

fn query_error(message: &str) -> MetadataError {
    MetadataError::Query(sqlx::Error::Protocol(message.to_string()))
}

#[async_trait]
impl MetadataGateway for FakeMetadata {
    async fn ping(&self) -> Result<(), MetadataError> {
        match &self.ping_error {
            Some(message) => Err(MetadataError::Connection(message.clone())),
            None => Ok(()),
        }
    }

    async fn attachment_keys(&self) -> Result<HashSet<String>, MetadataError> {
        match &self.keys_error {
            Some(message) => Err(query_error(message)),
            None => Ok(self.referenced.iter().cloned().collect()),
        }
    }

    async fn count_items(&self) -> Result<u64, MetadataError> {
        match &self.count_error {
            Some(message) => Err(query_error(message)),
            None => Ok(self.items),
        }
    }

    async fn count_items_created_since(
        &self,
        _cutoff: DateTime<Utc>,
    ) -> Result<u64, MetadataError> {
        match &self.count_error {
            Some(message) => Err(query_error(message)),
            None => Ok(self.created_in_window),
        }
    }

    async fn count_items_updated_since(
        &self,
        _cutoff: DateTime<Utc>,
    ) -> Result<u64, MetadataError> {
        match &self.count_error {
            Some(message) => Err(query_error(message)),
            None => Ok(self.updated_in_window),
        }
    }

    async fn attachment_totals(&self) -> Result<AttachmentTotals, MetadataError> {
        match &self.count_error {
            Some(message) => Err(query_error(message)),
            None => Ok(self.totals),
        }
    }
}

/// Scriptable object gateway: deletes mutate the listing, per-key failures
/// and a blanket list failure can be injected, every call is recorded.
pub struct FakeObjects {
    pub objects: Mutex<Vec<StoredObject>>,
    pub list_error: Option<String>,
    pub fail_deletes: HashSet<String>,
    deleted: Mutex<Vec<String>>,
    list_calls: Mutex<usize>,
}

impl FakeObjects {
    pub fn new(objects: Vec<StoredObject>) -> Self {
        Self {
            objects: Mutex::new(objects),
            list_error: None,
            fail_deletes: HashSet::new(),
            deleted: Mutex::new(Vec::new()),
            list_calls: Mutex::new(0),
        }
    }

    pub fn object(key: &str, age_hours: i64, now: DateTime<Utc>) -> StoredObject {
        StoredObject {
            key: key.to_string(),
            size_bytes: 1,
            last_modified: now - Duration::hours(age_hours),
        }
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn list_count(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }
}

#[async_trait]
impl ObjectGateway for FakeObjects {
    async fn list_objects(
        &self,
        prefix: &str,
        max_keys: Option<usize>,
    ) -> Result<Vec<StoredObject>, ObjectStoreError> {
        *self.list_calls.lock().unwrap() += 1;
        if let Some(message) = &self.list_error {
            return Err(ObjectStoreError::Io(io::Error::new(
                ErrorKind::Other,
                message.clone(),
            )));
        }
        let mut listed: Vec<StoredObject> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.key.starts_with(prefix))
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        if let Some(max) = max_keys {
            listed.truncate(max);
        }
        Ok(listed)
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        if self.fail_deletes.contains(key) {
            return Err(ObjectStoreError::Io(io::Error::new(
                ErrorKind::Other,
                "simulated delete failure",
            )));
        }
        let mut objects = self.objects.lock().unwrap();
        let before = objects.len();
        objects.retain(|o| o.key != key);
        if objects.len() == before {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }
}
