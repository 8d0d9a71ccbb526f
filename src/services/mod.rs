//! Service layer: CRUD plumbing plus the two store gateways the scheduled
//! tasks consume.

pub mod item_service;
pub mod metadata_store;
pub mod object_store;

use item_service::ItemService;
use metadata_store::MetadataStore;
use object_store::FsObjectStore;

/// Long-lived handles constructed once in `main` and threaded into every
/// handler. All members are cheap to clone and correct on a cold handle.
#[derive(Clone)]
pub struct AppState {
    pub items: ItemService,
    pub metadata: MetadataStore,
    pub objects: FsObjectStore,
}
