use crate::errors::StoreError;
use crate::model::{Page, ProfileRecord, ProfileUpsert, UpsertResult};
use crate::storage::store::Store;

/// Read/write access to profiles, independent of the backing engine.
pub trait ProfileRepository: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<ProfileRecord>, StoreError>;

    fn find_by_profile_url(&self, url: &str) -> Result<Option<ProfileRecord>, StoreError>;

    fn upsert(&self, profile: &ProfileUpsert) -> Result<UpsertResult, StoreError>;

    fn list_by_points_desc(&self, page: Page) -> Result<Vec<ProfileRecord>, StoreError>;

    fn list_by_last_fetched_desc(&self, page: Page) -> Result<Vec<ProfileRecord>, StoreError>;

    /// Like `get`, but absence is an error.
    fn require(&self, id: &str) -> Result<ProfileRecord, StoreError> {
        self.get(id)?
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }
}

impl ProfileRepository for Store {
    fn get(&self, id: &str) -> Result<Option<ProfileRecord>, StoreError> {
        Store::get(self, id)
    }

    fn find_by_profile_url(&self, url: &str) -> Result<Option<ProfileRecord>, StoreError> {
        Store::find_by_profile_url(self, url)
    }

    fn upsert(&self, profile: &ProfileUpsert) -> Result<UpsertResult, StoreError> {
        Store::upsert(self, profile)
    }

    fn list_by_points_desc(&self, page: Page) -> Result<Vec<ProfileRecord>, StoreError> {
        Store::list_by_points_desc(self, page)
    }

    fn list_by_last_fetched_desc(&self, page: Page) -> Result<Vec<ProfileRecord>, StoreError> {
        Store::list_by_last_fetched_desc(self, page)
    }
}
