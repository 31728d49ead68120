//! The `store` module is the data store the services read from and write to.
//!
//! `PostStore` and `UserStore` are the CRUD seams; the mutation gateway and
//! the transport only ever talk to these traits. `SledStore` implements both
//! on top of `sled`, one tree per entity, and commits every create before
//! returning so a subscriber woken by a notification can read the row back.

pub mod models;
pub mod sled_store;

pub use models::{NewPost, NewUser, Post, PostPatch, User, UserPatch};
pub use sled_store::SledStore;

use crate::utils::error::StoreError;

pub trait PostStore: Send + Sync + 'static {
    /// Validate and durably insert a post, returning it with its generated id.
    fn create_post(&self, draft: NewPost) -> Result<Post, StoreError>;

    /// All posts in insertion order.
    fn posts(&self) -> Result<Vec<Post>, StoreError>;

    fn post(&self, id: &str) -> Result<Post, StoreError>;

    fn update_post(&self, id: &str, patch: PostPatch) -> Result<Post, StoreError>;

    fn delete_post(&self, id: &str) -> Result<Post, StoreError>;
}

pub trait UserStore: Send + Sync + 'static {
    fn create_user(&self, draft: NewUser) -> Result<User, StoreError>;

    fn users(&self) -> Result<Vec<User>, StoreError>;

    fn user(&self, id: &str) -> Result<User, StoreError>;

    fn update_user(&self, id: &str, patch: UserPatch) -> Result<User, StoreError>;

    fn delete_user(&self, id: &str) -> Result<User, StoreError>;
}
