use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sled::{Db, Tree};
use tracing::debug;

use crate::config::StoreSettings;
use crate::store::models::{NewPost, NewUser, Post, PostPatch, User, UserPatch};
use crate::store::{PostStore, UserStore};
use crate::utils::error::StoreError;

const POSTS_TREE: &str = "posts";
const USERS_TREE: &str = "users";

/// Sled-backed store. Keys are ids from `Db::generate_id` in big-endian, so
/// iterating a tree yields rows in insertion order.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    posts: Tree,
    users: Tree,
    flush_on_write: bool,
}

impl SledStore {
    pub fn open(settings: &StoreSettings) -> Result<Self, StoreError> {
        let db = sled::open(&settings.path)?;
        Self::with_db(db, settings.flush_on_write)
    }

    /// A store that lives only as long as the process; used by tests.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(db, false)
    }

    fn with_db(db: Db, flush_on_write: bool) -> Result<Self, StoreError> {
        Ok(Self {
            posts: db.open_tree(POSTS_TREE)?,
            users: db.open_tree(USERS_TREE)?,
            db,
            flush_on_write,
        })
    }

    fn next_key(&self) -> Result<u64, StoreError> {
        Ok(self.db.generate_id()?)
    }

    fn put<T: Serialize>(&self, tree: &Tree, key: u64, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        tree.insert(key.to_be_bytes(), bytes)?;
        if self.flush_on_write {
            tree.flush()?;
        }
        Ok(())
    }

    fn get<T: DeserializeOwned>(
        &self,
        tree: &Tree,
        entity: &'static str,
        id: &str,
    ) -> Result<(u64, T), StoreError> {
        let key = parse_key(entity, id)?;
        match tree.get(key.to_be_bytes())? {
            Some(bytes) => Ok((key, serde_json::from_slice(&bytes)?)),
            None => Err(StoreError::not_found(entity, id)),
        }
    }

    fn scan<T: DeserializeOwned>(&self, tree: &Tree) -> Result<Vec<T>, StoreError> {
        tree.iter()
            .map(|entry| -> Result<T, StoreError> {
                let (_, bytes) = entry?;
                Ok(serde_json::from_slice(&bytes)?)
            })
            .collect()
    }

    fn remove<T: DeserializeOwned>(
        &self,
        tree: &Tree,
        entity: &'static str,
        id: &str,
    ) -> Result<T, StoreError> {
        let key = parse_key(entity, id)?;
        let removed = tree
            .remove(key.to_be_bytes())?
            .ok_or_else(|| StoreError::not_found(entity, id))?;
        if self.flush_on_write {
            tree.flush()?;
        }
        Ok(serde_json::from_slice(&removed)?)
    }
}

// Ids are decimal renderings of the sled key; anything else cannot exist.
fn parse_key(entity: &'static str, id: &str) -> Result<u64, StoreError> {
    id.trim()
        .parse::<u64>()
        .map_err(|_| StoreError::not_found(entity, id))
}

impl PostStore for SledStore {
    fn create_post(&self, draft: NewPost) -> Result<Post, StoreError> {
        draft.validate()?;
        let key = self.next_key()?;
        let post = Post {
            id: key.to_string(),
            title: draft.title,
            content: draft.content,
            owner_id: draft.owner_id,
            created_at: Utc::now(),
        };
        self.put(&self.posts, key, &post)?;
        debug!("stored post {}", post.id);
        Ok(post)
    }

    fn posts(&self) -> Result<Vec<Post>, StoreError> {
        self.scan(&self.posts)
    }

    fn post(&self, id: &str) -> Result<Post, StoreError> {
        self.get(&self.posts, "post", id).map(|(_, post)| post)
    }

    fn update_post(&self, id: &str, patch: PostPatch) -> Result<Post, StoreError> {
        patch.validate()?;
        let (key, mut post): (u64, Post) = self.get(&self.posts, "post", id)?;
        patch.apply(&mut post);
        self.put(&self.posts, key, &post)?;
        Ok(post)
    }

    fn delete_post(&self, id: &str) -> Result<Post, StoreError> {
        self.remove(&self.posts, "post", id)
    }
}

impl UserStore for SledStore {
    fn create_user(&self, draft: NewUser) -> Result<User, StoreError> {
        draft.validate()?;
        let key = self.next_key()?;
        let user = User {
            id: key.to_string(),
            name: draft.name,
            email: draft.email,
            created_at: Utc::now(),
        };
        self.put(&self.users, key, &user)?;
        debug!("stored user {}", user.id);
        Ok(user)
    }

    fn users(&self) -> Result<Vec<User>, StoreError> {
        self.scan(&self.users)
    }

    fn user(&self, id: &str) -> Result<User, StoreError> {
        self.get(&self.users, "user", id).map(|(_, user)| user)
    }

    fn update_user(&self, id: &str, patch: UserPatch) -> Result<User, StoreError> {
        patch.validate()?;
        let (key, mut user): (u64, User) = self.get(&self.users, "user", id)?;
        patch.apply(&mut user);
        self.put(&self.users, key, &user)?;
        Ok(user)
    }

    fn delete_user(&self, id: &str) -> Result<User, StoreError> {
        self.remove(&self.users, "user", id)
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .field("flush_on_write", &self.flush_on_write)
            .finish()
    }
}
