//! The users service: plain CRUD forwarded to the store, no notifications.

use std::sync::Arc;

use tracing::warn;

use crate::store::{NewUser, UserPatch, UserStore};
use crate::transport::message::{ServerMessage, UserRequest};
use crate::transport::websocket::{Connection, Service};

#[derive(Debug)]
pub struct UsersService<S> {
    store: Arc<S>,
}

impl<S: UserStore> UsersService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: UserStore> Service for UsersService<S> {
    type Request = UserRequest;

    fn name(&self) -> &'static str {
        "users"
    }

    fn handle(&self, conn: &mut Connection, request: UserRequest) {
        let store = &self.store;
        let result = match request {
            UserRequest::Users => store.users().map(|users| ServerMessage::Users { users }),
            UserRequest::User { id } => store.user(&id).map(|user| ServerMessage::User { user }),
            UserRequest::CreateUser { name, email } => store
                .create_user(NewUser::new(name, email))
                .map(|user| ServerMessage::User { user }),
            UserRequest::UpdateUser { id, name, email } => store
                .update_user(&id, UserPatch { name, email })
                .map(|user| ServerMessage::User { user }),
            UserRequest::DeleteUser { id } => store
                .delete_user(&id)
                .map(|user| ServerMessage::User { user }),
        };

        let reply = result.unwrap_or_else(|e| {
            warn!("Request from {} failed: {e}", conn.id());
            ServerMessage::error(e)
        });
        conn.reply(&reply);
    }
}
