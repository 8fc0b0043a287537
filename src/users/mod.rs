//! User records and the batch profile resolver used by every listing.

pub mod profile;

pub use profile::ProfileService;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::app::{ConduitError, Result};
use crate::domain::{now_millis, User, UserUpdate};
use crate::store::{batch_get_chunked, keys, Condition, KvStore, Record, StoreError, WriteOp};

/// Body of a `usernames`/`emails` reservation.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reservation {
    user_id: Uuid,
}

/// Users resolved in one pass, keyed by id. Ids without a stored user are
/// simply absent.
#[derive(Debug, Default, Clone)]
pub struct UserMap {
    users: HashMap<Uuid, User>,
}

impl UserMap {
    pub fn get(&self, id: &Uuid) -> Option<&User> {
        self.users.get(id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn KvStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Registers a user, reserving username and email in the same
    /// transaction as the user record.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        bio: Option<String>,
        image: Option<String>,
    ) -> Result<User> {
        let username = require("username", username)?;
        let email = require("email", email)?;

        let mut user = User::new(username.clone(), email.clone());
        user.bio = bio;
        user.image = image;

        let reservation = Reservation { user_id: user.id };
        let ops = vec![
            WriteOp::put_if(
                Record::encode(keys::username(&username), &reservation)?,
                Condition::NotExists,
            ),
            WriteOp::put_if(
                Record::encode(keys::email(&User::email_key(&email)), &reservation)?,
                Condition::NotExists,
            ),
            WriteOp::put(Record::encode(keys::user(user.id), &user)?),
        ];

        match self.store.transact(ops).await {
            Ok(()) => {
                debug!("Created user {} ({})", user.username, user.id);
                Ok(user)
            }
            Err(StoreError::TransactionCanceled { index: 0 }) => {
                Err(ConduitError::UsernameTaken(username))
            }
            Err(StoreError::TransactionCanceled { index: 1 }) => {
                Err(ConduitError::EmailTaken(email))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Applies a partial update. Changing username or email moves the
    /// reservation atomically with the record.
    pub async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User> {
        let mut user = self.get_by_id(id).await?;
        let mut ops = Vec::new();
        let mut username_op = None;
        let mut email_op = None;
        let reservation = Reservation { user_id: id };

        if let Some(username) = update.username {
            let username = require("username", &username)?;
            if username != user.username {
                username_op = Some(ops.len());
                ops.push(WriteOp::put_if(
                    Record::encode(keys::username(&username), &reservation)?,
                    Condition::NotExists,
                ));
                ops.push(WriteOp::delete(keys::username(&user.username)));
                user.username = username;
            }
        }

        if let Some(email) = update.email {
            let email = require("email", &email)?;
            let old_key = User::email_key(&user.email);
            let new_key = User::email_key(&email);
            if new_key != old_key {
                email_op = Some(ops.len());
                ops.push(WriteOp::put_if(
                    Record::encode(keys::email(&new_key), &reservation)?,
                    Condition::NotExists,
                ));
                ops.push(WriteOp::delete(keys::email(&old_key)));
            }
            user.email = email;
        }

        if let Some(bio) = update.bio {
            user.bio = Some(bio).filter(|b| !b.is_empty());
        }
        if let Some(image) = update.image {
            user.image = Some(image).filter(|i| !i.is_empty());
        }
        user.updated_at = now_millis();
        ops.push(WriteOp::put_if(
            Record::encode(keys::user(id), &user)?,
            Condition::Exists,
        ));

        match self.store.transact(ops).await {
            Ok(()) => Ok(user),
            Err(StoreError::TransactionCanceled { index }) if Some(index) == username_op => {
                Err(ConduitError::UsernameTaken(user.username))
            }
            Err(StoreError::TransactionCanceled { index }) if Some(index) == email_op => {
                Err(ConduitError::EmailTaken(user.email))
            }
            Err(StoreError::TransactionCanceled { .. }) => {
                Err(ConduitError::UserNotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        match self.store.get(&keys::user(id)).await? {
            Some(record) => Ok(Some(record.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<User> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| ConduitError::UserNotFound(id.to_string()))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let Some(record) = self.store.get(&keys::username(username)).await? else {
            return Ok(None);
        };
        let reservation: Reservation = record.decode()?;
        self.find_by_id(reservation.user_id).await
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User> {
        self.find_by_username(username)
            .await?
            .ok_or_else(|| ConduitError::UserNotFound(username.to_string()))
    }

    /// Batch-loads every distinct id, chunked to the store's batch limit.
    pub async fn resolve<I>(&self, ids: I) -> Result<UserMap>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let distinct: HashSet<Uuid> = ids.into_iter().collect();
        if distinct.is_empty() {
            return Ok(UserMap::default());
        }

        let keys: Vec<_> = distinct.iter().map(|id| keys::user(*id)).collect();
        let records = batch_get_chunked(self.store.as_ref(), &keys).await?;

        let mut users = HashMap::with_capacity(records.len());
        for record in records {
            let user: User = record.decode()?;
            users.insert(user.id, user);
        }
        debug!("Resolved {}/{} users", users.len(), distinct.len());
        Ok(UserMap { users })
    }
}

fn require(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConduitError::InvalidInput(format!("{} can't be blank", field)));
    }
    Ok(value.to_string())
}
