use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::domain::session::errors::StoreError;
use crate::domain::session::models::RefreshSecret;
use crate::domain::session::models::RefreshToken;
use crate::domain::session::ports::RefreshTokenStore;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::ports::UserDirectory;
use crate::user::errors::UserError;

/// Process-local user directory for development mode and tests.
///
/// Email uniqueness is enforced through a secondary index keyed by the
/// exact email string.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<UserId, User>,
    emails: DashMap<String, UserId>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn create(&self, user: User) -> Result<User, UserError> {
        match self.emails.entry(user.email.as_str().to_string()) {
            Entry::Occupied(_) => Err(UserError::EmailAlreadyExists(
                user.email.as_str().to_string(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(user.id);
                self.users.insert(user.id, user.clone());
                Ok(user)
            }
        }
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        Ok(self.users.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError> {
        let id = match self.emails.get(email.as_str()) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        self.find_by_id(&id).await
    }

    async fn update(&self, user: User) -> Result<User, UserError> {
        let previous_email = match self.users.get(&user.id) {
            Some(entry) => entry.value().email.clone(),
            None => return Err(UserError::NotFound(user.id.to_string())),
        };

        if previous_email != user.email {
            match self.emails.entry(user.email.as_str().to_string()) {
                Entry::Occupied(_) => {
                    return Err(UserError::EmailAlreadyExists(
                        user.email.as_str().to_string(),
                    ))
                }
                Entry::Vacant(slot) => {
                    slot.insert(user.id);
                }
            }
            self.emails.remove(previous_email.as_str());
        }

        self.users.insert(user.id, user.clone());
        Ok(user)
    }
}

/// Process-local refresh token store.
///
/// Each record sits behind its own async mutex, so contention is scoped to
/// a single secret. Map guards are never held across an await.
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: DashMap<String, Arc<Mutex<RefreshToken>>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, secret: &RefreshSecret) -> Option<Arc<Mutex<RefreshToken>>> {
        self.tokens
            .get(secret.as_str())
            .map(|entry| Arc::clone(entry.value()))
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn add(&self, token: RefreshToken) -> Result<(), StoreError> {
        match self.tokens.entry(token.secret.as_str().to_string()) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(token)));
                Ok(())
            }
        }
    }

    async fn find_live(
        &self,
        secret: &RefreshSecret,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken, StoreError> {
        let record = self.record(secret).ok_or(StoreError::NotFound)?;
        let token = record.lock().await;

        if token.is_live(now) {
            Ok(token.clone())
        } else {
            Err(StoreError::dead(&token, now))
        }
    }

    async fn rotate(
        &self,
        old: &RefreshSecret,
        successor: RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let record = self.record(old).ok_or(StoreError::NotFound)?;
        let mut token = record.lock().await;

        if !token.is_live(now) {
            return Err(StoreError::dead(&token, now));
        }

        // No await past this point: both writes land or neither does.
        let successor_secret = successor.secret.clone();
        match self.tokens.entry(successor_secret.as_str().to_string()) {
            Entry::Occupied(_) => return Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(successor)));
            }
        }
        token.rotate_to(&successor_secret, now);

        Ok(())
    }

    async fn revoke(
        &self,
        secret: &RefreshSecret,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let record = self.record(secret).ok_or(StoreError::NotFound)?;
        let mut token = record.lock().await;

        if !token.is_live(now) {
            return Ok(false);
        }

        token.revoke(now);
        Ok(true)
    }

    async fn revoke_all_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let records: Vec<_> = self
            .tokens
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut revoked = 0;
        for record in records {
            let mut token = record.lock().await;
            if token.user_id == *user_id && token.is_live(now) {
                token.revoke(now);
                revoked += 1;
            }
        }

        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use futures::future::join_all;

    use super::*;
    use crate::domain::session::models::TokenStatus;
    use crate::domain::user::models::PasswordHash;
    use crate::domain::user::models::PersonName;
    use crate::domain::user::models::Role;

    fn token(secret: &str, user_id: UserId, now: DateTime<Utc>) -> RefreshToken {
        RefreshToken::issue(
            RefreshSecret::new(secret.to_string()),
            user_id,
            now,
            Duration::days(30),
        )
    }

    fn secret(value: &str) -> RefreshSecret {
        RefreshSecret::new(value.to_string())
    }

    fn user(email: &str) -> User {
        User {
            id: UserId::new(),
            email: EmailAddress::new(email.to_string()).unwrap(),
            password_hash: PasswordHash::new("$argon2id$test_hash".to_string()),
            first_name: PersonName::new("A".to_string()).unwrap(),
            last_name: PersonName::new("B".to_string()).unwrap(),
            role: Role::Customer,
            created_at: Utc::now(),
            updated_at: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_add_and_find_live() {
        let store = InMemoryRefreshTokenStore::new();
        let now = Utc::now();
        let user_id = UserId::new();

        store.add(token("r1", user_id, now)).await.unwrap();

        let found = store.find_live(&secret("r1"), now).await.unwrap();
        assert_eq!(found.user_id, user_id);
        assert_eq!(
            store.find_live(&secret("missing"), now).await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_add_duplicate_secret_conflicts() {
        let store = InMemoryRefreshTokenStore::new();
        let now = Utc::now();

        store.add(token("r1", UserId::new(), now)).await.unwrap();
        assert_eq!(
            store.add(token("r1", UserId::new(), now)).await,
            Err(StoreError::Conflict)
        );
    }

    #[tokio::test]
    async fn test_find_live_reports_expired() {
        let store = InMemoryRefreshTokenStore::new();
        let now = Utc::now();

        store
            .add(token("r1", UserId::new(), now - Duration::days(31)))
            .await
            .unwrap();
        assert_eq!(
            store.find_live(&secret("r1"), now).await,
            Err(StoreError::Expired)
        );
    }

    #[tokio::test]
    async fn test_rotate_links_and_kills_old_token() {
        let store = InMemoryRefreshTokenStore::new();
        let now = Utc::now();
        let user_id = UserId::new();

        store.add(token("r1", user_id, now)).await.unwrap();
        store
            .rotate(&secret("r1"), token("r2", user_id, now), now)
            .await
            .unwrap();

        let old = store.record(&secret("r1")).unwrap();
        let old = old.lock().await;
        assert_eq!(old.status(now), TokenStatus::Rotated);
        assert_eq!(old.replaced_by, Some(secret("r2")));
        drop(old);

        assert!(store.find_live(&secret("r2"), now).await.is_ok());
        assert_eq!(
            store.find_live(&secret("r1"), now).await,
            Err(StoreError::AlreadyRevoked { user_id })
        );
        assert_eq!(
            store
                .rotate(&secret("r1"), token("r3", user_id, now), now)
                .await,
            Err(StoreError::AlreadyRevoked { user_id })
        );
        assert!(store.record(&secret("r3")).is_none());
    }

    #[tokio::test]
    async fn test_rotate_conflict_leaves_old_token_live() {
        let store = InMemoryRefreshTokenStore::new();
        let now = Utc::now();
        let user_id = UserId::new();

        store.add(token("r1", user_id, now)).await.unwrap();
        store.add(token("taken", user_id, now)).await.unwrap();

        assert_eq!(
            store
                .rotate(&secret("r1"), token("taken", user_id, now), now)
                .await,
            Err(StoreError::Conflict)
        );
        assert!(store.find_live(&secret("r1"), now).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = InMemoryRefreshTokenStore::new();
        let now = Utc::now();

        store.add(token("r1", UserId::new(), now)).await.unwrap();

        assert_eq!(store.revoke(&secret("r1"), now).await, Ok(true));
        assert_eq!(store.revoke(&secret("r1"), now).await, Ok(false));
        assert_eq!(
            store.revoke(&secret("missing"), now).await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_revoke_all_for_user_only_touches_live_tokens_of_user() {
        let store = InMemoryRefreshTokenStore::new();
        let now = Utc::now();
        let user_id = UserId::new();
        let other_user = UserId::new();

        store.add(token("a1", user_id, now)).await.unwrap();
        store.add(token("a2", user_id, now)).await.unwrap();
        store.add(token("a3", user_id, now)).await.unwrap();
        store.revoke(&secret("a3"), now).await.unwrap();
        store.add(token("b1", other_user, now)).await.unwrap();

        assert_eq!(store.revoke_all_for_user(&user_id, now).await, Ok(2));
        assert!(store.find_live(&secret("a1"), now).await.is_err());
        assert!(store.find_live(&secret("b1"), now).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rotations_have_one_winner() {
        let store = Arc::new(InMemoryRefreshTokenStore::new());
        let now = Utc::now();
        let user_id = UserId::new();

        store.add(token("shared", user_id, now)).await.unwrap();

        let attempts = (0..16).map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .rotate(
                        &secret("shared"),
                        token(&format!("next-{}", i), user_id, now),
                        now,
                    )
                    .await
            })
        });

        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| *r == Err(StoreError::AlreadyRevoked { user_id })));
        assert_eq!(store.tokens.len(), 2);
    }

    #[tokio::test]
    async fn test_user_directory_enforces_unique_email() {
        let directory = InMemoryUserDirectory::new();

        let first = user("a@x.com");
        let first_id = first.id;
        directory.create(first).await.unwrap();

        let result = directory.create(user("a@x.com")).await;
        assert!(matches!(result, Err(UserError::EmailAlreadyExists(_))));

        let found = directory
            .find_by_email(&EmailAddress::new("a@x.com".to_string()).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first_id);

        // Keyed exactly: a differently cased address is another account.
        assert!(directory.create(user("A@x.com")).await.is_ok());
    }

    #[tokio::test]
    async fn test_user_directory_update() {
        let directory = InMemoryUserDirectory::new();
        let mut stored = directory.create(user("a@x.com")).await.unwrap();

        stored.first_name = PersonName::new("Z".to_string()).unwrap();
        directory.update(stored.clone()).await.unwrap();

        let found = directory.find_by_id(&stored.id).await.unwrap().unwrap();
        assert_eq!(found.first_name.as_str(), "Z");

        let result = directory.update(user("b@x.com")).await;
        assert!(matches!(result, Err(UserError::NotFound(_))));
    }
}
