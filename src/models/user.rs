// Identity root. Users are created on first device registration or Google OAuth
// login and are never deleted by the system — only soft-disabled via their devices.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::schema::users;

const USER_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const USER_ID_SUFFIX_LEN: usize = 9;
const USER_ID_GENERATION_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub user_id: String,
    pub google_id: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub user_id: String,
    pub google_id: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub profile_picture_url: Option<String>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub profile_picture_url: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("User not found")]
    NotFound,

    #[error("Could not allocate a unique user id after {0} attempts")]
    IdGenerationExhausted(usize),
}

impl User {
    /// `user_` followed by 9 lowercase-alphanumeric characters, regenerated on
    /// collision up to `USER_ID_GENERATION_ATTEMPTS` times.
    pub fn generate_id() -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..USER_ID_SUFFIX_LEN)
            .map(|_| USER_ID_ALPHABET[rng.gen_range(0..USER_ID_ALPHABET.len())] as char)
            .collect();
        format!("user_{suffix}")
    }

    pub async fn find_by_id(conn: &mut AsyncPgConnection, id: &str) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        users
            .filter(user_id.eq(id))
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                other => UserError::Database(other),
            })
    }

    pub async fn find_by_google_id(
        conn: &mut AsyncPgConnection,
        gid: &str,
    ) -> Result<Option<Self>, UserError> {
        use crate::schema::users::dsl::*;

        users
            .filter(google_id.eq(gid))
            .first::<User>(conn)
            .await
            .optional()
            .map_err(UserError::Database)
    }

    /// Creates a user with a freshly generated, collision-free `user_id`.
    pub async fn create(
        conn: &mut AsyncPgConnection,
        google_id_val: Option<String>,
        email_val: Option<String>,
        display_name_val: Option<String>,
        profile_picture_url_val: Option<String>,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        for _ in 0..USER_ID_GENERATION_ATTEMPTS {
            let candidate = Self::generate_id();
            let new_user = NewUser {
                user_id: candidate.clone(),
                google_id: google_id_val.clone(),
                email: email_val.clone(),
                display_name: display_name_val.clone(),
                profile_picture_url: profile_picture_url_val.clone(),
            };

            let result = diesel::insert_into(users)
                .values(&new_user)
                .get_result::<User>(conn)
                .await;

            match result {
                Ok(user) => return Ok(user),
                Err(diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                )) => continue,
                Err(other) => return Err(UserError::Database(other)),
            }
        }

        Err(UserError::IdGenerationExhausted(USER_ID_GENERATION_ATTEMPTS))
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        id: &str,
        changes: UserUpdate,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        diesel::update(users.filter(user_id.eq(id)))
            .set(changes)
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                other => UserError::Database(other),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_have_expected_shape() {
        let id = User::generate_id();
        assert!(id.starts_with("user_"));
        assert_eq!(id.len(), "user_".len() + USER_ID_SUFFIX_LEN);
        assert!(id
            .strip_prefix("user_")
            .unwrap()
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
    }

    #[test]
    fn generated_ids_are_not_trivially_repeated() {
        let a = User::generate_id();
        let b = User::generate_id();
        assert_ne!(a, b);
    }
}
