use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// One peer review embedded in a user record. Append-only; array order is
/// insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub rating: i32,
    pub comment: String,
    pub author: Uuid,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub full_name: String,
    pub department: String,
    pub phone_number: String,
    pub college_id: String,
    pub is_approved: bool,
    pub is_seller: bool,
    pub is_disabled: bool,
    pub is_admin: bool,
    pub reviews: Json<Vec<Review>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields for creating a user. Password is already hashed by the caller.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub department: String,
    pub phone_number: String,
    pub college_id: String,
}

/// Partial update: set listed fields, leave others untouched.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub phone_number: Option<String>,
    pub college_id: Option<String>,
}

const USER_COLUMNS: &str = "id, username, email, password_hash, full_name, department, \
     phone_number, college_id, is_approved, is_seller, is_disabled, is_admin, reviews, created_at";

impl User {
    pub async fn create(db: &PgPool, new: &NewUser) -> sqlx::Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash, full_name, department, phone_number, college_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&new.username)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(&new.full_name)
            .bind(&new.department)
            .bind(&new.phone_number)
            .bind(&new.college_id)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn username_or_email_taken(
        db: &PgPool,
        username: &str,
        email: &str,
    ) -> sqlx::Result<bool> {
        let (taken,): (bool,) = sqlx::query_as(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR email = $2)"#,
        )
        .bind(username)
        .bind(email)
        .fetch_one(db)
        .await?;
        Ok(taken)
    }

    pub async fn list_all(db: &PgPool) -> sqlx::Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        sqlx::query_as::<_, User>(&sql).fetch_all(db).await
    }

    /// Merge-style update: unset fields keep their current value.
    pub async fn update(db: &PgPool, id: Uuid, changes: &UserChanges) -> sqlx::Result<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users SET
                username = COALESCE($2, username),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                full_name = COALESCE($5, full_name),
                department = COALESCE($6, department),
                phone_number = COALESCE($7, phone_number),
                college_id = COALESCE($8, college_id)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&changes.username)
            .bind(&changes.email)
            .bind(&changes.password_hash)
            .bind(&changes.full_name)
            .bind(&changes.department)
            .bind(&changes.phone_number)
            .bind(&changes.college_id)
            .fetch_optional(db)
            .await
    }

    // Flag toggles flip the current value in a single statement, so
    // concurrent callers cannot lose each other's update.

    pub async fn toggle_approved(db: &PgPool, id: Uuid) -> sqlx::Result<Option<(Uuid, bool)>> {
        sqlx::query_as::<_, (Uuid, bool)>(
            r#"UPDATE users SET is_approved = NOT is_approved WHERE id = $1 RETURNING id, is_approved"#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn toggle_seller(db: &PgPool, id: Uuid) -> sqlx::Result<Option<(Uuid, bool)>> {
        sqlx::query_as::<_, (Uuid, bool)>(
            r#"UPDATE users SET is_seller = NOT is_seller WHERE id = $1 RETURNING id, is_seller"#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn toggle_disabled(db: &PgPool, id: Uuid) -> sqlx::Result<Option<(Uuid, bool)>> {
        sqlx::query_as::<_, (Uuid, bool)>(
            r#"UPDATE users SET is_disabled = NOT is_disabled WHERE id = $1 RETURNING id, is_disabled"#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Append one review to the user's reviews array in a single statement.
    pub async fn append_review(
        db: &PgPool,
        id: Uuid,
        review: &Review,
    ) -> sqlx::Result<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users SET reviews = reviews || jsonb_build_array($2::jsonb)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(Json(review))
            .fetch_optional(db)
            .await
    }

    /// Full names for a set of user IDs, used to resolve review authors.
    pub async fn full_names(db: &PgPool, ids: &[Uuid]) -> sqlx::Result<HashMap<Uuid, String>> {
        let rows: Vec<(Uuid, String)> =
            sqlx::query_as(r#"SELECT id, full_name FROM users WHERE id = ANY($1)"#)
                .bind(ids)
                .fetch_all(db)
                .await?;
        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn new_user(tag: &str) -> NewUser {
        NewUser {
            username: format!("user-{tag}"),
            email: format!("{tag}@college.edu"),
            password_hash: "$argon2id$v=19$irrelevant".into(),
            full_name: format!("User {tag}"),
            department: "CSE".into(),
            phone_number: "123".into(),
            college_id: "2020CSE001".into(),
        }
    }

    #[sqlx::test]
    async fn toggling_a_flag_twice_restores_it(pool: PgPool) {
        let user = User::create(&pool, &new_user("toggle")).await.unwrap();
        assert!(!user.is_approved);

        let (id, flipped) = User::toggle_approved(&pool, user.id).await.unwrap().unwrap();
        assert_eq!(id, user.id);
        assert!(flipped);

        let (_, restored) = User::toggle_approved(&pool, user.id).await.unwrap().unwrap();
        assert!(!restored);

        let fresh = User::find_by_id(&pool, user.id).await.unwrap().unwrap();
        assert!(!fresh.is_approved);
    }

    #[sqlx::test]
    async fn each_flag_toggles_independently(pool: PgPool) {
        let user = User::create(&pool, &new_user("flags")).await.unwrap();

        let (_, is_seller) = User::toggle_seller(&pool, user.id).await.unwrap().unwrap();
        let (_, is_disabled) = User::toggle_disabled(&pool, user.id).await.unwrap().unwrap();
        assert!(is_seller);
        assert!(is_disabled);

        let fresh = User::find_by_id(&pool, user.id).await.unwrap().unwrap();
        assert!(!fresh.is_approved);
        assert!(fresh.is_seller);
        assert!(fresh.is_disabled);
    }

    #[sqlx::test]
    async fn toggling_an_unknown_user_returns_none(pool: PgPool) {
        assert!(User::toggle_approved(&pool, Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }

    #[sqlx::test]
    async fn duplicate_email_violates_unique_constraint(pool: PgPool) {
        User::create(&pool, &new_user("dup")).await.unwrap();

        let mut second = new_user("dup");
        second.username = "user-dup-2".into();
        let err = User::create(&pool, &second).await.unwrap_err();
        assert!(err
            .as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false));
    }

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "kabir".into(),
            email: "kabir@college.edu".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            full_name: "Kabir Singh".into(),
            department: "ECE".into(),
            phone_number: "9999999999".into(),
            college_id: "2020ECE042".into(),
            is_approved: false,
            is_seller: false,
            is_disabled: false,
            is_admin: false,
            reviews: Json(vec![Review {
                rating: 5,
                comment: "great seller".into(),
                author: Uuid::new_v4(),
            }]),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn serialized_user_never_contains_password() {
        let json = serde_json::to_string(&sample_user()).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("argon2"));
    }

    #[test]
    fn serialized_user_uses_camel_case_contract() {
        let value = serde_json::to_value(sample_user()).unwrap();
        for key in [
            "fullName",
            "phoneNumber",
            "collegeId",
            "isApproved",
            "isSeller",
            "isDisabled",
            "isAdmin",
            "reviews",
            "createdAt",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert!(value.get("passwordHash").is_none());
    }
}
