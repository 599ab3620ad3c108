use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        AuthUser,
    },
    error::ApiError,
    state::AppState,
};

use super::dto::{
    resolve_authors, ApprovedToggle, AuthResponse, DisabledToggle, LoginRequest, RegisterRequest,
    ReviewRequest, ReviewsResponse, SellerToggle, UpdateUserRequest,
};
use super::repo::{NewUser, Review, User, UserChanges};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/:id", put(update_user))
        .route("/users/find", get(list_users))
        .route("/users/find/:id", get(get_user))
        .route("/users/approve/:id", put(toggle_approved))
        .route("/users/sell/:id", put(toggle_seller))
        .route("/users/disable/:id", put(toggle_disabled))
        .route("/users/:id/review", post(add_review))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("invalid email".into()));
    }
    if payload.username.trim().is_empty() {
        return Err(ApiError::Validation("username is required".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("password too short".into()));
    }

    // Pre-check duplicates; the unique constraints still backstop the race
    // window via the Conflict mapping on insert.
    if User::username_or_email_taken(&state.db, &payload.username, &payload.email).await? {
        warn!(email = %payload.email, username = %payload.username, "duplicate registration");
        return Err(ApiError::Conflict(
            "username or email already registered".into(),
        ));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        &NewUser {
            username: payload.username,
            email: payload.email,
            password_hash,
            full_name: payload.full_name,
            department: payload.department,
            phone_number: payload.phone_number,
            college_id: payload.college_id,
        },
    )
    .await?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse { user, access_token }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    // Unknown email and bad password are deliberately indistinguishable.
    let invalid = || ApiError::Unauthorized("username or password is incorrect".into());

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(invalid());
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse { user, access_token }))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    // A new password is re-hashed before it is persisted.
    let password_hash = match payload.password.as_deref() {
        Some(plain) if plain.len() < 8 => {
            return Err(ApiError::Validation("password too short".into()))
        }
        Some(plain) => Some(hash_password(plain)?),
        None => None,
    };

    if let Some(email) = payload.email.as_deref() {
        if !is_valid_email(email) {
            return Err(ApiError::Validation("invalid email".into()));
        }
    }

    let changes = UserChanges {
        username: payload.username,
        email: payload.email.map(|e| e.trim().to_lowercase()),
        password_hash,
        full_name: payload.full_name,
        department: payload.department,
        phone_number: payload.phone_number,
        college_id: payload.college_id,
    };

    let user = User::update(&state.db, id, &changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    info!(user_id = %user.id, "user updated");
    Ok(Json(user))
}

/// Unauthenticated list of every user; a known overbroad-access point of the
/// existing contract, kept as-is pending policy review.
#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let users = User::list_all(&state.db).await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    // Owner or admin only.
    if requester != id {
        let caller = User::find_by_id(&state.db, requester)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("unknown requester".into()))?;
        if !caller.is_admin {
            warn!(requester = %requester, target = %id, "non-owner non-admin lookup rejected");
            return Err(ApiError::Unauthorized("not allowed to view this user".into()));
        }
    }

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn toggle_approved(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApprovedToggle>, ApiError> {
    let (id, is_approved) = User::toggle_approved(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    info!(user_id = %id, is_approved, "approval flag toggled");
    Ok(Json(ApprovedToggle { id, is_approved }))
}

#[instrument(skip(state))]
pub async fn toggle_seller(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SellerToggle>, ApiError> {
    let (id, is_seller) = User::toggle_seller(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    info!(user_id = %id, is_seller, "seller flag toggled");
    Ok(Json(SellerToggle { id, is_seller }))
}

#[instrument(skip(state))]
pub async fn toggle_disabled(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DisabledToggle>, ApiError> {
    let (id, is_disabled) = User::toggle_disabled(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    info!(user_id = %id, is_disabled, "disabled flag toggled");
    Ok(Json(DisabledToggle { id, is_disabled }))
}

#[instrument(skip(state, payload))]
pub async fn add_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<ReviewsResponse>), ApiError> {
    let review = Review {
        rating: payload.rating,
        comment: payload.comment,
        author: payload.author,
    };

    let user = User::append_review(&state.db, id, &review)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    let mut author_ids: Vec<Uuid> = user.reviews.0.iter().map(|r| r.author).collect();
    author_ids.sort_unstable();
    author_ids.dedup();
    let names = User::full_names(&state.db, &author_ids).await?;

    info!(user_id = %user.id, reviews = user.reviews.0.len(), "review appended");
    Ok((
        StatusCode::CREATED,
        Json(ReviewsResponse {
            id: user.id,
            reviews: resolve_authors(user.reviews.0, &names),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@campus.edu"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("spaces in@x.com"));
    }

    fn registration(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            full_name: format!("{username} Test"),
            department: "CSE".into(),
            phone_number: "123".into(),
            college_id: "2020CSE001".into(),
            password: "super-secret-pw".into(),
        }
    }

    #[sqlx::test]
    async fn second_registration_with_same_email_conflicts(pool: PgPool) {
        let state = AppState::fake_with_db(pool);

        register(
            State(state.clone()),
            Json(registration("alice", "alice@college.edu")),
        )
        .await
        .unwrap();

        let err = register(
            State(state),
            Json(registration("someone-else", "alice@college.edu")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[sqlx::test]
    async fn registration_response_carries_a_valid_token(pool: PgPool) {
        let state = AppState::fake_with_db(pool);

        let (status, Json(auth)) = register(
            State(state.clone()),
            Json(registration("bob", "bob@college.edu")),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let keys = JwtKeys::from_ref(&state);
        let claims = keys.verify(&auth.access_token).expect("fresh token verifies");
        assert_eq!(claims.sub, auth.user.id);
    }

    #[sqlx::test]
    async fn login_rejects_unknown_email_and_bad_password_alike(pool: PgPool) {
        let state = AppState::fake_with_db(pool);

        register(
            State(state.clone()),
            Json(registration("carol", "carol@college.edu")),
        )
        .await
        .unwrap();

        let unknown = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "nobody@college.edu".into(),
                password: "super-secret-pw".into(),
            }),
        )
        .await
        .unwrap_err();
        let wrong = login(
            State(state),
            Json(LoginRequest {
                email: "carol@college.edu".into(),
                password: "not-the-password".into(),
            }),
        )
        .await
        .unwrap_err();

        match (&unknown, &wrong) {
            (ApiError::Unauthorized(a), ApiError::Unauthorized(b)) => assert_eq!(a, b),
            other => panic!("expected matching Unauthorized errors, got {other:?}"),
        }
    }

    #[sqlx::test]
    async fn updated_password_verifies_only_against_the_new_plaintext(pool: PgPool) {
        let state = AppState::fake_with_db(pool);

        let (_, Json(auth)) = register(
            State(state.clone()),
            Json(registration("dave", "dave@college.edu")),
        )
        .await
        .unwrap();

        update_user(
            State(state.clone()),
            Path(auth.user.id),
            Json(UpdateUserRequest {
                password: Some("brand-new-pw".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        let stored = User::find_by_id(&state.db, auth.user.id)
            .await
            .unwrap()
            .unwrap();
        assert!(verify_password("brand-new-pw", &stored.password_hash).unwrap());
        assert!(!verify_password("super-secret-pw", &stored.password_hash).unwrap());
    }

    #[sqlx::test]
    async fn update_merges_only_the_listed_fields(pool: PgPool) {
        let state = AppState::fake_with_db(pool);

        let (_, Json(auth)) = register(
            State(state.clone()),
            Json(registration("erin", "erin@college.edu")),
        )
        .await
        .unwrap();

        let Json(updated) = update_user(
            State(state),
            Path(auth.user.id),
            Json(UpdateUserRequest {
                department: Some("EEE".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        assert_eq!(updated.department, "EEE");
        assert_eq!(updated.username, "erin");
        assert_eq!(updated.email, "erin@college.edu");
    }

    #[sqlx::test]
    async fn appended_reviews_keep_order_and_resolve_authors(pool: PgPool) {
        let state = AppState::fake_with_db(pool);

        let (_, Json(target)) = register(
            State(state.clone()),
            Json(registration("frank", "frank@college.edu")),
        )
        .await
        .unwrap();
        let (_, Json(author)) = register(
            State(state.clone()),
            Json(registration("grace", "grace@college.edu")),
        )
        .await
        .unwrap();

        add_review(
            State(state.clone()),
            Path(target.user.id),
            Json(ReviewRequest {
                rating: 4,
                comment: "fast replies".into(),
                author: author.user.id,
            }),
        )
        .await
        .unwrap();

        let (status, Json(response)) = add_review(
            State(state.clone()),
            Path(target.user.id),
            Json(ReviewRequest {
                rating: 5,
                comment: "fair price".into(),
                author: author.user.id,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response.reviews.len(), 2);
        assert_eq!(response.reviews[0].comment, "fast replies");
        assert_eq!(response.reviews[1].comment, "fair price");
        assert_eq!(response.reviews[1].author.full_name, "grace Test");

        // The append is persisted on the record itself.
        let stored = User::find_by_id(&state.db, target.user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.reviews.0.len(), 2);
        assert_eq!(stored.reviews.0[1].comment, "fair price");
    }
}
