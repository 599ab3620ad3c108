use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::{Review, User};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub department: String,
    pub phone_number: String,
    pub college_id: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Partial user update; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub phone_number: Option<String>,
    pub college_id: Option<String>,
    pub password: Option<String>,
}

/// Returned after register or login: the user record flattened alongside a
/// fresh bearer token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: User,
    pub access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedToggle {
    pub id: Uuid,
    pub is_approved: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerToggle {
    pub id: Uuid,
    pub is_seller: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisabledToggle {
    pub id: Uuid,
    pub is_disabled: bool,
}

/// Request body for appending a review to a user.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i32,
    pub comment: String,
    pub author: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAuthor {
    pub id: Uuid,
    pub full_name: String,
}

/// A review with its author reference resolved to a name.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub rating: i32,
    pub comment: String,
    pub author: ReviewAuthor,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsResponse {
    pub id: Uuid,
    pub reviews: Vec<ReviewView>,
}

/// Resolve review authors to names, preserving append order. Authors whose
/// record has vanished keep an empty name rather than dropping the review.
pub fn resolve_authors(reviews: Vec<Review>, names: &HashMap<Uuid, String>) -> Vec<ReviewView> {
    reviews
        .into_iter()
        .map(|r| ReviewView {
            rating: r.rating,
            comment: r.comment,
            author: ReviewAuthor {
                id: r.author,
                full_name: names.get(&r.author).cloned().unwrap_or_default(),
            },
        })
        .collect()
}
