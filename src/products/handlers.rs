use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

use super::dto::{CreateProductRequest, ProductDetails};
use super::repo::{NewProduct, Product};
use super::services::{remove_uploaded, upload_product_images, UploadItem};

const MAX_IMAGES: usize = 10;

pub fn router() -> Router<AppState> {
    Router::new().merge(read_routes()).merge(write_routes())
}

fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
}

fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

/// POST /products accepts either multipart form data (image files plus text
/// fields) or a plain JSON body carrying an `images` list.
#[instrument(skip(state, req))]
pub async fn create_product(
    State(state): State<AppState>,
    req: Request,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        let mp = Multipart::from_request(req, &())
            .await
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        create_from_multipart(state, mp).await
    } else {
        let Json(body) = Json::<CreateProductRequest>::from_request(req, &())
            .await
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        create_from_json(state, body).await
    }
}

async fn create_from_json(
    state: AppState,
    body: CreateProductRequest,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }
    finish_create(
        state,
        body.seller,
        body.name,
        body.description,
        body.price,
        body.category,
        Vec::new(),
        body.images,
    )
    .await
}

async fn create_from_multipart(
    state: AppState,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let mut name: Option<String> = None;
    let mut description: Option<String> = None;
    let mut category: Option<String> = None;
    let mut price: Option<f64> = None;
    let mut seller: Option<Uuid> = None;
    let mut supplied: Vec<String> = Vec::new();
    let mut files: Vec<UploadItem> = Vec::new();

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "images" | "images[]" => {
                if field.file_name().is_some() {
                    let content_type = field
                        .content_type()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "application/octet-stream".into());
                    let body = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::Validation(e.to_string()))?;
                    files.push(UploadItem { body, content_type });
                } else {
                    supplied.push(field_text(field).await?);
                }
            }
            "name" => name = Some(field_text(field).await?),
            "description" => description = Some(field_text(field).await?),
            "category" => category = Some(field_text(field).await?),
            "price" => {
                price = Some(
                    field_text(field)
                        .await?
                        .parse::<f64>()
                        .map_err(|_| ApiError::Validation("price must be a number".into()))?,
                )
            }
            "seller" => {
                seller = Some(
                    field_text(field)
                        .await?
                        .parse::<Uuid>()
                        .map_err(|_| ApiError::Validation("seller must be a user id".into()))?,
                )
            }
            other => {
                warn!(field = %other, "unknown multipart field ignored");
            }
        }
    }

    if files.len() > MAX_IMAGES {
        return Err(ApiError::Validation(format!(
            "a maximum of {MAX_IMAGES} images is allowed"
        )));
    }
    let name = name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("name is required".into()))?;
    let seller = seller.ok_or_else(|| ApiError::Validation("seller is required".into()))?;
    let price = price.ok_or_else(|| ApiError::Validation("price is required".into()))?;

    finish_create(
        state, seller, name, description, price, category, files, supplied,
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn finish_create(
    state: AppState,
    seller_id: Uuid,
    name: String,
    description: Option<String>,
    price: f64,
    category: Option<String>,
    files: Vec<UploadItem>,
    supplied: Vec<String>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product_id = Uuid::new_v4();
    let uploaded = !files.is_empty();

    // Uploaded files win over any caller-supplied list, and are durably
    // stored before the row referencing them is inserted.
    let images = if uploaded {
        upload_product_images(&state, seller_id, product_id, files).await?
    } else {
        supplied
    };

    let new = NewProduct {
        id: product_id,
        seller_id,
        name,
        description,
        price,
        category,
        images,
    };

    match Product::insert(&state.db, &new).await {
        Ok(product) => {
            info!(product_id = %product.id, seller_id = %product.seller_id, "product created");
            Ok((StatusCode::CREATED, Json(product)))
        }
        Err(e) => {
            if uploaded {
                remove_uploaded(&state, &new.images).await;
            }
            Err(map_insert_error(e))
        }
    }
}

fn map_insert_error(e: sqlx::Error) -> ApiError {
    if let Some(db) = e.as_database_error() {
        if db.is_foreign_key_violation() {
            return ApiError::Validation("unknown seller".into());
        }
        if db.is_unique_violation() || db.is_check_violation() {
            return ApiError::Validation(format!("product rejected: {}", db.message()));
        }
    }
    ApiError::Upstream(e.into())
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))
}

#[instrument(skip(state))]
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    let products = Product::list(&state.db).await?;
    Ok(Json(products))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductDetails>, ApiError> {
    let product = Product::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("product not found".into()))?;

    let seller = Product::seller_projection(&state.db, product.seller_id)
        .await?
        .ok_or_else(|| ApiError::Upstream(anyhow::anyhow!("seller record missing")))?;

    Ok(Json(ProductDetails {
        id: product.id,
        name: product.name,
        description: product.description,
        price: product.price,
        category: product.category,
        images: product.images,
        created_at: product.created_at,
        seller,
    }))
}
