use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo::Review;

/// Product record in the database. `images` holds ordered storage keys for
/// uploaded files, or caller-supplied references.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    // The wire contract names the seller reference `seller`.
    #[serde(rename = "seller")]
    pub seller_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: Option<String>,
    pub images: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Seller view attached to a single-product fetch: exactly the fields a
/// buyer needs, never the password hash.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SellerProjection {
    pub full_name: String,
    pub reviews: Json<Vec<Review>>,
    pub email: String,
    pub phone_number: String,
}

#[derive(Debug)]
pub struct NewProduct {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: Option<String>,
    pub images: Vec<String>,
}

const PRODUCT_COLUMNS: &str =
    "id, seller_id, name, description, price, category, images, created_at";

impl Product {
    pub async fn insert(db: &PgPool, new: &NewProduct) -> sqlx::Result<Product> {
        let sql = format!(
            r#"
            INSERT INTO products (id, seller_id, name, description, price, category, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Product>(&sql)
            .bind(new.id)
            .bind(new.seller_id)
            .bind(&new.name)
            .bind(&new.description)
            .bind(new.price)
            .bind(&new.category)
            .bind(&new.images)
            .fetch_one(db)
            .await
    }

    /// Listing is always newest-first.
    pub async fn list(db: &PgPool) -> sqlx::Result<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC");
        sqlx::query_as::<_, Product>(&sql).fetch_all(db).await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn seller_projection(
        db: &PgPool,
        seller_id: Uuid,
    ) -> sqlx::Result<Option<SellerProjection>> {
        sqlx::query_as::<_, SellerProjection>(
            r#"SELECT full_name, reviews, email, phone_number FROM users WHERE id = $1"#,
        )
        .bind(seller_id)
        .fetch_optional(db)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo::{NewUser, User};
    use sqlx::PgPool;

    #[test]
    fn serialized_product_names_the_seller_reference_seller() {
        let product = Product {
            id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            name: "Calculus textbook".into(),
            description: None,
            price: 20.0,
            category: Some("books".into()),
            images: vec!["products/a/b.jpg".into()],
            created_at: OffsetDateTime::now_utc(),
        };
        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["seller"], serde_json::json!(product.seller_id));
        assert!(value.get("sellerId").is_none());
    }

    fn sample_seller(tag: &str) -> NewUser {
        NewUser {
            username: format!("seller-{tag}"),
            email: format!("seller-{tag}@college.edu"),
            password_hash: "$argon2id$v=19$irrelevant".into(),
            full_name: "Seller Person".into(),
            department: "ME".into(),
            phone_number: "555".into(),
            college_id: "2021ME001".into(),
        }
    }

    #[sqlx::test]
    async fn listing_is_newest_first(pool: PgPool) {
        let seller = User::create(&pool, &sample_seller("list")).await.unwrap();

        let mut ids = Vec::new();
        for (i, name) in ["first", "second", "third"].iter().enumerate() {
            let product = Product::insert(
                &pool,
                &NewProduct {
                    id: Uuid::new_v4(),
                    seller_id: seller.id,
                    name: (*name).into(),
                    description: None,
                    price: 1.0,
                    category: None,
                    images: vec![],
                },
            )
            .await
            .unwrap();
            // Pin distinct creation times t1 < t2 < t3.
            sqlx::query("UPDATE products SET created_at = to_timestamp($2) WHERE id = $1")
                .bind(product.id)
                .bind((i + 1) as f64)
                .execute(&pool)
                .await
                .unwrap();
            ids.push(product.id);
        }

        let listed: Vec<Uuid> = Product::list(&pool).await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(listed, vec![ids[2], ids[1], ids[0]]);
    }

    #[sqlx::test]
    async fn find_by_id_misses_unknown_products(pool: PgPool) {
        assert!(Product::find_by_id(&pool, Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn seller_projection_exposes_exactly_four_fields() {
        let projection = SellerProjection {
            full_name: "Kabir Singh".into(),
            reviews: Json(vec![]),
            email: "kabir@college.edu".into(),
            phone_number: "9999999999".into(),
        };
        let value = serde_json::to_value(&projection).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        for key in ["fullName", "reviews", "email", "phoneNumber"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert!(!obj.contains_key("password"));
        assert!(!obj.contains_key("passwordHash"));
    }
}
