use anyhow::Context;
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::state::AppState;

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Upload image files for a product-to-be and return their storage keys in
/// order. Runs before the product row exists; any failure aborts creation.
pub async fn upload_product_images(
    st: &AppState,
    seller_id: Uuid,
    product_id: Uuid,
    items: Vec<UploadItem>,
) -> anyhow::Result<Vec<String>> {
    let mut keys = Vec::with_capacity(items.len());
    for item in items {
        let key = object_key(seller_id, product_id, &item.content_type);
        st.storage
            .put_object(&key, item.body, &item.content_type)
            .await
            .with_context(|| format!("put_object {}", key))?;
        keys.push(key);
    }
    Ok(keys)
}

/// Best-effort cleanup when the product row fails to persist after its
/// images were already uploaded.
pub async fn remove_uploaded(st: &AppState, keys: &[String]) {
    for key in keys {
        if let Err(e) = st.storage.delete_object(key).await {
            warn!(error = %e, key = %key, "orphaned upload not removed");
        }
    }
}

pub fn object_key(seller_id: Uuid, product_id: Uuid, content_type: &str) -> String {
    let ext = ext_from_mime(content_type).unwrap_or("bin");
    format!(
        "products/{}/{}-{}.{}",
        seller_id,
        product_id,
        Uuid::new_v4(),
        ext
    )
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}
