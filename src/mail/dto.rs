use serde::Deserialize;

/// Body for the account-approved notice; `email` is the user's address.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedMailRequest {
    pub email: String,
    pub full_name: String,
}

/// Body for the new-signup alert; `email` is the moderation inbox.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUserMailRequest {
    pub email: String,
    pub full_name: String,
    pub phone_number: String,
    pub college_id: String,
    pub department: String,
}

/// Body for the purchase alert; `email` is the buyer, the remaining fields
/// describe the seller being put in touch.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseMailRequest {
    pub email: String,
    pub full_name: String,
    pub seller_email: String,
    pub phone_number: String,
}
