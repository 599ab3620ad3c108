pub const APPROVAL_SUBJECT: &str = "Account Approved for Campus Trade";
pub const SIGNUP_SUBJECT: &str = "New user sign up";
pub const PURCHASE_SUBJECT: &str = "New product purchase";

/// Sent to a user once a moderator approves their account.
pub fn approval_notice(full_name: &str) -> String {
    format!(
        "<p>Dear {full_name},</p>\
         <p>Your account verification has been approved. You are now a verified \
         member of Campus Trade.</p>\
         <p>Explore the catalog, browse listings from fellow students, and find \
         the items you need.</p>\
         <p>Thank you for choosing Campus Trade.</p>\
         <p>Best Regards,<br />Campus Trade</p>"
    )
}

/// Sent to the moderation inbox when someone registers.
pub fn signup_alert(
    full_name: &str,
    email: &str,
    phone_number: &str,
    college_id: &str,
    department: &str,
) -> String {
    format!(
        "<p>There has been a new user sign up. Here are the details:</p>\
         <p>Full Name: {full_name} <br />\
         Email: {email} <br />\
         Phone Number: {phone_number} <br />\
         College Id: {college_id} <br />\
         Department: {department}</p>"
    )
}

/// Sent to a buyer with the seller's contact details after a purchase.
pub fn purchase_alert(full_name: &str, seller_email: &str, phone_number: &str) -> String {
    format!(
        "<p>Here are the details of the seller:</p>\
         <p>Full Name: {full_name} <br />\
         Email: {seller_email} <br />\
         Phone Number: {phone_number}</p>"
    )
}
