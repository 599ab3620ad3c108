mod dto;
pub mod handlers;
pub mod service;
pub mod templates;

pub use handlers::router;
pub use service::{dispatch, MailTransport, SmtpMailer};
