pub mod mailer;
pub mod notifications;

pub use mailer::{MailError, Mailer};
pub use notifications::NotificationService;
