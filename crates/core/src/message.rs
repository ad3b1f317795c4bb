use serde::Serialize;

/// A fully rendered notification, ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationMessage {
  pub recipient: String,
  pub sender: String,
  pub subject: String,
  pub text_body: String,
  /// Sent as `text/html; charset=utf-8`
  pub html_body: String,
}
