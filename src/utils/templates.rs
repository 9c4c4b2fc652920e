//! Email templates.

use crate::infra::mail::EmailMessage;

const WRAPPER_STYLE: &str = "font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;";
const ACCENT: &str = "#2563eb";

/// Verification code sent after signup and on resend.
pub fn otp_email(to: &str, name: &str, code: &str, minutes: i64) -> EmailMessage {
    let html = format!(
        r#"<div style="{WRAPPER_STYLE}">
  <h2 style="color: {ACCENT};">Verify Your Email Address</h2>
  <p>Hi {name},</p>
  <p>Thank you for signing up! Please use the following verification code to complete your registration:</p>
  <p style="font-size: 32px; font-weight: bold; letter-spacing: 8px; color: {ACCENT};">{code}</p>
  <p>This verification code will expire in {minutes} minutes.</p>
  <p style="color: #6b7280; font-size: 14px;">If you didn't create an account, you can safely ignore this email.</p>
</div>"#
    );

    let text = format!(
        "Verify Your Email Address\n\n\
         Hi {name},\n\n\
         Thank you for signing up! Please use the following verification code to complete your registration:\n\n\
         {code}\n\n\
         This verification code will expire in {minutes} minutes."
    );

    EmailMessage {
        to: to.to_string(),
        subject: "Verify Your Email Address".to_string(),
        html,
        text,
    }
}

/// Password reset link.
pub fn password_reset_email(to: &str, reset_url: &str) -> EmailMessage {
    let html = format!(
        r#"<div style="{WRAPPER_STYLE}">
  <h2 style="color: {ACCENT};">Reset Your Password</h2>
  <p>You requested a password reset for your account.</p>
  <p>Click the button below to reset your password:</p>
  <a href="{reset_url}" style="display: inline-block; background-color: {ACCENT}; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px; margin: 16px 0;">Reset Password</a>
  <p>If you didn't request this password reset, you can safely ignore this email.</p>
  <p>This link will expire in 1 hour.</p>
  <hr style="margin: 20px 0;">
  <p style="color: #6b7280; font-size: 14px;">
    If the button doesn't work, copy and paste this link into your browser:<br>
    <a href="{reset_url}" style="color: {ACCENT};">{reset_url}</a>
  </p>
</div>"#
    );

    let text = format!(
        "Reset Your Password\n\n\
         You requested a password reset for your account.\n\n\
         Click this link to reset your password: {reset_url}\n\n\
         If you didn't request this password reset, you can safely ignore this email.\n\n\
         This link will expire in 1 hour."
    );

    EmailMessage {
        to: to.to_string(),
        subject: "Reset Your Password".to_string(),
        html,
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_email_contains_code() {
        let email = otp_email("ada@example.com", "Ada", "042137", 10);
        assert_eq!(email.to, "ada@example.com");
        assert!(email.html.contains("042137"));
        assert!(email.text.contains("042137"));
        assert!(email.text.contains("expire in 10 minutes"));
    }

    #[test]
    fn test_reset_email_embeds_link() {
        let url = "http://localhost:5173/reset-password?token=abc&email=ada%40example.com";
        let email = password_reset_email("ada@example.com", url);
        assert_eq!(email.subject, "Reset Your Password");
        assert_eq!(email.html.matches(url).count(), 3);
        assert!(email.text.contains(url));
    }
}
