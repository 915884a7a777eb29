pub mod calendar;
pub mod invoker;
pub mod oauth;
pub mod pending;

pub use calendar::{CalendarApi, CalendarError, GoogleCalendarClient};
pub use invoker::{InvokeError, ReconnectReason, ResilientInvoker};
pub use oauth::{GoogleOAuthClient, OAuthCredentials, OAuthError, OAuthExchangeClient};
pub use pending::PendingAuthorizations;

/// Upper bound on how much of an upstream error body is kept for diagnostics.
pub(crate) const MAX_ERROR_BODY: usize = 512;

/// Cut `body` to at most [`MAX_ERROR_BODY`] bytes on a char boundary.
pub(crate) fn truncate_error_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_body_is_untouched() {
        assert_eq!(truncate_error_body("nope".into()), "nope");
    }

    #[test]
    fn long_body_is_cut_to_limit() {
        assert_eq!(truncate_error_body("x".repeat(4096)).len(), MAX_ERROR_BODY);
    }

    #[test]
    fn cut_never_splits_a_char() {
        // 'é' is two bytes, so byte 512 falls inside one.
        let body = format!("a{}", "é".repeat(600));
        let cut = truncate_error_body(body);
        assert_eq!(cut.len(), MAX_ERROR_BODY - 1);
        assert!(cut.ends_with('é'));
    }
}
