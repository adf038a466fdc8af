//! NNTP command builders and response parsers
//!
//! Only the subset of RFC 3977 / RFC 4644 the daemon core actually drives:
//! greeting negotiation, streaming feed commands, and article transfer.

pub mod response;

pub use response::{parse_response_line, parse_single_response};

/// Build QUIT command
pub fn quit() -> &'static str {
    "QUIT\r\n"
}

/// Build CAPABILITIES command (RFC 3977 §5.2)
pub fn capabilities() -> &'static str {
    "CAPABILITIES\r\n"
}

/// Build MODE READER command (RFC 3977 §5.3)
pub fn mode_reader() -> &'static str {
    "MODE READER\r\n"
}

/// Build MODE STREAM command (RFC 4644 §2.3)
///
/// Requests to switch to streaming mode for efficient bulk article transfer.
/// Response is 203 on success; anything else and the feed falls back to IHAVE mode.
pub fn mode_stream() -> &'static str {
    "MODE STREAM\r\n"
}

/// Build IHAVE command (RFC 3977 §6.2.1)
///
/// Offers an article for transfer by message-id.
/// Peer responds with 335 if it wants the article, 435/436 if not.
pub fn ihave(message_id: &str) -> String {
    format!("IHAVE {}\r\n", message_id)
}

/// Build CHECK command (RFC 4644 §2.4)
///
/// Checks if the peer wants an article by message-id in streaming mode.
/// Response:
/// - 238 (CHECK_SEND) - send the article via TAKETHIS
/// - 431 (CHECK_LATER) - try again later
/// - 438 (CHECK_NOT_WANTED) - article not wanted
pub fn check(message_id: &str) -> String {
    format!("CHECK {}\r\n", message_id)
}

/// Build TAKETHIS command with article data (RFC 4644 §2.5)
///
/// Sends an article to the peer in streaming mode without waiting for permission.
/// `article_data` must already be CRLF-terminated and dot-stuffed; the
/// terminating ".\r\n" is appended by the caller.
pub fn takethis(message_id: &str, article_data: &str) -> String {
    format!("TAKETHIS {}\r\n{}", message_id, article_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builders() {
        assert_eq!(ihave("<a@b>"), "IHAVE <a@b>\r\n");
        assert_eq!(check("<a@b>"), "CHECK <a@b>\r\n");
        assert_eq!(
            takethis("<a@b>", "X-Foo: 1\r\n\r\nbody\r\n"),
            "TAKETHIS <a@b>\r\nX-Foo: 1\r\n\r\nbody\r\n"
        );
        assert_eq!(mode_stream(), "MODE STREAM\r\n");
        assert_eq!(mode_reader(), "MODE READER\r\n");
        assert_eq!(quit(), "QUIT\r\n");
    }
}
