//! IMAP system flags carried in the `flags` field.

/// Flag marking a mail as read. Tag read counts are counts of mails
/// holding it.
pub const SEEN: &str = "\\Seen";
