//! Mail objects as handed to the index by the mail domain layer.

use serde::{Deserialize, Serialize};

/// Parsed envelope headers of a mail.
///
/// Address lists keep whatever form the domain layer produced
/// (`"Name <a@b>"` or bare addresses); the index stores them verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailHeaders {
    /// `From:` address.
    pub from: String,
    /// `To:` recipients.
    pub to: Vec<String>,
    /// `Cc:` recipients.
    pub cc: Vec<String>,
    /// `Bcc:` recipients.
    pub bcc: Vec<String>,
    /// Decoded subject line.
    pub subject: String,
    /// `Date:` header, RFC 2822 or RFC 3339. Missing dates sort as the epoch.
    pub date: Option<String>,
}

/// A mail ready to be indexed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mail {
    /// Globally unique identifier; the primary key of the index.
    pub ident: String,
    /// Name of the mailbox (folder) holding the mail, e.g. `INBOX`.
    pub mailbox_name: String,
    /// Envelope headers.
    pub headers: MailHeaders,
    /// User tags. The lowercase mailbox name is added at indexing time.
    pub tags: Vec<String>,
    /// IMAP-style state markers such as `\Seen`.
    pub flags: Vec<String>,
    /// Plain-text body.
    pub text_plain_body: String,
    /// Full raw message (headers and body).
    pub raw: String,
}

impl Mail {
    /// Start a mail with the given ident in the given mailbox.
    pub fn new(ident: impl Into<String>, mailbox_name: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            mailbox_name: mailbox_name.into(),
            ..Self::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the plain-text body and, if empty, derive `raw` from headers + body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.text_plain_body = body.into();
        if self.raw.is_empty() {
            self.raw = self.render_raw();
        }
        self
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = raw.into();
        self
    }

    pub fn with_headers(mut self, headers: MailHeaders) -> Self {
        self.headers = headers;
        self
    }

    /// Minimal RFC 5322 rendering used when the caller has no raw source.
    fn render_raw(&self) -> String {
        let h = &self.headers;
        let mut out = String::new();
        if !h.from.is_empty() {
            out.push_str(&format!("From: {}\r\n", h.from));
        }
        for (name, list) in [("To", &h.to), ("Cc", &h.cc), ("Bcc", &h.bcc)] {
            if !list.is_empty() {
                out.push_str(&format!("{name}: {}\r\n", list.join(", ")));
            }
        }
        if !h.subject.is_empty() {
            out.push_str(&format!("Subject: {}\r\n", h.subject));
        }
        if let Some(ref date) = h.date {
            out.push_str(&format!("Date: {date}\r\n"));
        }
        out.push_str("\r\n");
        out.push_str(&self.text_plain_body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_body_renders_raw() {
        let mail = Mail::new("m1", "INBOX")
            .with_headers(MailHeaders {
                from: "alice@example.com".into(),
                to: vec!["bob@example.com".into(), "carol@example.com".into()],
                subject: "Lunch".into(),
                ..MailHeaders::default()
            })
            .with_body("see you at noon");
        assert!(mail.raw.contains("From: alice@example.com"));
        assert!(mail.raw.contains("To: bob@example.com, carol@example.com"));
        assert!(mail.raw.ends_with("see you at noon"));
    }

    #[test]
    fn test_explicit_raw_is_kept() {
        let mail = Mail::new("m1", "INBOX")
            .with_raw("original source")
            .with_body("body");
        assert_eq!(mail.raw, "original source");
    }

    #[test]
    fn test_deserialize_partial_json() {
        let json = r#"{"ident": "x", "mailbox_name": "Sent", "headers": {"to": ["a@b.org"]}}"#;
        let mail: Mail = serde_json::from_str(json).expect("parse");
        assert_eq!(mail.ident, "x");
        assert_eq!(mail.headers.to, vec!["a@b.org"]);
        assert!(mail.tags.is_empty());
        assert!(mail.headers.date.is_none());
    }
}
