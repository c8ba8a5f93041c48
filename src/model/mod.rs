//! Data model: incoming mails, flags, and tag counts.

pub mod mail;
pub mod status;
pub mod tag;
