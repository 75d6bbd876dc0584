use bitflags::bitflags;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a message, unique within one account and folder.
pub type Uid = u32;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct EmailFlags: u32 {
        const SEEN = 0b00000001;
        const ANSWERED = 0b00000010;
        const FLAGGED = 0b00000100;
        const DELETED = 0b00001000;
        const DRAFT = 0b00010000;
    }
}

impl EmailFlags {
    /// Parse a single IMAP system flag (`\Seen`, `\Flagged`, ...).
    /// Matching is case-insensitive; names outside the system set yield `None`.
    pub fn from_imap_name(name: &str) -> Option<Self> {
        let bare = name.trim().trim_start_matches('\\');
        match bare.to_ascii_lowercase().as_str() {
            "seen" => Some(Self::SEEN),
            "answered" => Some(Self::ANSWERED),
            "flagged" => Some(Self::FLAGGED),
            "deleted" => Some(Self::DELETED),
            "draft" => Some(Self::DRAFT),
            _ => None,
        }
    }

    pub fn imap_name(self) -> Option<&'static str> {
        match self {
            Self::SEEN => Some("\\Seen"),
            Self::ANSWERED => Some("\\Answered"),
            Self::FLAGGED => Some("\\Flagged"),
            Self::DELETED => Some("\\Deleted"),
            Self::DRAFT => Some("\\Draft"),
            _ => None,
        }
    }
}

/// A single flag as a provider reports or changes it: one of the system
/// flags, or a free-form keyword such as `$Junk`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    System(EmailFlags),
    Keyword(String),
}

impl Flag {
    /// Classify an IMAP flag name. Only backslash names are system flags;
    /// unknown ones (`\Recent` and other session flags) yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.starts_with('\\') {
            return EmailFlags::from_imap_name(name).map(Self::System);
        }
        if name.is_empty() {
            return None;
        }
        Some(Self::Keyword(name.to_string()))
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System(flags) => f.pad(flags.imap_name().unwrap_or("\\?")),
            Self::Keyword(keyword) => f.pad(keyword),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub name: Option<String>,
    pub address: String,
}

impl EmailAddress {
    pub fn display(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

/// Message header as reported by the remote mailbox or kept in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub uid: Uid,
    pub message_id: Option<String>,
    pub subject: String,
    pub from: EmailAddress,
    /// Raw `Date` value. May be absent or unparsable.
    pub date: Option<String>,
    pub flags: EmailFlags,
    /// Keywords outside the system flag set, kept verbatim
    #[serde(default)]
    pub keywords: BTreeSet<String>,
}

impl Header {
    pub fn new(uid: Uid, subject: impl Into<String>) -> Self {
        Self {
            uid,
            message_id: None,
            subject: subject.into(),
            from: EmailAddress::default(),
            date: None,
            flags: EmailFlags::empty(),
            keywords: BTreeSet::new(),
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_from(mut self, from: EmailAddress) -> Self {
        self.from = from;
        self
    }

    /// Set flags and keywords from the IMAP flag names a server reports.
    pub fn with_imap_flags<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for flag in names.into_iter().filter_map(|name| Flag::parse(name.as_ref())) {
            self.set_flag(&flag, true);
        }
        self
    }

    pub fn set_flag(&mut self, flag: &Flag, on: bool) {
        match flag {
            Flag::System(bits) => self.flags.set(*bits, on),
            Flag::Keyword(keyword) if on => {
                self.keywords.insert(keyword.clone());
            }
            Flag::Keyword(keyword) => {
                self.keywords.remove(keyword);
            }
        }
    }

    pub fn has_flag(&self, flag: &Flag) -> bool {
        match flag {
            Flag::System(bits) => self.flags.contains(*bits),
            Flag::Keyword(keyword) => self.keywords.contains(keyword),
        }
    }

    pub fn is_seen(&self) -> bool {
        self.flags.contains(EmailFlags::SEEN)
    }

    /// Unix timestamp of the `Date` value, or `None` when it cannot be read.
    pub fn timestamp(&self) -> Option<i64> {
        parse_date(self.date.as_deref()?)
    }
}

/// Parse a header date in RFC 2822 (as sent on the wire) or RFC 3339
/// (as stored by some servers' INTERNALDATE conversions) form.
pub fn parse_date(raw: &str) -> Option<i64> {
    let raw = strip_trailing_comment(raw.trim());
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    // Naive "YYYY-MM-DD HH:MM:SS" is read as UTC
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// Drop a trailing RFC 2822 comment such as `(UTC)` or `(PST)`.
fn strip_trailing_comment(raw: &str) -> &str {
    if raw.ends_with(')')
        && let Some(open) = raw.rfind('(')
    {
        return raw[..open].trim_end();
    }
    raw
}
