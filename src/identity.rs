//! Account identity normalization.
//!
//! The helper expects credentials as `domain/login`. Users tend to write
//! them in whatever form their platform taught them: `login@domain`,
//! `DOMAIN\login`, `domain/login` or a bare `login`. [`normalize`] folds all
//! of those into the canonical form.

use std::fmt;

/// Separator placed between domain and login in a normalized identity.
pub const IDENTITY_SEPARATOR: char = '/';

/// Characters accepted between domain and login in raw input.
const PATH_SEPARATORS: [char; 2] = ['\\', '/'];

/// Normalize a raw account string into `domain/login` (or bare `login`).
///
/// An `@` takes priority and means `login@domain`; otherwise `\` and `/`
/// mean `domain<sep>login`. Every `\` becomes `/` and runs of separators
/// collapse, so normalizing the result again is a no-op.
///
/// Only the first `@` is treated as a delimiter, so `login@login@domain`
/// yields `login@domain/login` and a login such as `administr@tor` cannot be
/// told apart from a `login@domain` pair. Idempotence holds for inputs with
/// at most one `@`.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let (domain, login) = split(raw);
    let segments: Vec<&str> = domain
        .split(PATH_SEPARATORS)
        .chain(login.split(PATH_SEPARATORS))
        .filter(|segment| !segment.is_empty())
        .collect();
    segments.join(IDENTITY_SEPARATOR.to_string().as_str())
}

/// Split a raw identity into `(domain, login)`.
///
/// Slash-separated input is already in domain-first order, so only `@`
/// needs swapping.
fn split(raw: &str) -> (&str, &str) {
    raw.split_once('@')
        .map_or(("", raw), |(login, domain)| (domain, login))
}

/// A normalized account identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Normalize `raw` into an identity.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self(normalize(raw))
    }

    /// The normalized `domain/login` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether no account was given at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The domain part, if the identity carries one.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.0
            .rsplit_once(IDENTITY_SEPARATOR)
            .map(|(domain, _)| domain)
    }

    /// The login part.
    #[must_use]
    pub fn login(&self) -> &str {
        self.0
            .rsplit_once(IDENTITY_SEPARATOR)
            .map_or(self.0.as_str(), |(_, login)| login)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}
