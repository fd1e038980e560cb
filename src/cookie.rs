//! Cookie directive attached to a [`Reply`](crate::Reply).
//!
//! A cookie must be attached before the response is serialized — once the
//! status line and headers are on the wire there is no second chance. The
//! envelope enforces this structurally: [`Reply::with_cookie`](crate::Reply::with_cookie)
//! copies the value, and writing consumes the envelope, so there is no
//! window in which a cookie could be added too late.

use std::fmt;

/// `SameSite` attribute values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// A `Set-Cookie` directive.
///
/// Built by value, like every envelope piece:
///
/// ```rust
/// use manila::{Cookie, SameSite};
///
/// let session = Cookie::new("session", "abc123")
///     .path("/")
///     .max_age(3600)
///     .http_only()
///     .secure()
///     .same_site(SameSite::Lax);
/// ```
#[derive(Clone, Debug)]
pub struct Cookie {
    name: String,
    value: String,
    path: Option<String>,
    max_age: Option<i64>,
    http_only: bool,
    secure: bool,
    same_site: Option<SameSite>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            max_age: None,
            http_only: false,
            secure: false,
            same_site: None,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Lifetime in seconds. Zero or negative expires the cookie immediately.
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    pub fn same_site(mut self, policy: SameSite) -> Self {
        self.same_site = Some(policy);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Renders the `Set-Cookie` header value.
impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(age) = self.max_age {
            write!(f, "; Max-Age={age}")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if let Some(policy) = self.same_site {
            write!(f, "; SameSite={}", policy.as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_bare_pair() {
        assert_eq!(Cookie::new("id", "42").to_string(), "id=42");
    }

    #[test]
    fn renders_all_attributes() {
        let c = Cookie::new("session", "abc")
            .path("/")
            .max_age(3600)
            .http_only()
            .secure()
            .same_site(SameSite::Lax);
        assert_eq!(
            c.to_string(),
            "session=abc; Path=/; Max-Age=3600; HttpOnly; Secure; SameSite=Lax"
        );
    }

    #[test]
    fn builders_copy_rather_than_mutate() {
        let base = Cookie::new("a", "1");
        let secure = base.clone().secure();
        assert_eq!(base.to_string(), "a=1");
        assert_eq!(secure.to_string(), "a=1; Secure");
    }
}
