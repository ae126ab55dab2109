//! Identity wrapper for the GitHub personal access token.

use super::error::GithubError;

/// Personal access token wrapper enforcing presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalAccessToken(String);

impl PersonalAccessToken {
    /// Validates that the token is non-empty and trims whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::MissingToken`] when the supplied string is
    /// blank.
    pub fn new(token: impl AsRef<str>) -> Result<Self, GithubError> {
        let trimmed = token.as_ref().trim();
        if trimmed.is_empty() {
            return Err(GithubError::MissingToken);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the token value.
    #[must_use]
    pub const fn value(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for PersonalAccessToken {
    fn as_ref(&self) -> &str {
        self.value()
    }
}

#[cfg(test)]
mod tests {
    use super::PersonalAccessToken;
    use crate::github::error::GithubError;

    #[test]
    fn blank_token_is_rejected() {
        assert_eq!(
            PersonalAccessToken::new("   ").unwrap_err(),
            GithubError::MissingToken
        );
    }

    #[test]
    fn token_is_trimmed() {
        let token = PersonalAccessToken::new(" ghp_abc \n").expect("non-blank token");
        assert_eq!(token.value(), "ghp_abc");
    }
}
