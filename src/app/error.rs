use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::store::StoreError;

/// Coarse classification handed to the request layer, which maps it to a
/// response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    BadRequest,
    Forbidden,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::BadRequest => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::Internal => 500,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConduitError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Article not found: {0}")]
    ArticleNotFound(String),

    #[error("Comment not found: {0}")]
    CommentNotFound(Uuid),

    /// The comment exists but is attached to another article. Reported as
    /// not-found so comment ids do not leak across articles.
    #[error("Comment not found: {0}")]
    CommentNotOnArticle(Uuid),

    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("Article already favorited")]
    AlreadyFavorited,

    #[error("Article already unfavorited")]
    AlreadyUnfavorited,

    #[error("Cannot follow yourself")]
    CannotFollowSelf,

    #[error("Cannot unfollow yourself")]
    CannotUnfollowSelf,

    #[error("Limit must be between {min} and {max}, got {value}")]
    InvalidLimit { value: i64, min: usize, max: usize },

    #[error("Invalid page token")]
    InvalidPageToken,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("internal error")]
    Store(#[source] StoreError),

    #[error("internal error")]
    Encoding(#[source] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ConduitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConduitError::UserNotFound(_)
            | ConduitError::ArticleNotFound(_)
            | ConduitError::CommentNotFound(_)
            | ConduitError::CommentNotOnArticle(_) => ErrorKind::NotFound,
            ConduitError::UsernameTaken(_)
            | ConduitError::EmailTaken(_)
            | ConduitError::AlreadyFavorited
            | ConduitError::AlreadyUnfavorited
            | ConduitError::CannotUnfollowSelf => ErrorKind::Conflict,
            ConduitError::CannotFollowSelf
            | ConduitError::InvalidLimit { .. }
            | ConduitError::InvalidPageToken
            | ConduitError::InvalidInput(_) => ErrorKind::BadRequest,
            ConduitError::Forbidden(_) => ErrorKind::Forbidden,
            ConduitError::Store(_) | ConduitError::Encoding(_) | ConduitError::Config(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<StoreError> for ConduitError {
    fn from(err: StoreError) -> Self {
        ConduitError::Store(err)
    }
}

impl From<serde_json::Error> for ConduitError {
    fn from(err: serde_json::Error) -> Self {
        ConduitError::Encoding(err)
    }
}

pub type Result<T> = std::result::Result<T, ConduitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_does_not_leak_detail() {
        let err: ConduitError = StoreError::Poisoned("items lock".into()).into();
        assert_eq!(err.to_string(), "internal error");
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_encoding_error_does_not_leak_detail() {
        let source = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: ConduitError = source.into();
        assert_eq!(err.to_string(), "internal error");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_self_follow_and_unfollow_have_distinct_kinds() {
        assert_eq!(ConduitError::CannotFollowSelf.kind(), ErrorKind::BadRequest);
        assert_eq!(ConduitError::CannotUnfollowSelf.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_comment_variants_are_both_not_found() {
        let id = Uuid::new_v4();
        assert_eq!(ConduitError::CommentNotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(
            ConduitError::CommentNotOnArticle(id).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(ErrorKind::NotFound.status(), 404);
    }
}
