use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("{0}: No such file or directory")]
    NotFound(String),

    #[error("{0}: Permission denied")]
    PermissionDenied(String),

    #[error("{0}: File exists")]
    AlreadyExists(String),

    #[error("{0}: Not a directory")]
    NotDirectory(String),

    #[error("{0}: Is a directory")]
    IsDirectory(String),

    #[error("{0}: Directory not empty")]
    DirectoryNotEmpty(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FsError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    #[must_use]
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    #[must_use]
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    #[must_use]
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    #[must_use]
    pub fn not_directory(path: impl Into<String>) -> Self {
        Self::NotDirectory(path.into())
    }

    #[must_use]
    pub fn is_directory(path: impl Into<String>) -> Self {
        Self::IsDirectory(path.into())
    }

    #[must_use]
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    #[must_use]
    pub fn invalid_path(reason: impl Into<String>) -> Self {
        Self::InvalidPath(reason.into())
    }

    #[must_use]
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    #[must_use]
    pub fn persistence(reason: impl Into<String>) -> Self {
        Self::Persistence(reason.into())
    }

    #[must_use]
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}

pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_predicates() {
        assert!(FsError::not_found("/path").is_not_found());
        assert!(!FsError::permission_denied("/path").is_not_found());

        assert!(FsError::permission_denied("/etc/shadow").is_permission_denied());
        assert!(!FsError::not_found("/path").is_permission_denied());

        assert!(FsError::persistence("disk full").is_persistence());
        assert!(!FsError::internal("oops").is_persistence());
    }

    #[test]
    fn error_display() {
        let err = FsError::not_found("/home/missing.txt");
        assert_eq!(
            err.to_string(),
            "/home/missing.txt: No such file or directory"
        );

        let err = FsError::is_directory("/home");
        assert_eq!(err.to_string(), "/home: Is a directory");
    }
}
