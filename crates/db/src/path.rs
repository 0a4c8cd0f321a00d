//! Document and collection paths.
//!
//! Paths alternate collection names and document IDs:
//! `creators` is a collection, `creators/abc` a document,
//! `creators/abc/members` a sub-collection.

use std::fmt;

use wildwatch_common::{AppError, AppResult};

const SEPARATOR: char = '/';

/// Path to a single document (even number of segments).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPath(String);

/// Path to a collection of documents (odd number of segments).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath(String);

fn validate_segment(segment: &str) -> AppResult<()> {
    if segment.is_empty() {
        return Err(AppError::Validation("path segment must not be empty".to_string()));
    }
    if segment.contains(SEPARATOR) {
        return Err(AppError::Validation(format!(
            "path segment must not contain '{SEPARATOR}': {segment}"
        )));
    }
    Ok(())
}

fn segment_count(path: &str) -> AppResult<usize> {
    let mut count = 0;
    for segment in path.split(SEPARATOR) {
        validate_segment(segment)?;
        count += 1;
    }
    Ok(count)
}

impl DocumentPath {
    /// Parse and validate a document path.
    pub fn parse(path: impl Into<String>) -> AppResult<Self> {
        let path = path.into();
        if segment_count(&path)? % 2 != 0 {
            return Err(AppError::Validation(format!(
                "not a document path: {path}"
            )));
        }
        Ok(Self(path))
    }

    /// The document ID (last segment).
    #[must_use]
    pub fn id(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or(&self.0)
    }

    /// The collection containing this document.
    #[must_use]
    pub fn parent(&self) -> CollectionPath {
        match self.0.rsplit_once(SEPARATOR) {
            Some((parent, _)) => CollectionPath(parent.to_string()),
            None => CollectionPath(String::new()),
        }
    }

    /// A sub-collection beneath this document.
    pub fn collection(&self, name: &str) -> AppResult<CollectionPath> {
        validate_segment(name)?;
        Ok(CollectionPath(format!("{}{SEPARATOR}{name}", self.0)))
    }

    /// The path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl CollectionPath {
    /// Parse and validate a collection path.
    pub fn parse(path: impl Into<String>) -> AppResult<Self> {
        let path = path.into();
        if segment_count(&path)? % 2 != 1 {
            return Err(AppError::Validation(format!(
                "not a collection path: {path}"
            )));
        }
        Ok(Self(path))
    }

    /// A root-level collection.
    pub fn root(name: &str) -> AppResult<Self> {
        validate_segment(name)?;
        Ok(Self(name.to_string()))
    }

    /// A document within this collection.
    pub fn doc(&self, id: &str) -> AppResult<DocumentPath> {
        validate_segment(id)?;
        Ok(DocumentPath(format!("{}{SEPARATOR}{id}", self.0)))
    }

    /// Whether `path` is a direct child document of this collection.
    #[must_use]
    pub fn contains(&self, path: &DocumentPath) -> bool {
        path.parent() == *self
    }

    /// Prefix shared by all direct children, including the trailing separator.
    #[must_use]
    pub fn child_prefix(&self) -> String {
        format!("{}{SEPARATOR}", self.0)
    }

    /// The path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builders for the logical paths used by the application.
pub mod paths {
    use super::{CollectionPath, DocumentPath};
    use wildwatch_common::AppResult;

    /// `users/{user_id}`
    pub fn user(user_id: &str) -> AppResult<DocumentPath> {
        CollectionPath::root("users")?.doc(user_id)
    }

    /// `creators/{creator_id}`
    pub fn creator(creator_id: &str) -> AppResult<DocumentPath> {
        CollectionPath::root("creators")?.doc(creator_id)
    }

    /// `users/{follower_id}/following`
    pub fn following_of(follower_id: &str) -> AppResult<CollectionPath> {
        user(follower_id)?.collection("following")
    }

    /// `users/{follower_id}/following/{creator_id}`
    pub fn following(follower_id: &str, creator_id: &str) -> AppResult<DocumentPath> {
        following_of(follower_id)?.doc(creator_id)
    }

    /// `creators/{creator_id}/members`
    pub fn members_of(creator_id: &str) -> AppResult<CollectionPath> {
        creator(creator_id)?.collection("members")
    }

    /// `creators/{creator_id}/members/{follower_id}`
    pub fn member(creator_id: &str, follower_id: &str) -> AppResult<DocumentPath> {
        members_of(creator_id)?.doc(follower_id)
    }

    /// `users/{user_id}/notifications`
    pub fn notifications_of(user_id: &str) -> AppResult<CollectionPath> {
        user(user_id)?.collection("notifications")
    }

    /// `users/{user_id}/notifications/{notification_id}`
    pub fn notification(user_id: &str, notification_id: &str) -> AppResult<DocumentPath> {
        notifications_of(user_id)?.doc(notification_id)
    }

    /// `rateLimits/{user_id}_{action}`
    pub fn rate_limit(user_id: &str, action: &str) -> AppResult<DocumentPath> {
        CollectionPath::root("rateLimits")?.doc(&format!("{user_id}_{action}"))
    }
}
