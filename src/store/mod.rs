//! Article persistence boundary.
//!
//! Operations talk to storage through [`ArticleStore`], expressing queries as
//! an [`ArticleFilter`] of equality and set-membership predicates. Storage
//! format is the store's own business.

pub mod controller;
pub mod memory;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::error::StoreError;
pub use controller::ArticlesController;
pub use memory::InMemoryArticleStore;

/// Topic an article can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    JavaScript,
    #[serde(rename = "Machine Learning")]
    MachineLearning,
    Nutrition,
    Exercise,
    Adventure,
    Movies,
    #[serde(rename = "Personal Finance")]
    PersonalFinance,
    Fashion,
}

impl Tag {
    pub const ALL: [Tag; 8] = [
        Tag::JavaScript,
        Tag::MachineLearning,
        Tag::Nutrition,
        Tag::Exercise,
        Tag::Adventure,
        Tag::Movies,
        Tag::PersonalFinance,
        Tag::Fashion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tag::JavaScript => "JavaScript",
            Tag::MachineLearning => "Machine Learning",
            Tag::Nutrition => "Nutrition",
            Tag::Exercise => "Exercise",
            Tag::Adventure => "Adventure",
            Tag::Movies => "Movies",
            Tag::PersonalFinance => "Personal Finance",
            Tag::Fashion => "Fashion",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s.trim())
            .ok_or_else(|| format!("unknown tag: {s}"))
    }
}

/// A stored article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub author: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub const MIN_AUTHOR_LEN: usize = 3;
    pub const MIN_TITLE_LEN: usize = 5;

    /// A new article stamped with the current time. Author and title are trimmed.
    pub fn new(
        author: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        tags: Vec<Tag>,
    ) -> Self {
        let now = Utc::now();
        Self {
            author: author.into().trim().to_string(),
            title: title.into().trim().to_string(),
            content: content.into(),
            tags,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the field constraints every stored article must meet.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.author.chars().count() < Self::MIN_AUTHOR_LEN {
            return Err(StoreError::Invalid(format!(
                "author must be at least {} characters",
                Self::MIN_AUTHOR_LEN
            )));
        }
        if self.title.chars().count() < Self::MIN_TITLE_LEN {
            return Err(StoreError::Invalid(format!(
                "title must be at least {} characters",
                Self::MIN_TITLE_LEN
            )));
        }
        if self.content.is_empty() {
            return Err(StoreError::Invalid("content is required".to_string()));
        }
        Ok(())
    }
}

/// Query over articles. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArticleFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Matches articles carrying at least one of these tags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

impl ArticleFilter {
    pub fn matches(&self, article: &Article) -> bool {
        if let Some(author) = &self.author {
            if &article.author != author {
                return false;
            }
        }
        if let Some(title) = &self.title {
            if &article.title != title {
                return false;
            }
        }
        if let Some(tags) = &self.tags {
            if !article.tags.iter().any(|tag| tags.contains(tag)) {
                return false;
            }
        }
        true
    }
}

/// Storage for articles.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Every article matching `filter`, in insertion order.
    async fn find(&self, filter: &ArticleFilter) -> Result<Vec<Article>, StoreError>;

    /// Validate and store `article`. Titles are unique.
    async fn insert(&self, article: Article) -> Result<(), StoreError>;
}
