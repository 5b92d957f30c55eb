//! In-process article store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Article, ArticleFilter, ArticleStore, StoreError};

/// Keeps articles in memory, in insertion order.
#[derive(Default)]
pub struct InMemoryArticleStore {
    articles: RwLock<Vec<Article>>,
}

impl InMemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `articles`, validating each.
    pub async fn with_articles(
        articles: impl IntoIterator<Item = Article>,
    ) -> Result<Self, StoreError> {
        let store = Self::new();
        for article in articles {
            store.insert(article).await?;
        }
        Ok(store)
    }

    pub async fn len(&self) -> usize {
        self.articles.read().await.len()
    }
}

#[async_trait]
impl ArticleStore for InMemoryArticleStore {
    async fn find(&self, filter: &ArticleFilter) -> Result<Vec<Article>, StoreError> {
        let articles = self.articles.read().await;
        Ok(articles
            .iter()
            .filter(|article| filter.matches(article))
            .cloned()
            .collect())
    }

    async fn insert(&self, article: Article) -> Result<(), StoreError> {
        article.validate()?;

        let mut articles = self.articles.write().await;
        if articles.iter().any(|existing| existing.title == article.title) {
            return Err(StoreError::Duplicate {
                field: "title",
                value: article.title,
            });
        }
        articles.push(article);
        Ok(())
    }
}
