//! Translates API queries into store filters.

use std::sync::Arc;

use super::{Article, ArticleFilter, ArticleStore, StoreError};
use crate::logger::{Logger, LoggerFactory};
use crate::schemas::GetArticlesQuery;

/// Article lookups on behalf of the articles service.
pub struct ArticlesController {
    store: Arc<dyn ArticleStore>,
    logger: Logger,
}

impl ArticlesController {
    pub fn new(store: Arc<dyn ArticleStore>, factory: &LoggerFactory) -> Self {
        Self {
            store,
            logger: factory.create_logger("get_articles"),
        }
    }

    /// Articles matching every predicate present in `query`. Empty values add no predicate.
    pub async fn get_articles(&self, query: &GetArticlesQuery) -> Result<Vec<Article>, StoreError> {
        let filter = ArticleFilter {
            author: non_empty(query.author.as_deref()),
            title: non_empty(query.title.as_deref()),
            tags: query.tags.clone().filter(|tags| !tags.is_empty()),
        };
        self.logger.observe_with(&filter, self.store.find(&filter)).await
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_string)
}
