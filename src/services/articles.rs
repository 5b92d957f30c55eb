//! Article search.

use std::sync::Arc;

use crate::error::{DeclarationError, HandlerError};
use crate::routes::{ApiRequest, RouteSpec, RouteTable, Service};
use crate::schemas::{
    GET_ARTICLES_QUERY, GET_ARTICLES_RESPONSE, GetArticlesQuery, GetArticlesResponse,
};
use crate::store::ArticlesController;

pub struct ArticlesService {
    controller: Arc<ArticlesController>,
}

impl ArticlesService {
    pub fn new(controller: Arc<ArticlesController>) -> Self {
        Self { controller }
    }

    pub async fn get_articles(
        self: Arc<Self>,
        request: ApiRequest,
    ) -> Result<GetArticlesResponse, HandlerError> {
        let query: GetArticlesQuery = request.query()?;
        let articles = self.controller.get_articles(&query).await?;
        Ok(GetArticlesResponse { articles })
    }
}

impl Service for ArticlesService {
    fn declare(routes: &mut RouteTable<Self>) -> Result<(), DeclarationError> {
        routes.module("articles").get(
            "/",
            "get_articles",
            RouteSpec::new()
                .auth()
                .query(GET_ARTICLES_QUERY)
                .response(GET_ARTICLES_RESPONSE),
            Self::get_articles,
        )?;
        Ok(())
    }
}
