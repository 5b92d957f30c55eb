//! Request and response shapes of the bundled services.
//!
//! Routes refer to these by schema id; the id constants are what gets
//! attached to each route declaration.

use serde::{Deserialize, Deserializer, Serialize};

use crate::store::{Article, Tag};

pub const GET_ARTICLES_QUERY: &str = "GetArticlesQueryParams";
pub const GET_ARTICLES_RESPONSE: &str = "GetArticlesResponse";
pub const GET_HELLO_QUERY: &str = "GetHelloWorldQueryParams";
pub const GET_HELLO_RESPONSE: &str = "GetHelloWorldResponse";

/// Query string of `GET /articles`.
///
/// `tags` is a comma-separated list, e.g. `tags=Nutrition,Exercise`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GetArticlesQuery {
    pub author: Option<String>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "comma_separated_tags")]
    pub tags: Option<Vec<Tag>>,
}

fn comma_separated_tags<'de, D>(deserializer: D) -> Result<Option<Vec<Tag>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    let tags = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse::<Tag>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(serde::de::Error::custom)?;

    Ok(if tags.is_empty() { None } else { Some(tags) })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetArticlesResponse {
    pub articles: Vec<Article>,
}

/// Query string of `GET /hello`. Takes no parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GetHelloQuery {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelloWorldResponse {
    pub hello: String,
}
