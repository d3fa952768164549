use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{Stream, stream};
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::types::PageInfo;

/// Sends a raw GraphQL request body and returns the raw JSON response.
#[async_trait]
pub trait GraphQLTransport: Send + Sync {
    async fn execute(&self, request: &Value) -> Result<Value>;
}

#[async_trait]
impl GraphQLTransport for Octocrab {
    async fn execute(&self, request: &Value) -> Result<Value> {
        let response: Value = self
            .graphql(request)
            .await
            .context("GitHub GraphQL request failed")?;
        Ok(response)
    }
}

/// Extracts the pagination state from a decoded page.
pub type PickPageInfo<D> = fn(&D) -> &PageInfo;

pub struct GraphQLClient {
    transport: Box<dyn GraphQLTransport>,
}

impl GraphQLClient {
    pub fn new(transport: impl GraphQLTransport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
        }
    }

    /// Runs a query or mutation and decodes its `data` member.
    pub async fn request<D: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<D> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        let response = self.transport.execute(&body).await?;
        decode_response(response)
    }

    /// Lazily fetches every page of a cursor-paginated query.
    ///
    /// The `cursor` variable is null for the first request and then set to
    /// the previous page's `endCursor`. The stream ends after the first page
    /// whose `hasNextPage` is false; any error ends it immediately.
    pub fn paginate<'a, D>(
        &'a self,
        query: &'a str,
        variables: Value,
        page_info: PickPageInfo<D>,
    ) -> impl Stream<Item = Result<D>> + Send + 'a
    where
        D: DeserializeOwned + Send + 'a,
    {
        stream::try_unfold(Some(Value::Null), move |cursor| {
            let mut variables = variables.clone();
            async move {
                let Some(cursor) = cursor else {
                    return Ok::<_, anyhow::Error>(None);
                };

                if let Value::Object(map) = &mut variables {
                    map.insert("cursor".to_string(), cursor);
                }

                let page: D = self.request(query, variables).await?;
                let info = page_info(&page);
                debug!(has_next_page = info.has_next_page, "fetched GraphQL page");

                let next = if info.has_next_page {
                    let end_cursor = info
                        .end_cursor
                        .clone()
                        .context("Server reported another page without an end cursor")?;
                    Some(Value::String(end_cursor))
                } else {
                    None
                };

                Ok(Some((page, next)))
            }
        })
    }
}

/// Errors reported by the GraphQL server in an otherwise successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphQLError {
    pub messages: Vec<String>,
}

impl std::fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GitHub GraphQL error: {}", self.messages.join("; "))
    }
}

impl std::error::Error for GraphQLError {}

fn decode_response<D: DeserializeOwned>(mut response: Value) -> Result<D> {
    if let Some(errors) = response.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            return Err(GraphQLError { messages }.into());
        }
    }

    let data = response
        .get_mut("data")
        .map(Value::take)
        .filter(|d| !d.is_null())
        .context("GitHub GraphQL response has no data")?;

    serde_json::from_value(data).context("Failed to decode GitHub GraphQL response")
}
