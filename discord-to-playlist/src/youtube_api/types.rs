//! Pagination shared by the YouTube list endpoints.

use crate::error::RequestError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio_stream::Stream;

/// The items of one page and the token of the page after it, if there is one.
pub type Page<T> = (Vec<T>, Option<String>);

/// Flattens a `nextPageToken`-paginated list endpoint into a stream of items.
///
/// `fetch` is called with `None` for the first page and with the previous page's token after
/// that. A page is only requested once every item of the previous one was consumed. The
/// stream ends after a page without a next token, or right after the first error.
pub fn paged<'a, T, F, Fut>(fetch: F) -> impl Stream<Item = Result<T, RequestError>> + Send + 'a
where
    T: Send + 'a,
    F: Fn(Option<String>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<T>, RequestError>> + Send + 'a,
{
    async_stream::try_stream! {
        let mut page_token = None;
        loop {
            let (items, next_page_token) = fetch(page_token.take()).await?;
            for item in items {
                yield item;
            }
            page_token = next_page_token;
            if page_token.is_none() {
                break;
            }
        }
    }
}

/// Result-set counters attached to list responses.
///
/// See: <https://developers.google.com/youtube/v3/docs/pageInfo>
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "totalResults")]
    pub total_results: u32,
    #[serde(rename = "resultsPerPage")]
    pub results_per_page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn follows_page_tokens_until_exhausted() {
        let seen = Mutex::new(Vec::new());
        let stream = paged(|token: Option<String>| {
            seen.lock().unwrap().push(token.clone());
            async move {
                Ok(match token.as_deref() {
                    None => (vec![1, 2], Some("p2".to_string())),
                    Some("p2") => (vec![], Some("p3".to_string())),
                    Some(_) => (vec![3], None),
                })
            }
        });
        let items: Vec<i32> = stream.map(Result::unwrap).collect().await;
        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some("p2".to_string()), Some("p3".to_string())]
        );
    }

    #[tokio::test]
    async fn pages_are_fetched_lazily() {
        let fetches = Mutex::new(0);
        let stream = paged(|token: Option<String>| {
            *fetches.lock().unwrap() += 1;
            async move { Ok((vec![token.is_some()], Some("more".to_string()))) }
        });
        let mut stream = std::pin::pin!(stream);
        assert!(!stream.next().await.unwrap().unwrap());
        assert_eq!(*fetches.lock().unwrap(), 1);
        assert!(stream.next().await.unwrap().unwrap());
        assert_eq!(*fetches.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn first_error_ends_the_stream() {
        let stream = paged(|token: Option<String>| async move {
            match token {
                None => Ok((vec!["a"], Some("next".to_string()))),
                Some(_) => Err(RequestError::InvalidChannelType {
                    channel_id: 0,
                    kind: 0,
                }),
            }
        });
        let results: Vec<_> = stream.collect().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().ok(), Some(&"a"));
        assert!(results[1].is_err());
    }
}
