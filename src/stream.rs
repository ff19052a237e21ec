//! The fragment sequence returned by a streaming completion.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, Stream, StreamExt};

use crate::sse::SseEvent;
use crate::types::{ChatCompletionChunk, StreamFragment};
use crate::{Error, Result};

type BoxedFragments = Pin<Box<dyn Stream<Item = Result<StreamFragment>> + Send>>;

/// A lazy, finite, non-restartable sequence of [`StreamFragment`]s.
///
/// Fragments arrive in the order the service sent them.  A rate-limit condition
/// never appears as an item: the sequence ends early and [`FragmentStream::rate_limit`]
/// reports it.  Other failures are yielded as `Err` items.
pub struct FragmentStream {
    inner: BoxedFragments,
    rate_limit: Option<Error>,
    done: bool,
}

impl FragmentStream {
    /// Wraps any fragment source.
    pub fn new<S>(inner: S) -> Self
    where
        S: Stream<Item = Result<StreamFragment>> + Send + 'static,
    {
        Self {
            inner: Box::pin(inner),
            rate_limit: None,
            done: false,
        }
    }

    /// A stream that was rate limited before its first fragment.
    pub fn rate_limited(error: Error) -> Self {
        Self {
            inner: Box::pin(stream::empty()),
            rate_limit: Some(error),
            done: true,
        }
    }

    /// Builds fragments from decoded server-sent events.
    ///
    /// Each chunk becomes one fragment; a chunk with a finish reason is final.
    /// `[DONE]` ends the sequence.
    pub fn from_events<S>(events: S) -> Self
    where
        S: Stream<Item = Result<SseEvent>> + Send + 'static,
    {
        let fragments = events
            .take_while(|event| futures::future::ready(!matches!(event, Ok(SseEvent::Done))))
            .filter_map(|event| {
                futures::future::ready(match event {
                    Ok(SseEvent::Chunk(chunk)) => chunk_to_fragment(chunk),
                    Ok(SseEvent::Done) => None,
                    Err(e) => Some(Err(e)),
                })
            });
        Self::new(fragments)
    }

    /// The rate-limit condition that ended the stream, if any.
    pub fn rate_limit(&self) -> Option<&Error> {
        self.rate_limit.as_ref()
    }

    /// True once the stream has ended because of rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        self.rate_limit.is_some()
    }

    /// Drains the stream and concatenates every fragment.
    ///
    /// The first error ends the collection and is returned; a rate limit is
    /// returned as an error here because there is no partial text to show.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?.text);
        }
        match self.rate_limit {
            Some(err) => Err(err),
            None => Ok(text),
        }
    }
}

fn chunk_to_fragment(chunk: ChatCompletionChunk) -> Option<Result<StreamFragment>> {
    if let Some(error) = chunk.error {
        let err = if error.is_rate_limit() {
            Error::rate_limit(error.message, None)
        } else {
            Error::api(200, error.error_type, error.message, None)
        };
        return Some(Err(err));
    }
    let choice = chunk.choices.into_iter().next()?;
    let text = choice.delta.content.unwrap_or_default();
    let is_final = choice.finish_reason.is_some();
    if text.is_empty() && !is_final {
        return None;
    }
    Some(Ok(StreamFragment { text, is_final }))
}

impl Stream for FragmentStream {
    type Item = Result<StreamFragment>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Err(err))) if err.is_rate_limit() => {
                tracing::warn!(error = %err, "completion stream rate limited");
                this.rate_limit = Some(err);
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl fmt::Debug for FragmentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentStream")
            .field("rate_limit", &self.rate_limit)
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApiErrorBody, ChunkChoice, Delta};
    use futures::stream;
    use tokio_test::{assert_pending, assert_ready, task};

    fn chunk(content: Option<&str>, finish_reason: Option<&str>) -> SseEvent {
        SseEvent::Chunk(ChatCompletionChunk {
            choices: vec![ChunkChoice {
                delta: Delta {
                    content: content.map(str::to_string),
                },
                finish_reason: finish_reason.map(str::to_string),
            }],
            error: None,
        })
    }

    fn error_chunk(code: &str) -> SseEvent {
        SseEvent::Chunk(ChatCompletionChunk {
            choices: vec![],
            error: Some(ApiErrorBody {
                message: "Rate limit reached for gpt-4".to_string(),
                error_type: Some("requests".to_string()),
                code: Some(code.to_string()),
                param: None,
            }),
        })
    }

    #[tokio::test]
    async fn fragments_in_arrival_order() {
        let events = stream::iter(vec![
            Ok(chunk(None, None)),
            Ok(chunk(Some("Hel"), None)),
            Ok(chunk(Some("lo"), None)),
            Ok(chunk(None, Some("stop"))),
            Ok(SseEvent::Done),
        ]);
        let fragments: Vec<_> = FragmentStream::from_events(events)
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(
            fragments,
            vec![
                StreamFragment::partial("Hel"),
                StreamFragment::partial("lo"),
                StreamFragment::last(""),
            ]
        );
    }

    #[tokio::test]
    async fn rate_limit_ends_the_stream_without_an_item() {
        let events = stream::iter(vec![
            Ok(chunk(Some("partial"), None)),
            Ok(error_chunk("rate_limit_exceeded")),
            Ok(chunk(Some("never seen"), None)),
        ]);
        let mut fragments = FragmentStream::from_events(events);
        let first = fragments.next().await.unwrap().unwrap();
        assert_eq!(first.text, "partial");
        assert!(fragments.next().await.is_none());
        assert!(fragments.is_rate_limited());
        // Non-restartable.
        assert!(fragments.next().await.is_none());
    }

    #[tokio::test]
    async fn other_errors_are_yielded() {
        let events = stream::iter(vec![Ok(error_chunk("server_error"))]);
        let mut fragments = FragmentStream::from_events(events);
        assert!(matches!(
            fragments.next().await,
            Some(Err(Error::Api { .. }))
        ));
        assert!(!fragments.is_rate_limited());
    }

    #[tokio::test]
    async fn collect_text_concatenates() {
        let events = stream::iter(vec![
            Ok(chunk(Some("a"), None)),
            Ok(chunk(Some("b"), Some("stop"))),
        ]);
        let text = FragmentStream::from_events(events).collect_text().await.unwrap();
        assert_eq!(text, "ab");

        let limited = FragmentStream::rate_limited(Error::rate_limit("busy", Some(1)));
        assert!(limited.collect_text().await.unwrap_err().is_rate_limit());
    }

    #[test]
    fn stream_is_lazy() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<Result<StreamFragment>>();
        let mut fragments = task::spawn(FragmentStream::new(rx));
        assert_pending!(fragments.poll_next());
        tx.unbounded_send(Ok(StreamFragment::partial("x"))).unwrap();
        let item = assert_ready!(fragments.poll_next());
        assert_eq!(item.unwrap().unwrap().text, "x");
        drop(tx);
        assert!(assert_ready!(fragments.poll_next()).is_none());
    }
}
