//! Cancellation-aware stream guard.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use pin_project_lite::pin_project;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use super::FragmentStream;
use crate::Result;
use crate::normalize::Fragment;

pin_project! {
    /// Stream that ends as soon as its cancellation token fires.
    ///
    /// Created by [`until_cancelled`].
    pub struct UntilCancelled<S> {
        #[pin]
        inner: S,
        #[pin]
        cancelled: WaitForCancellationFutureOwned,
        done: bool,
    }
}

impl<S: Stream> Stream for UntilCancelled<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }
        // cancellation wins over an item that is ready at the same time
        if this.cancelled.poll(cx).is_ready() {
            *this.done = true;
            return Poll::Ready(None);
        }
        let item = this.inner.poll_next(cx);
        if let Poll::Ready(None) = item {
            *this.done = true;
        }
        item
    }
}

/// Wrap a fragment stream so it stops producing once `cancel` fires.
pub fn until_cancelled<S>(inner: S, cancel: CancellationToken) -> FragmentStream
where
    S: Stream<Item = Result<Fragment>> + Send + 'static,
{
    Box::pin(UntilCancelled {
        inner,
        cancelled: cancel.cancelled_owned(),
        done: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use futures_util::stream;

    #[tokio::test]
    async fn passes_items_through_until_exhausted() {
        let inner = stream::iter(vec![Ok(Fragment::text("a")), Ok(Fragment::StreamEnd)]);
        let items: Vec<_> = until_cancelled(inner, CancellationToken::new())
            .collect()
            .await;
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn stops_after_cancellation() {
        let token = CancellationToken::new();
        let inner = stream::iter(vec![Ok(Fragment::text("a")), Ok(Fragment::text("b"))]);
        let mut guarded = until_cancelled(inner, token.clone());

        assert!(guarded.next().await.is_some());
        token.cancel();
        assert!(guarded.next().await.is_none());
        assert!(guarded.next().await.is_none());
    }

    #[tokio::test]
    async fn ends_pending_stream_on_cancel() {
        let token = CancellationToken::new();
        let mut guarded = until_cancelled(stream::pending(), token.clone());

        let waiter = tokio::spawn(async move { guarded.next().await.is_none() });
        token.cancel();
        assert!(waiter.await.unwrap());
    }
}
