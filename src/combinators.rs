//! Combinators and terminal operations over [`ElementStream`]
//!
//! Transforming combinators spawn a new producer that pulls from the upstream
//! stream one element at a time (queue capacity 1), so nothing is computed
//! ahead of the consumer beyond a single value. A failure upstream ends the
//! derived stream with the same failure. Dropping a derived stream makes its
//! producer's next handoff fail, which in turn drops the upstream stream.
//!
//! Terminal operations consume strictly in order and stop at the first
//! failure.

use async_stream::stream;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use std::future::Future;

use crate::cancel::CancelToken;
use crate::error::{StreamError, StreamResult};
use crate::stream::{create_stream, ElementStream};

/// Drive `upstream` through `step`, forwarding every `Some` it returns
fn pipe<T, U, F>(upstream: ElementStream<T>, mut step: F) -> ElementStream<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> StreamResult<Option<U>> + Send + 'static,
{
    create_stream(1, move |sink| async move {
        let token = CancelToken::never();
        let mut upstream = upstream;
        while let Some(element) = upstream.next().await {
            if let Some(value) = step(element.into_result()?)? {
                if !sink.send(value, &token).await {
                    return Err(StreamError::Disconnected);
                }
            }
        }
        Ok(())
    })
}

/// Lazily apply `f` to every value; failures pass through without calling `f`
pub fn map<T, U, F>(stream: ElementStream<T>, mut f: F) -> ElementStream<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> U + Send + 'static,
{
    pipe(stream, move |value| Ok(Some(f(value))))
}

/// Like [`map`], but an `Err` from `f` ends the stream with that failure
pub fn try_map<T, U, F>(stream: ElementStream<T>, mut f: F) -> ElementStream<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> StreamResult<U> + Send + 'static,
{
    pipe(stream, move |value| f(value).map(Some))
}

/// Keep only values matching `predicate`
pub fn filter<T, F>(stream: ElementStream<T>, mut predicate: F) -> ElementStream<T>
where
    T: Send + 'static,
    F: FnMut(&T) -> bool + Send + 'static,
{
    pipe(stream, move |value| Ok(predicate(&value).then_some(value)))
}

/// For each outer value, drain the inner stream `f` returns before moving on.
///
/// Inner streams are never interleaved: output is outer-major, inner-minor.
/// The first failure, outer or inner, ends the whole stream.
pub fn flat_map<T, U, F>(stream: ElementStream<T>, mut f: F) -> ElementStream<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> ElementStream<U> + Send + 'static,
{
    create_stream(1, move |sink| async move {
        let token = CancelToken::never();
        let mut outer = stream;
        while let Some(element) = outer.next().await {
            let mut inner = f(element.into_result()?);
            while let Some(inner_element) = inner.next().await {
                if !sink.send(inner_element.into_result()?, &token).await {
                    return Err(StreamError::Disconnected);
                }
            }
        }
        Ok(())
    })
}

/// Consume every value in order.
///
/// Returns the first failure element or the first error raised by `action`,
/// whichever comes first; the rest of the stream is abandoned.
pub async fn for_each<T, F>(stream: ElementStream<T>, mut action: F) -> StreamResult<()>
where
    F: FnMut(T) -> StreamResult<()>,
{
    let mut stream = stream;
    while let Some(element) = stream.next().await {
        action(element.into_result()?)?;
    }
    Ok(())
}

/// [`for_each`] with an async action
pub async fn for_each_async<T, F, Fut>(stream: ElementStream<T>, mut action: F) -> StreamResult<()>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = StreamResult<()>>,
{
    let mut stream = stream;
    while let Some(element) = stream.next().await {
        action(element.into_result()?).await?;
    }
    Ok(())
}

/// Collect every value, or the first failure
pub async fn collect_to_vec<T>(stream: ElementStream<T>) -> StreamResult<Vec<T>> {
    match collect_partial(stream).await {
        (values, None) => Ok(values),
        (_, Some(err)) => Err(err),
    }
}

/// Collect values up to the first failure, keeping that prefix alongside it
pub async fn collect_partial<T>(stream: ElementStream<T>) -> (Vec<T>, Option<StreamError>) {
    let mut values = Vec::new();
    let outcome = for_each(stream, |value| {
        values.push(value);
        Ok(())
    })
    .await;
    (values, outcome.err())
}

/// View the stream as a plain `futures` stream of results
pub fn into_results<T>(stream: ElementStream<T>) -> BoxStream<'static, StreamResult<T>>
where
    T: Send + 'static,
{
    let mut stream = stream;
    stream! {
        while let Some(element) = stream.next().await {
            yield element.into_result();
        }
    }
    .boxed()
}

impl<T> ElementStream<T>
where
    T: Send + 'static,
{
    /// See [`map`]
    pub fn map<U, F>(self, f: F) -> ElementStream<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        map(self, f)
    }

    /// See [`try_map`]
    pub fn try_map<U, F>(self, f: F) -> ElementStream<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> StreamResult<U> + Send + 'static,
    {
        try_map(self, f)
    }

    /// See [`filter`]
    pub fn filter<F>(self, predicate: F) -> ElementStream<T>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        filter(self, predicate)
    }

    /// See [`flat_map`]
    pub fn flat_map<U, F>(self, f: F) -> ElementStream<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> ElementStream<U> + Send + 'static,
    {
        flat_map(self, f)
    }

    /// See [`for_each`]
    pub async fn for_each<F>(self, action: F) -> StreamResult<()>
    where
        F: FnMut(T) -> StreamResult<()>,
    {
        for_each(self, action).await
    }

    /// See [`for_each_async`]
    pub async fn for_each_async<F, Fut>(self, action: F) -> StreamResult<()>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = StreamResult<()>>,
    {
        for_each_async(self, action).await
    }

    /// See [`collect_to_vec`]
    pub async fn collect_to_vec(self) -> StreamResult<Vec<T>> {
        collect_to_vec(self).await
    }

    /// See [`collect_partial`]
    pub async fn collect_partial(self) -> (Vec<T>, Option<StreamError>) {
        collect_partial(self).await
    }

    /// See [`into_results`]
    pub fn into_results(self) -> BoxStream<'static, StreamResult<T>> {
        into_results(self)
    }
}
