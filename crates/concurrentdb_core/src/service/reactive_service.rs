//! Single-value publisher adapter.
//!
//! Every method returns a `SingleResult`, which is both a `Future` resolving
//! to the outcome and a `Stream` that yields the outcome once and then ends.
//! The operation is enqueued when the method is called, not when the result
//! is first polled.

use super::{ops, start_executor};
use crate::db::StoreConfig;
use crate::engine::{CrudEngine, CrudError, CrudResult, Executor, ExecutorConfig};
use crate::model::entity::{Entity, PrimaryKey, Removed};
use crate::model::query::{FetchQuery, Filter, SortTerm};
use futures::channel::oneshot;
use futures::stream::{FusedStream, Stream};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Pending outcome of one submitted operation.
#[must_use = "the outcome is lost unless the result is awaited or polled"]
pub struct SingleResult<R> {
    receiver: Option<oneshot::Receiver<CrudResult<R>>>,
}

impl<R> SingleResult<R> {
    fn new(receiver: oneshot::Receiver<CrudResult<R>>) -> Self {
        Self {
            receiver: Some(receiver),
        }
    }
}

impl<R> Future for SingleResult<R> {
    type Output = CrudResult<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(receiver) = this.receiver.as_mut() else {
            return Poll::Ready(Err(CrudError::Unexpected(
                "result already consumed".to_string(),
            )));
        };

        let received = match Pin::new(receiver).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(received) => received,
        };
        this.receiver = None;

        Poll::Ready(received.unwrap_or_else(|oneshot::Canceled| {
            Err(CrudError::Unexpected(
                "operation ended without delivering a result".to_string(),
            ))
        }))
    }
}

impl<R> Stream for SingleResult<R> {
    type Item = CrudResult<R>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.receiver.is_none() {
            return Poll::Ready(None);
        }
        Future::poll(self, cx).map(Some)
    }
}

impl<R> FusedStream for SingleResult<R> {
    fn is_terminated(&self) -> bool {
        self.receiver.is_none()
    }
}

/// Publisher-style front end of the store.
#[derive(Clone)]
pub struct ReactiveDatabaseService {
    executor: Arc<Executor>,
}

impl ReactiveDatabaseService {
    pub fn open(config: StoreConfig) -> CrudResult<Self> {
        Self::open_with(config, ExecutorConfig::default())
    }

    pub fn open_with(config: StoreConfig, executor_config: ExecutorConfig) -> CrudResult<Self> {
        Ok(Self::with_executor(start_executor(config, executor_config)?))
    }

    pub fn with_executor(executor: Arc<Executor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn create<T: Entity>(&self, entity: T) -> SingleResult<()> {
        self.submit(ops::create(vec![entity]))
    }

    pub fn create_many<T: Entity>(&self, entities: Vec<T>) -> SingleResult<()> {
        self.submit(ops::create(entities))
    }

    pub fn read<T: Entity>(&self, primary_key: impl Into<PrimaryKey>) -> SingleResult<T> {
        self.submit(ops::read(primary_key.into()))
    }

    pub fn read_first<T: Entity>(&self, filter: Filter) -> SingleResult<T> {
        self.submit(ops::read_first(filter))
    }

    pub fn read_all<T: Entity>(&self) -> SingleResult<Vec<T>> {
        self.submit(ops::read_query(FetchQuery::default()))
    }

    pub fn read_filtered<T: Entity>(&self, filter: Filter) -> SingleResult<Vec<T>> {
        self.submit(ops::read_query(FetchQuery::filtered(filter)))
    }

    pub fn read_sorted<T: Entity>(&self, sort: Vec<SortTerm>) -> SingleResult<Vec<T>> {
        self.submit(ops::read_query(FetchQuery::sorted(sort)))
    }

    pub fn read_query<T: Entity>(&self, query: FetchQuery) -> SingleResult<Vec<T>> {
        self.submit(ops::read_query(query))
    }

    pub fn update<T, F>(&self, primary_key: impl Into<PrimaryKey>, update: F) -> SingleResult<()>
    where
        T: Entity,
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.submit(ops::update(primary_key.into(), update))
    }

    pub fn update_many<T, F>(&self, primary_keys: Vec<PrimaryKey>, update: F) -> SingleResult<()>
    where
        T: Entity,
        F: FnOnce(&mut [T]) + Send + 'static,
    {
        self.submit(ops::update_many(primary_keys, update))
    }

    pub fn delete<T: Entity>(
        &self,
        primary_key: impl Into<PrimaryKey>,
    ) -> SingleResult<Removed<T>> {
        self.submit(ops::delete(primary_key.into()))
    }

    pub fn delete_many<T: Entity>(
        &self,
        primary_keys: Vec<PrimaryKey>,
    ) -> SingleResult<Vec<Removed<T>>> {
        self.submit(ops::delete_many(primary_keys))
    }

    pub fn erase(&self) -> SingleResult<()> {
        self.submit(ops::erase())
    }

    fn submit<R, Op>(&self, op: Op) -> SingleResult<R>
    where
        R: Send + 'static,
        Op: FnOnce(&CrudEngine) -> CrudResult<R> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        self.executor.submit(op, move |outcome| {
            // Receiver dropped: nobody is listening any more.
            let _ = sender.send(outcome);
        });
        SingleResult::new(receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::SingleResult;
    use crate::engine::CrudError;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use futures::StreamExt;

    #[test]
    fn stream_yields_one_item_then_ends() {
        let (sender, receiver) = oneshot::channel();
        sender.send(Ok(5)).unwrap();
        let mut result = SingleResult::new(receiver);

        let items = block_on(async {
            let first = result.next().await;
            let second = result.next().await;
            (first, second)
        });

        assert!(matches!(items.0, Some(Ok(5))));
        assert!(items.1.is_none());
    }

    #[test]
    fn dropped_sender_resolves_to_unexpected() {
        let (sender, receiver) = oneshot::channel::<Result<(), CrudError>>();
        drop(sender);

        let outcome = block_on(SingleResult::new(receiver));
        assert!(matches!(outcome, Err(CrudError::Unexpected(_))));
    }
}
