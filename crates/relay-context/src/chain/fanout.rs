//! Join-all group for independent sub-tasks.
//!
//! Every task runs to completion; one failure never cancels its siblings.

use std::future::Future;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;

pub struct FanOut<'a, T, E> {
    tasks: Vec<BoxFuture<'a, Result<T, E>>>,
}

impl<'a, T, E> FanOut<'a, T, E>
where
    T: Send + 'a,
    E: Send + 'a,
{
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn push<F>(&mut self, task: F)
    where
        F: Future<Output = Result<T, E>> + Send + 'a,
    {
        self.tasks.push(task.boxed());
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every task. Results keep push order.
    pub async fn join(self) -> FanOutResult<T, E> {
        FanOutResult {
            results: join_all(self.tasks).await,
        }
    }
}

impl<'a, T: Send + 'a, E: Send + 'a> Default for FanOut<'a, T, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct FanOutResult<T, E> {
    pub results: Vec<Result<T, E>>,
}

impl<T, E> FanOutResult<T, E> {
    /// Split into successes and errors, each in push order.
    pub fn partition(self) -> (Vec<T>, Vec<E>) {
        let mut ok = Vec::new();
        let mut errors = Vec::new();
        for result in self.results {
            match result {
                Ok(value) => ok.push(value),
                Err(err) => errors.push(err),
            }
        }
        (ok, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn keeps_order_and_collects_errors() {
        let mut group: FanOut<'_, u32, String> = FanOut::new();
        group.push(async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(1)
        });
        group.push(async { Err("boom".to_string()) });
        group.push(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(3)
        });
        assert_eq!(group.len(), 3);

        let (ok, errors) = group.join().await.partition();
        assert_eq!(ok, vec![1, 3]);
        assert_eq!(errors, vec!["boom".to_string()]);
    }

    #[tokio::test]
    async fn empty_group_joins_immediately() {
        let group: FanOut<'_, (), ()> = FanOut::default();
        assert!(group.is_empty());
        assert!(group.join().await.results.is_empty());
    }
}
