// "Issue everything, wait for everything" helper for best-effort remote calls.

use futures::future::join_all;
use std::future::Future;

/// Per-operation results of a gathered batch, in submission order.
#[derive(Debug)]
pub struct Gathered<T, E> {
    pub results: Vec<Result<T, E>>,
}

impl<T, E> Gathered<T, E> {
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(Result::is_ok)
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count()
    }

    /// All values if every operation succeeded, otherwise the values that did
    /// succeed alongside the errors so the caller can compensate.
    pub fn into_all_ok(self) -> Result<Vec<T>, (Vec<T>, Vec<E>)> {
        let mut oks = Vec::with_capacity(self.results.len());
        let mut errs = Vec::new();
        for result in self.results {
            match result {
                Ok(value) => oks.push(value),
                Err(err) => errs.push(err),
            }
        }

        if errs.is_empty() {
            Ok(oks)
        } else {
            Err((oks, errs))
        }
    }
}

/// Run every future concurrently and collect every result. Never short-circuits.
pub async fn gather_all<I, F, T, E>(futures: I) -> Gathered<T, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    Gathered {
        results: join_all(futures).await,
    }
}
