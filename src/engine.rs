use crate::request::GenerationRequest;
use crate::status::Status;

/// Pull-based handle over a generation stream.
///
/// `get_next` blocks the calling thread until an item, the end of the
/// stream ([`Status::stop_iteration`]) or an error is available. Callers
/// must never have two `get_next` calls outstanding on the same handle.
pub trait BlockingIterator: Send + 'static {
    type Item: Send + 'static;

    fn get_next(&mut self) -> Result<Self::Item, Status>;
}

impl<T: Send + 'static> BlockingIterator for Box<dyn BlockingIterator<Item = T>> {
    type Item = T;

    fn get_next(&mut self) -> Result<T, Status> {
        (**self).get_next()
    }
}

/// Generation engine that performs scheduling, batching and sampling.
///
/// Both calls may block; the serving layer only ever invokes them from
/// worker threads.
pub trait Engine: Send + Sync + 'static {
    /// Result of a non-streaming generation.
    type Output: Send + 'static;
    /// Iterator returned for streaming generation.
    type Iter: BlockingIterator;

    fn generate(&self, request: &GenerationRequest) -> Result<Self::Output, Status>;

    fn generate_streaming(&self, request: &GenerationRequest) -> Result<Self::Iter, Status>;
}
