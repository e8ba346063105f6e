use crate::state::Config;

/// Input that can be split into its first element and the remaining input.
///
/// Streams are immutable values: `uncons` never changes `self`, it hands back
/// a new stream for the tail. Cloning must be cheap because every parse step
/// that consumes produces a fresh [`State`](crate::state::State).
pub trait Stream: Clone + Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    /// Returns `None` at the end of input.
    fn uncons(&self, config: &Config) -> Option<(Self::Item, Self)>;

    fn is_end(&self, config: &Config) -> bool {
        self.uncons(config).is_none()
    }
}
