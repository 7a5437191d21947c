//! Running count and sum of every accepted request.
//!
//! [`Aggregate`] holds no lock of its own.  It lives inside the
//! [`crate::registry::ClientRegistry`] critical section, which is the only
//! place it is ever mutated, so the count and the sum always move together.

/// Global aggregate over all distinct requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Aggregate {
    /// Number of distinct requests applied.
    pub request_count: u32,
    /// Sum of the values of all distinct requests.
    pub total_sum: u64,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one request value into the aggregate.
    ///
    /// Wraps on overflow rather than panicking.
    pub fn apply(&mut self, value: u32) {
        self.request_count = self.request_count.wrapping_add(1);
        self.total_sum = self.total_sum.wrapping_add(u64::from(value));
    }
}
