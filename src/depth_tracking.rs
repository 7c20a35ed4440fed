use crate::{
    error::{Error, Result},
    MAX_DEPTH,
};

const UNBOUNDED: u64 = u64::MAX;

/// Tracks container nesting as elements stream through a codec.
///
/// Each known-length container pushes its remaining element count and is
/// popped automatically once enough elements have passed; end-sentinel
/// containers push an unbounded count and are closed by `early_end`. Depth is
/// capped at [`MAX_DEPTH`].
#[derive(Clone, Debug, Default)]
pub(crate) struct DepthTracker {
    tracking: Vec<u64>,
}

impl DepthTracker {
    /// Create a new depth tracker
    pub fn new() -> Self {
        Self {
            tracking: Vec::new(),
        }
    }

    /// Update the tracker for a scalar value or a field name.
    pub fn update_scalar(&mut self) {
        self.consume_one();
        self.purge_zeros();
    }

    /// Update the tracker for an array head. `None` is the end-sentinel
    /// framing, closed later by [`DepthTracker::early_end`].
    pub fn update_array(&mut self, len: Option<usize>) -> Result<()> {
        self.consume_one();
        self.tracking.push(len.map_or(UNBOUNDED, |n| n as u64));
        self.check_depth()?;
        self.purge_zeros();
        Ok(())
    }

    /// Update the tracker for an object head. Each entry contributes two
    /// elements, its field name and its value.
    pub fn update_object(&mut self, len: Option<usize>) -> Result<()> {
        self.consume_one();
        self.tracking
            .push(len.map_or(UNBOUNDED, |n| 2 * n as u64));
        self.check_depth()?;
        self.purge_zeros();
        Ok(())
    }

    /// Close an end-sentinel container before its count drains.
    pub fn early_end(&mut self) {
        self.tracking.pop();
        self.purge_zeros();
    }

    fn consume_one(&mut self) {
        if let Some(v) = self.tracking.last_mut() {
            *v = v.saturating_sub(1);
        }
    }

    fn check_depth(&self) -> Result<()> {
        if self.tracking.len() > MAX_DEPTH {
            return Err(Error::ParseLimit("Depth limit exceeded".to_string()));
        }
        Ok(())
    }

    /// Drop any depth tracking entries that have hit zero
    fn purge_zeros(&mut self) {
        while matches!(self.tracking.last(), Some(0)) {
            self.tracking.pop();
        }
    }
}
