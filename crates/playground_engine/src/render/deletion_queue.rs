//! Ordered teardown ledger for GPU objects
//!
//! Every component that creates a Vulkan object registers the matching release
//! action here at creation time. [`DeletionQueue::flush`] plays the actions back
//! in reverse registration order, so whatever was created last is destroyed first
//! and no action can observe a handle that an earlier-executed action destroyed.
//!
//! The queue is flushed exactly once, by the engine, after a device idle-wait.

/// A release action: owns the handles it destroys, captured by value.
type ReleaseAction = Box<dyn FnOnce()>;

/// LIFO list of release actions
#[derive(Default)]
pub struct DeletionQueue {
    deletors: Vec<ReleaseAction>,
}

impl DeletionQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a release action to the tail of the queue
    pub fn push<F>(&mut self, action: F)
    where
        F: FnOnce() + 'static,
    {
        self.deletors.push(Box::new(action));
    }

    /// Create one object per input, queueing each object's release as soon as it exists
    ///
    /// Stops at the first failure. Everything created before it is already
    /// queued, so a later flush still releases it exactly once.
    pub fn create_each<I, T, E, C, R>(&mut self, inputs: I, mut create: C, release: R) -> Result<Vec<T>, E>
    where
        I: IntoIterator,
        T: Copy + 'static,
        C: FnMut(I::Item) -> Result<T, E>,
        R: Fn(T) + Clone + 'static,
    {
        let inputs = inputs.into_iter();
        let mut created = Vec::with_capacity(inputs.size_hint().0);

        for input in inputs {
            let object = create(input)?;
            let release = release.clone();
            self.push(move || release(object));
            created.push(object);
        }

        Ok(created)
    }

    /// Run every queued action tail-to-head, leaving the queue empty
    pub fn flush(&mut self) {
        let count = self.deletors.len();
        log::debug!("Flushing deletion queue ({} release actions)", count);

        while let Some(deletor) = self.deletors.pop() {
            deletor();
        }
    }

    /// Number of pending release actions
    pub fn len(&self) -> usize {
        self.deletors.len()
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.deletors.is_empty()
    }
}

impl Drop for DeletionQueue {
    fn drop(&mut self) {
        // Only reached with pending actions on the abort path. Running them here
        // would destroy objects the GPU may still be using, so they are dropped unexecuted.
        if !self.deletors.is_empty() {
            log::warn!(
                "Deletion queue dropped with {} release actions that were never executed",
                self.deletors.len()
            );
        }
    }
}

impl std::fmt::Debug for DeletionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionQueue")
            .field("pending", &self.deletors.len())
            .finish()
    }
}
