/// Fixed-capacity FIFO over a backing array with read/write/count indices.
///
/// Pushing into a full buffer is refused rather than overwriting, which is
/// how the 8042 output queues behave: bytes produced while the guest is not
/// draining are lost.
#[derive(Debug, Clone)]
pub struct RingBuffer<T, const N: usize> {
    data: [T; N],
    read: usize,
    write: usize,
    count: usize,
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    /// Create a buffer with every slot set to `value`. Usable in statics.
    #[inline(always)]
    pub const fn new_with(value: T) -> Self {
        Self {
            data: [value; N],
            read: 0,
            write: 0,
            count: 0,
        }
    }

    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline(always)]
    pub const fn is_full(&self) -> bool {
        self.count >= N
    }

    /// Slots still available.
    #[inline(always)]
    pub const fn free(&self) -> usize {
        N - self.count
    }

    /// Forget all queued elements. Slot contents are kept, so
    /// [`pop_or_last`](Self::pop_or_last) keeps replaying the last byte.
    #[inline(always)]
    pub fn reset(&mut self) {
        self.read = self.write;
        self.count = 0;
    }

    /// Push without overwrite; returns false (and drops `value`) when full.
    #[inline(always)]
    pub fn push(&mut self, value: T) -> bool {
        if self.is_full() {
            return false;
        }
        self.data[self.write] = value;
        self.write = (self.write + 1) % N;
        self.count += 1;
        true
    }

    /// Pop the oldest element.
    #[inline(always)]
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.data[self.read];
        self.read = (self.read + 1) % N;
        self.count -= 1;
        Some(value)
    }

    /// Pop the oldest element, or repeat the most recently popped one when
    /// empty.
    #[inline(always)]
    pub fn pop_or_last(&mut self) -> T {
        match self.pop() {
            Some(value) => value,
            None => self.data[(self.read + N - 1) % N],
        }
    }

    #[inline(always)]
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        Some(&self.data[self.read])
    }
}

impl<T: Copy + Default, const N: usize> RingBuffer<T, N> {
    #[inline(always)]
    pub fn new() -> Self {
        Self::new_with(T::default())
    }
}

impl<T: Copy + Default, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
