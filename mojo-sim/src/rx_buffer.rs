pub mod error {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Overflow;
}

/// Fixed capacity ring of bytes received from the host.
pub struct RxBuffer<const N: usize> {
    buf: [u8; N],
    start_cursor: usize,
    size: usize,
}

impl<const N: usize> Default for RxBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RxBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            start_cursor: 0,
            size: 0,
        }
    }

    /// Ingest incoming bytes.
    ///
    /// Bytes up to the capacity are kept even
    /// when the remainder overflows.
    pub fn ingest(&mut self, src: &[u8]) -> Result<(), error::Overflow> {
        for &byte in src {
            if self.len() >= N {
                return Err(error::Overflow);
            }

            let write_cursor = self.end_cursor();
            self.buf[write_cursor] = byte;
            self.size += 1;
        }

        Ok(())
    }

    #[inline]
    fn wrap(cursor: usize) -> usize {
        cursor % N
    }

    #[inline]
    fn end_cursor(&self) -> usize {
        Self::wrap(self.start_cursor + self.len())
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        N
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        N - self.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the buffered bytes, oldest first.
    #[inline]
    pub fn iter(&self) -> RxBufferIter<'_, N> {
        RxBufferIter {
            parent: self,
            count: 0,
        }
    }

    /// Evict all bytes visited by the iterator
    /// the memento was captured from.
    #[inline]
    pub fn flush(&mut self, Memento(count): Memento) {
        let count = count.min(self.size);

        self.start_cursor = Self::wrap(self.start_cursor + count);
        self.size -= count;
    }
}

/// How far an [`RxBufferIter`] got, captured so
/// the visited bytes can be evicted afterwards.
pub struct Memento(usize);

pub struct RxBufferIter<'a, const N: usize> {
    parent: &'a RxBuffer<N>,
    count: usize,
}

impl<'a, const N: usize> RxBufferIter<'a, N> {
    #[inline]
    pub fn capture(self) -> Memento {
        Memento(self.count)
    }
}

impl<'a, const N: usize> Iterator for RxBufferIter<'a, N> {
    type Item = &'a u8;

    fn next(&mut self) -> Option<Self::Item> {
        if self.count >= self.parent.len() {
            return None;
        }

        let cursor = RxBuffer::<N>::wrap(self.parent.start_cursor + self.count);
        self.count += 1;

        Some(&self.parent.buf[cursor])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.parent.len() - self.count;

        (remaining, Some(remaining))
    }
}
