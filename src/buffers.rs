use log::debug;

use crate::error::Result;
use crate::gpu::{BufferKind, RenderDevice};

pub const INITIAL_VERTEX_BUFFER_SIZE: u64 = 10_000;
pub const INITIAL_INDEX_BUFFER_SIZE: u64 = 2_000;
pub const INITIAL_UNIFORM_BUFFER_SIZE: u64 = 256;

/// Rounds up to the 4-byte alignment buffer writes need.
pub fn align_to_4(size: u64) -> u64 {
    (size + 3) & !3
}

/// Capacity a buffer grows to when `required` bytes no longer fit.
pub fn grown_capacity(required: u64) -> u64 {
    align_to_4(required + required / 2)
}

/// Buffers replaced while the GPU may still read them, tagged with the
/// submission that last could have used them.
pub struct RetireQueue<B> {
    pending: Vec<(u64, B)>,
}

impl<B> Default for RetireQueue<B> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<B> RetireQueue<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retire(&mut self, submission: u64, buffer: B) {
        self.pending.push((submission, buffer));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Destroys every buffer whose submission has completed.
    pub fn collect<D: RenderDevice<Buffer = B>>(&mut self, device: &mut D, completed: u64) -> usize {
        let mut released = 0;
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].0 <= completed {
                let (_, buffer) = self.pending.swap_remove(i);
                device.destroy_buffer(buffer);
                released += 1;
            } else {
                i += 1;
            }
        }
        released
    }

    pub fn drain<D: RenderDevice<Buffer = B>>(&mut self, device: &mut D) {
        for (_, buffer) in self.pending.drain(..) {
            device.destroy_buffer(buffer);
        }
    }
}

/// GPU buffer that is replaced by a larger one when a frame outgrows it.
pub struct GrowableBuffer<B> {
    kind: BufferKind,
    buffer: B,
    capacity: u64,
}

impl<B> GrowableBuffer<B> {
    pub fn new<D: RenderDevice<Buffer = B>>(device: &mut D, kind: BufferKind, capacity: u64) -> Result<Self> {
        let capacity = align_to_4(capacity);
        let buffer = device.create_buffer(kind, capacity)?;
        Ok(Self {
            kind,
            buffer,
            capacity,
        })
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Makes room for `required` bytes. The replaced buffer goes to `retired`
    /// and stays alive until the in-flight submission finishes.
    /// Returns whether the buffer was replaced.
    pub fn ensure_capacity<D: RenderDevice<Buffer = B>>(
        &mut self,
        device: &mut D,
        required: u64,
        retired: &mut RetireQueue<B>,
    ) -> Result<bool> {
        if required <= self.capacity {
            return Ok(false);
        }
        let capacity = grown_capacity(required);
        let buffer = device.create_buffer(self.kind, capacity)?;
        let old = std::mem::replace(&mut self.buffer, buffer);
        retired.retire(device.last_submission(), old);
        debug!(
            "{} grown {} -> {} bytes",
            self.kind.label(),
            self.capacity,
            capacity
        );
        self.capacity = capacity;
        Ok(true)
    }

    pub fn destroy<D: RenderDevice<Buffer = B>>(self, device: &mut D) {
        device.destroy_buffer(self.buffer);
    }
}
