//! Model buffers keyed by [`BufferName`].
//!
//! An entry is created on first upload, reallocated when new contents no
//! longer fit and written in place otherwise. Dropping an entry drops the
//! device handle, which releases the allocation.

use std::collections::BTreeMap;

use super::{BufferName, BufferRole, GraphicsDevice, UploadUsage};
use crate::error::RenderError;

/// How an upload was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOp {
    Created,
    InPlace,
    Realloc,
}

impl BufferOp {
    /// True when a new allocation was made.
    pub fn allocated(self) -> bool {
        !matches!(self, BufferOp::InPlace)
    }
}

#[derive(Debug)]
pub struct RenderResource<B> {
    pub buffer: B,
    /// Elements currently held.
    pub count: usize,
    /// Bytes allocated.
    pub capacity: u64,
    pub role: BufferRole,
    pub usage: UploadUsage,
}

impl<B> RenderResource<B> {
    pub fn size(&self) -> u64 {
        (self.count * self.role.stride()) as u64
    }
}

#[derive(Debug)]
pub struct BufferRegistry<B> {
    entries: BTreeMap<BufferName, RenderResource<B>>,
}

impl<B> Default for BufferRegistry<B> {
    fn default() -> Self {
        BufferRegistry {
            entries: BTreeMap::new(),
        }
    }
}

impl<B> BufferRegistry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: BufferName) -> Option<&RenderResource<B>> {
        self.entries.get(&name)
    }

    pub fn contains(&self, name: BufferName) -> bool {
        self.entries.contains_key(&name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes in use by `name`, zero when absent.
    pub fn size(&self, name: BufferName) -> u64 {
        self.get(name).map_or(0, RenderResource::size)
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            log::debug!("released {} buffers", self.entries.len());
        }
        self.entries.clear();
    }

    /// Pushes `contents` into the buffer called `name`.
    ///
    /// On failure the previous entry, if any, is left untouched.
    pub fn upload<D>(
        &mut self,
        device: &mut D,
        name: BufferName,
        role: BufferRole,
        usage: UploadUsage,
        contents: &[u8],
    ) -> Result<BufferOp, RenderError>
    where
        D: GraphicsDevice<Buffer = B>,
    {
        let count = contents.len() / role.stride();
        let bytes = contents.len() as u64;

        if let Some(entry) = self.entries.get_mut(&name) {
            if bytes <= entry.capacity && entry.role == role && entry.usage == usage {
                if !contents.is_empty() {
                    device.write_buffer(&entry.buffer, 0, contents);
                }
                entry.count = count;
                return Ok(BufferOp::InPlace);
            }
        }

        let op = if self.entries.contains_key(&name) {
            log::info!(
                "reallocating {name:?} buffer: {} -> {bytes} bytes",
                self.entries[&name].capacity
            );
            BufferOp::Realloc
        } else {
            log::info!("allocating {name:?} buffer of {bytes} bytes");
            BufferOp::Created
        };

        let buffer = device.create_buffer(name, role, usage, contents)?;
        self.entries.insert(
            name,
            RenderResource {
                buffer,
                count,
                capacity: bytes,
                role,
                usage,
            },
        );
        Ok(op)
    }
}
