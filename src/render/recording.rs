//! Headless [`GraphicsDevice`] that records what it is asked to do.
//!
//! Clones share one log, so a test can keep a handle while the controller
//! owns the device.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{BufferName, BufferRole, DrawCall, GraphicsDevice, ProgramDesc, SceneUniforms, Topology, UploadUsage};
use crate::error::RenderError;

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    CreateBuffer {
        id: u64,
        name: BufferName,
        role: BufferRole,
        usage: UploadUsage,
        bytes: u64,
    },
    WriteBuffer {
        id: u64,
        name: BufferName,
        offset: u64,
        bytes: u64,
    },
    ReleaseBuffer {
        id: u64,
        name: BufferName,
    },
    CreateProgram {
        id: u64,
        label: String,
        vert: String,
        frag: String,
    },
    ReleaseProgram {
        id: u64,
        label: String,
    },
    WriteUniforms,
    BeginFrame,
    Draw {
        program: String,
        topology: Topology,
        index_count: u32,
        vertices: u64,
    },
    EndFrame,
}

#[derive(Debug, Default)]
struct Recording {
    events: Vec<DeviceEvent>,
    contents: HashMap<u64, (BufferName, Vec<u8>)>,
    uniforms: Option<SceneUniforms>,
    next_id: u64,
    failing_allocations: u32,
}

impl Recording {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingDevice {
    shared: Arc<Mutex<Recording>>,
}

#[derive(Debug)]
pub struct RecordedBuffer {
    id: u64,
    name: BufferName,
    shared: Arc<Mutex<Recording>>,
}

impl RecordedBuffer {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for RecordedBuffer {
    fn drop(&mut self) {
        let mut recording = self.shared.lock();
        recording.contents.remove(&self.id);
        recording.events.push(DeviceEvent::ReleaseBuffer {
            id: self.id,
            name: self.name,
        });
    }
}

#[derive(Debug)]
pub struct RecordedProgram {
    id: u64,
    label: String,
    topology: Topology,
    shared: Arc<Mutex<Recording>>,
}

impl Drop for RecordedProgram {
    fn drop(&mut self) {
        self.shared.lock().events.push(DeviceEvent::ReleaseProgram {
            id: self.id,
            label: std::mem::take(&mut self.label),
        });
    }
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` buffer allocations fail with `ResourceExhausted`.
    pub fn fail_next_allocations(&self, count: u32) {
        self.shared.lock().failing_allocations = count;
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.shared.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.shared.lock().events.clear();
    }

    /// Contents of the live buffer called `name`.
    pub fn contents(&self, name: BufferName) -> Option<Vec<u8>> {
        let recording = self.shared.lock();
        recording
            .contents
            .iter()
            .filter(|(_, (n, _))| *n == name)
            .max_by_key(|(id, _)| **id)
            .map(|(_, (_, bytes))| bytes.clone())
    }

    pub fn uniforms(&self) -> Option<SceneUniforms> {
        self.shared.lock().uniforms
    }

    pub fn created(&self, name: BufferName) -> usize {
        self.count(|e| matches!(e, DeviceEvent::CreateBuffer { name: n, .. } if *n == name))
    }

    pub fn released(&self, name: BufferName) -> usize {
        self.count(|e| matches!(e, DeviceEvent::ReleaseBuffer { name: n, .. } if *n == name))
    }

    /// Draw calls issued with the program labelled `label`.
    pub fn draws(&self, label: &str) -> usize {
        self.count(|e| matches!(e, DeviceEvent::Draw { program, .. } if program == label))
    }

    pub fn frames(&self) -> usize {
        self.count(|e| matches!(e, DeviceEvent::EndFrame))
    }

    pub fn live_buffers(&self) -> usize {
        self.shared.lock().contents.len()
    }

    fn count(&self, predicate: impl Fn(&DeviceEvent) -> bool) -> usize {
        self.shared.lock().events.iter().filter(|e| predicate(e)).count()
    }
}

impl GraphicsDevice for RecordingDevice {
    type Buffer = RecordedBuffer;
    type Program = RecordedProgram;

    fn create_buffer(
        &mut self,
        name: BufferName,
        role: BufferRole,
        usage: UploadUsage,
        contents: &[u8],
    ) -> Result<RecordedBuffer, RenderError> {
        let mut recording = self.shared.lock();
        if recording.failing_allocations > 0 {
            recording.failing_allocations -= 1;
            return Err(RenderError::ResourceExhausted {
                name,
                bytes: contents.len() as u64,
            });
        }

        let id = recording.next_id();
        recording.contents.insert(id, (name, contents.to_vec()));
        recording.events.push(DeviceEvent::CreateBuffer {
            id,
            name,
            role,
            usage,
            bytes: contents.len() as u64,
        });
        Ok(RecordedBuffer {
            id,
            name,
            shared: Arc::clone(&self.shared),
        })
    }

    fn write_buffer(&mut self, buffer: &RecordedBuffer, offset: u64, contents: &[u8]) {
        let mut recording = self.shared.lock();
        if let Some((_, bytes)) = recording.contents.get_mut(&buffer.id) {
            let start = offset as usize;
            let end = start + contents.len();
            if bytes.len() < end {
                bytes.resize(end, 0);
            }
            bytes[start..end].copy_from_slice(contents);
        }
        recording.events.push(DeviceEvent::WriteBuffer {
            id: buffer.id,
            name: buffer.name,
            offset,
            bytes: contents.len() as u64,
        });
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<RecordedProgram, RenderError> {
        if desc.vert_source.trim().is_empty() || desc.frag_source.trim().is_empty() {
            return Err(RenderError::Program {
                vert: desc.vert_name.to_owned(),
                frag: desc.frag_name.to_owned(),
                reason: "empty shader source".to_owned(),
            });
        }

        let mut recording = self.shared.lock();
        let id = recording.next_id();
        recording.events.push(DeviceEvent::CreateProgram {
            id,
            label: desc.label.to_owned(),
            vert: desc.vert_name.to_owned(),
            frag: desc.frag_name.to_owned(),
        });
        Ok(RecordedProgram {
            id,
            label: desc.label.to_owned(),
            topology: desc.topology,
            shared: Arc::clone(&self.shared),
        })
    }

    fn write_uniforms(&mut self, uniforms: &SceneUniforms) {
        let mut recording = self.shared.lock();
        recording.uniforms = Some(*uniforms);
        recording.events.push(DeviceEvent::WriteUniforms);
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        self.shared.lock().events.push(DeviceEvent::BeginFrame);
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_, RecordedBuffer, RecordedProgram>) {
        self.shared.lock().events.push(DeviceEvent::Draw {
            program: call.program.label.clone(),
            topology: call.program.topology,
            index_count: call.index_count,
            vertices: call.vertices.id,
        });
    }

    fn end_frame(&mut self) {
        self.shared.lock().events.push(DeviceEvent::EndFrame);
    }
}
