//! Snapshot of camera and buffer state reported to whatever shows it.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AtomixInfo {
    pub camera_pos: [f32; 3],
    pub near: f32,
    pub far: f32,
    /// Time since the controller was created.
    pub start: Duration,
    pub vertex_bytes: u64,
    pub data_bytes: u64,
    pub index_bytes: u64,
    /// Worker results thrown away as stale or inconsistent.
    pub discarded_results: u64,
}

/// Receives an [`AtomixInfo`] whenever a buffer is resized, the camera moves
/// or a worker result is discarded.
pub trait TelemetrySink {
    fn report(&mut self, info: &AtomixInfo);
}

impl<F> TelemetrySink for F
where
    F: FnMut(&AtomixInfo),
{
    fn report(&mut self, info: &AtomixInfo) {
        self(info)
    }
}

/// Writes every report to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn report(&mut self, info: &AtomixInfo) {
        log::info!(
            "camera ({:.2}, {:.2}, {:.2}) near {} far {} | buffers v {} B, d {} B, i {} B | discarded {} | {:.1?}",
            info.camera_pos[0],
            info.camera_pos[1],
            info.camera_pos[2],
            info.near,
            info.far,
            info.vertex_bytes,
            info.data_bytes,
            info.index_bytes,
            info.discarded_results,
            info.start,
        );
    }
}
