//! What the frame loop still has to push to the device.

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StateFlags: u32 {
        const WAVE_MODE          = 1 << 0;
        const CLOUD_MODE         = 1 << 1;
        const WAVE_RENDER        = 1 << 2;
        const CLOUD_RENDER       = 1 << 3;
        const UPD_VBO            = 1 << 4;
        const UPD_DATA           = 1 << 5;
        const UPD_EBO            = 1 << 6;
        const UPD_VERT_SHADER    = 1 << 7;
        const UPD_FRAG_SHADER    = 1 << 8;
        const UPD_MATHS_UNIFORMS = 1 << 9;
        const UPD_COLOR_UNIFORMS = 1 << 10;
        const UPD_MATRICES       = 1 << 11;
        const UPDATE_REQUIRED    = 1 << 12;
        const THREAD_FINISHED    = 1 << 13;

        const MODES = Self::WAVE_MODE.bits() | Self::CLOUD_MODE.bits()
            | Self::WAVE_RENDER.bits() | Self::CLOUD_RENDER.bits();
        const BUFFERS = Self::UPD_VBO.bits() | Self::UPD_DATA.bits() | Self::UPD_EBO.bits();
        const SHADERS = Self::UPD_VERT_SHADER.bits() | Self::UPD_FRAG_SHADER.bits();
        const UNIFORMS = Self::UPD_MATHS_UNIFORMS.bits() | Self::UPD_COLOR_UNIFORMS.bits()
            | Self::UPD_MATRICES.bits();
        const UPDATES = Self::BUFFERS.bits() | Self::SHADERS.bits() | Self::UNIFORMS.bits()
            | Self::UPDATE_REQUIRED.bits();
    }
}

/// Which generator owns the render path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Wave,
    Cloud,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Wave => "wave",
            Mode::Cloud => "cloud",
        }
    }

    fn mode_bit(self) -> StateFlags {
        match self {
            Mode::Wave => StateFlags::WAVE_MODE,
            Mode::Cloud => StateFlags::CLOUD_MODE,
        }
    }

    fn render_bit(self) -> StateFlags {
        match self {
            Mode::Wave => StateFlags::WAVE_RENDER,
            Mode::Cloud => StateFlags::CLOUD_RENDER,
        }
    }
}

impl StateFlags {
    pub fn mode(self) -> Option<Mode> {
        if self.contains(StateFlags::WAVE_MODE) {
            Some(Mode::Wave)
        } else if self.contains(StateFlags::CLOUD_MODE) {
            Some(Mode::Cloud)
        } else {
            None
        }
    }

    /// Switches to `mode`, dropping the other mode and both render bits.
    pub fn enter_mode(&mut self, mode: Mode) {
        self.remove(StateFlags::MODES);
        self.insert(mode.mode_bit());
    }

    /// Marks the active mode as drawable. No-op without a mode.
    pub fn enable_render(&mut self) {
        if let Some(mode) = self.mode() {
            self.insert(mode.render_bit());
        }
    }

    pub fn is_rendering(self) -> bool {
        self.intersects(StateFlags::WAVE_RENDER | StateFlags::CLOUD_RENDER)
    }

    pub fn clear_mode(&mut self) {
        self.remove(StateFlags::MODES);
    }

    /// Mode exclusivity and render-implies-mode.
    pub fn is_consistent(self) -> bool {
        let both = self.contains(StateFlags::WAVE_MODE | StateFlags::CLOUD_MODE);
        let orphan_wave = self.contains(StateFlags::WAVE_RENDER) && !self.contains(StateFlags::WAVE_MODE);
        let orphan_cloud = self.contains(StateFlags::CLOUD_RENDER) && !self.contains(StateFlags::CLOUD_MODE);
        !(both || orphan_wave || orphan_cloud)
    }
}
