//! Vertex and fragment shader lookup by basename.
//!
//! Built-in WGSL sources are compiled into the binary; files found under the
//! shaders directory with the same basename take precedence.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::config::{files_with_extension, FileLayout};
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn extension(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vert",
            ShaderStage::Fragment => "frag",
        }
    }
}

pub const WAVE_GPU_VERT: &str = "wave_gpu.vert";
pub const WAVE_CPU_VERT: &str = "wave_cpu.vert";
pub const WAVE_FRAG: &str = "wave.frag";
pub const CLOUD_GPU_VERT: &str = "cloud_gpu.vert";
pub const CLOUD_CPU_VERT: &str = "cloud_cpu.vert";
pub const CLOUD_FRAG: &str = "cloud.frag";
pub const CRYSTAL_VERT: &str = "crystal.vert";
pub const CRYSTAL_FRAG: &str = "crystal.frag";

const BUILTIN: &[(&str, &str)] = &[
    (WAVE_GPU_VERT, include_str!("../shaders/wave_gpu.vert")),
    (WAVE_CPU_VERT, include_str!("../shaders/wave_cpu.vert")),
    (WAVE_FRAG, include_str!("../shaders/wave.frag")),
    (CLOUD_GPU_VERT, include_str!("../shaders/cloud_gpu.vert")),
    (CLOUD_CPU_VERT, include_str!("../shaders/cloud_cpu.vert")),
    (CLOUD_FRAG, include_str!("../shaders/cloud.frag")),
    (CRYSTAL_VERT, include_str!("../shaders/crystal.vert")),
    (CRYSTAL_FRAG, include_str!("../shaders/crystal.frag")),
];

/// Shader files discovered on disk, by stage and basename.
#[derive(Debug, Clone, Default)]
pub struct ShaderRegistry {
    vertex: BTreeMap<String, PathBuf>,
    fragment: BTreeMap<String, PathBuf>,
}

impl ShaderRegistry {
    /// Only the sources compiled into the crate.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Built-ins plus every `.vert` and `.frag` under `layout.shaders_dir`.
    pub fn discover(layout: &FileLayout) -> Self {
        let mut registry = Self::default();
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            for path in files_with_extension(&layout.shaders_dir, stage.extension()) {
                if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                    log::debug!("found {:?} shader {}", stage, path.display());
                    registry.table_mut(stage).insert(name.to_owned(), path.clone());
                }
            }
        }
        registry
    }

    fn table(&self, stage: ShaderStage) -> &BTreeMap<String, PathBuf> {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }

    fn table_mut(&mut self, stage: ShaderStage) -> &mut BTreeMap<String, PathBuf> {
        match stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Fragment => &mut self.fragment,
        }
    }

    /// Every basename available for `stage`, disk and built-in, sorted.
    pub fn names(&self, stage: ShaderStage) -> Vec<String> {
        let suffix = format!(".{}", stage.extension());
        let mut names: Vec<String> = BUILTIN
            .iter()
            .map(|(name, _)| name.to_string())
            .filter(|name| name.ends_with(&suffix))
            .chain(self.table(stage).keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn source(&self, stage: ShaderStage, name: &str) -> Result<Cow<'static, str>, ConfigError> {
        if let Some(path) = self.table(stage).get(name) {
            return fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                });
        }

        BUILTIN
            .iter()
            .find(|(builtin, _)| *builtin == name && builtin.ends_with(stage.extension()))
            .map(|(_, text)| Cow::Borrowed(*text))
            .ok_or_else(|| ConfigError::MissingShader(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sources() {
        let registry = ShaderRegistry::builtin();
        for (name, _) in BUILTIN {
            let stage = if name.ends_with(".vert") {
                ShaderStage::Vertex
            } else {
                ShaderStage::Fragment
            };
            assert!(registry.source(stage, name).is_ok(), "{name}");
        }
        assert!(matches!(
            registry.source(ShaderStage::Fragment, WAVE_GPU_VERT),
            Err(ConfigError::MissingShader(_))
        ));
    }

    #[test]
    fn test_disk_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let layout = FileLayout::new(dir.path());
        fs::create_dir_all(layout.shaders_dir.join("extra")).unwrap();
        fs::write(layout.shaders_dir.join(WAVE_FRAG), "// custom").unwrap();
        fs::write(layout.shaders_dir.join("extra").join("glow.frag"), "// glow").unwrap();

        let registry = ShaderRegistry::discover(&layout);
        assert_eq!(registry.source(ShaderStage::Fragment, WAVE_FRAG).unwrap(), "// custom");
        assert_eq!(registry.source(ShaderStage::Fragment, "glow.frag").unwrap(), "// glow");

        let names = registry.names(ShaderStage::Fragment);
        assert!(names.contains(&"glow.frag".to_string()));
        assert!(names.contains(&CLOUD_FRAG.to_string()));
        assert!(!names.contains(&WAVE_GPU_VERT.to_string()));
    }
}
