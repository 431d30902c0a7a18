// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! GLSL sources read from a directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use umbra_core::renderer::{ProgramSource, ShaderError, ShaderSourceProvider};

/// Reads `<root>/<name>.vert`, `<root>/<name>.frag` and, when present,
/// `<root>/<name>.geom`.
///
/// Files are read on every lookup so that edited sources are picked up the
/// next time the pipeline rebuilds its toolboxes.
#[derive(Debug, Clone)]
pub struct FsShaderSource {
    root: PathBuf,
}

impl FsShaderSource {
    /// A provider reading from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory sources are read from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stage_path(&self, name: &str, extension: &str) -> PathBuf {
        self.root.join(format!("{name}.{extension}"))
    }

    /// Reads one stage. `Ok(None)` when the file does not exist.
    fn read_stage(&self, name: &str, extension: &str) -> Result<Option<String>, ShaderError> {
        let path = self.stage_path(name, extension);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ShaderError::LoadError {
                path: path.display().to_string(),
                source_error: err.to_string(),
            }),
        }
    }
}

impl ShaderSourceProvider for FsShaderSource {
    fn source(&self, name: &str) -> Result<ProgramSource, ShaderError> {
        let vertex = self.read_stage(name, "vert")?;
        let fragment = self.read_stage(name, "frag")?;
        let (vertex, fragment) = match (vertex, fragment) {
            (Some(vertex), Some(fragment)) => (vertex, fragment),
            (None, None) => {
                return Err(ShaderError::SourceNotFound {
                    name: name.to_string(),
                })
            }
            (vertex, _) => {
                let missing = if vertex.is_none() { "vert" } else { "frag" };
                return Err(ShaderError::LoadError {
                    path: self.stage_path(name, missing).display().to_string(),
                    source_error: "stage file is missing".to_string(),
                });
            }
        };
        log::debug!("Loaded program '{name}' from {}", self.root.display());
        Ok(ProgramSource {
            geometry: self.read_stage(name, "geom")?,
            ..ProgramSource::new(name, vertex, fragment)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tonemap.vert"), "#version 330 core\nvoid main() {}\n").unwrap();
        fs::write(dir.path().join("tonemap.frag"), "#version 330 core\nout vec4 c;\n").unwrap();
        let provider = FsShaderSource::new(dir.path());
        let source = provider.source("tonemap").unwrap();
        assert_eq!(source.label, "tonemap");
        assert!(source.fragment.contains("out vec4 c;"));
        assert!(source.geometry.is_none());
        assert!(source.defines.is_empty());
    }

    #[test]
    fn geometry_stage_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        for ext in ["vert", "frag", "geom"] {
            fs::write(dir.path().join(format!("shadow_linear_depth.{ext}")), ext).unwrap();
        }
        let source = FsShaderSource::new(dir.path()).source("shadow_linear_depth").unwrap();
        assert_eq!(source.geometry.as_deref(), Some("geom"));
    }

    #[test]
    fn unknown_programs_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsShaderSource::new(dir.path()).source("gbuffer").unwrap_err();
        assert!(matches!(err, ShaderError::SourceNotFound { name } if name == "gbuffer"));
    }

    #[test]
    fn half_a_program_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("copy.vert"), "v").unwrap();
        let err = FsShaderSource::new(dir.path()).source("copy").unwrap_err();
        assert!(matches!(err, ShaderError::LoadError { path, .. } if path.ends_with("copy.frag")));
    }
}
