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

//! GPU program sources and uniform values.

use crate::math::{Mat3, Mat4, Vec2, Vec3, Vec4};

/// An opaque handle to a linked GPU program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub usize);

/// The source of a GPU program, plus the preprocessor defines injected at compile time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgramSource {
    /// The program name. Software devices select their built-in programs by label.
    pub label: String,
    /// Vertex stage source.
    pub vertex: String,
    /// Fragment stage source.
    pub fragment: String,
    /// Optional geometry stage source (layered rendering into cube maps).
    pub geometry: Option<String>,
    /// `#define NAME VALUE` pairs inserted after the `#version` line of every stage.
    pub defines: Vec<(String, String)>,
}

impl ProgramSource {
    /// A program with sources, no geometry stage and no defines.
    pub fn new(
        label: impl Into<String>,
        vertex: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
            geometry: None,
            defines: Vec::new(),
        }
    }

    /// A program known only by label, for devices that ship built-in programs.
    pub fn builtin(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Adds or replaces a define.
    pub fn with_define(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.set_define(name, value);
        self
    }

    /// Adds or replaces a define in place.
    pub fn set_define(&mut self, name: impl Into<String>, value: impl ToString) {
        let name = name.into();
        let value = value.to_string();
        match self.defines.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.defines.push((name, value)),
        }
    }

    /// Looks up a define.
    pub fn define(&self, name: &str) -> Option<&str> {
        self.defines
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `stage` with the defines inserted after its `#version` directive
    /// (or at the top when it has none).
    pub fn preprocess(&self, stage: &str) -> String {
        let block: String = self
            .defines
            .iter()
            .map(|(name, value)| format!("#define {name} {value}\n"))
            .collect();
        let split = stage
            .lines()
            .next()
            .filter(|first| first.trim_start().starts_with("#version"))
            .map(|first| first.len() + 1)
            .unwrap_or(0)
            .min(stage.len());
        let (head, tail) = stage.split_at(split);
        let mut out = String::with_capacity(stage.len() + block.len() + 1);
        out.push_str(head);
        if !head.is_empty() && !head.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&block);
        out.push_str(tail);
        out
    }
}

/// A value uploaded to a named uniform of the current program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue<'a> {
    /// `int` or `sampler*` unit.
    Int(i32),
    /// `bool`, uploaded as an int.
    Bool(bool),
    /// `float`.
    Float(f32),
    /// `vec2`.
    Vec2(Vec2),
    /// `vec3`.
    Vec3(Vec3),
    /// `vec4`.
    Vec4(Vec4),
    /// `mat3`.
    Mat3(Mat3),
    /// `mat4`.
    Mat4(Mat4),
    /// `float[]`.
    FloatArray(&'a [f32]),
    /// `vec3[]`.
    Vec3Array(&'a [Vec3]),
    /// `mat4[]`.
    Mat4Array(&'a [Mat4]),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defines_follow_version_line() {
        let source = ProgramSource::new("ssao", "", "")
            .with_define("KERNEL_SIZE", 16)
            .with_define("KERNEL_SIZE", 32);
        let out = source.preprocess("#version 330 core\nvoid main() {}\n");
        assert_eq!(
            out,
            "#version 330 core\n#define KERNEL_SIZE 32\nvoid main() {}\n"
        );
    }

    #[test]
    fn defines_go_first_without_version() {
        let source = ProgramSource::builtin("flat").with_define("UNLIT", 1);
        assert_eq!(source.preprocess("void main() {}"), "#define UNLIT 1\nvoid main() {}");
        assert_eq!(source.define("UNLIT"), Some("1"));
    }
}
