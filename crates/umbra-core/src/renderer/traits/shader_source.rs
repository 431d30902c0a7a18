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

//! Where program sources come from.

use crate::renderer::api::ProgramSource;
use crate::renderer::error::ShaderError;
use std::collections::HashMap;

/// Resolves a program name to its source.
///
/// The pipeline asks for programs by name (`"gbuffer"`, `"light_volume"`, ...)
/// and injects its settings-derived defines afterwards.
pub trait ShaderSourceProvider {
    /// Returns the source of `name`.
    /// ## Errors
    /// * `ShaderError::SourceNotFound` if the provider has no such program.
    /// * `ShaderError::LoadError` if the source exists but could not be read.
    fn source(&self, name: &str) -> Result<ProgramSource, ShaderError>;
}

/// An in-memory provider.
///
/// With `fallback_to_builtin` enabled, unknown names resolve to
/// [`ProgramSource::builtin`], which is what devices with built-in programs
/// (the software rasterizer) expect.
#[derive(Debug, Default, Clone)]
pub struct MemoryShaderSource {
    sources: HashMap<String, ProgramSource>,
    fallback_to_builtin: bool,
}

impl MemoryShaderSource {
    /// An empty provider that fails on every lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that answers every name with a built-in program source.
    pub fn builtin() -> Self {
        Self {
            sources: HashMap::new(),
            fallback_to_builtin: true,
        }
    }

    /// Registers (or replaces) a source under its label.
    pub fn insert(&mut self, source: ProgramSource) {
        self.sources.insert(source.label.clone(), source);
    }
}

impl ShaderSourceProvider for MemoryShaderSource {
    fn source(&self, name: &str) -> Result<ProgramSource, ShaderError> {
        match self.sources.get(name) {
            Some(source) => Ok(source.clone()),
            None if self.fallback_to_builtin => Ok(ProgramSource::builtin(name)),
            None => Err(ShaderError::SourceNotFound {
                name: name.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_provider_reports_missing_source() {
        let provider = MemoryShaderSource::new();
        assert!(matches!(
            provider.source("gbuffer"),
            Err(ShaderError::SourceNotFound { .. })
        ));
    }

    #[test]
    fn builtin_provider_answers_every_name() {
        let mut provider = MemoryShaderSource::builtin();
        provider.insert(ProgramSource::new("custom", "v", "f"));
        assert_eq!(provider.source("custom").map(|s| s.vertex).ok(), Some("v".into()));
        assert_eq!(provider.source("tonemap").map(|s| s.label).ok(), Some("tonemap".into()));
    }
}
