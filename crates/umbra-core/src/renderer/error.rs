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

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::renderer::api::{FramebufferStatus, ProgramId};
use std::fmt;

/// An error related to the loading, compilation, or linking of a GPU program.
#[derive(Debug)]
pub enum ShaderError {
    /// The source provider has no program with this name.
    SourceNotFound {
        /// The name that was looked up.
        name: String,
    },
    /// An error occurred while trying to load the shader source from a path.
    LoadError {
        /// The path of the file that failed to load.
        path: String,
        /// The underlying I/O or source error.
        source_error: String,
    },
    /// A stage failed to compile.
    CompilationError {
        /// The program label.
        label: String,
        /// Detailed error messages from the shader compiler.
        details: String,
    },
    /// The stages compiled but the program failed to link.
    LinkError {
        /// The program label.
        label: String,
        /// The linker log.
        details: String,
    },
    /// The requested program could not be found on the device.
    NotFound {
        /// The ID of the program that was not found.
        id: ProgramId,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::SourceNotFound { name } => {
                write!(f, "No shader source registered under '{name}'")
            }
            ShaderError::LoadError { path, source_error } => {
                write!(
                    f,
                    "Failed to load shader source from '{path}': {source_error}"
                )
            }
            ShaderError::CompilationError { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
            ShaderError::LinkError { label, details } => {
                write!(f, "Program linking failed for '{label}': {details}")
            }
            ShaderError::NotFound { id } => {
                write!(f, "Program not found for ID: {id:?}")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation or use of a GPU resource (textures, framebuffers, buffers).
#[derive(Debug)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A generic resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid or stale.
    InvalidHandle,
    /// A descriptor was rejected before anything was allocated.
    InvalidDescriptor(String),
    /// A framebuffer was used while not complete.
    IncompleteFramebuffer(FramebufferStatus),
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
    /// An attempt was made to access a resource out of its bounds (e.g., in a buffer).
    OutOfBounds,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::InvalidDescriptor(msg) => {
                write!(f, "Invalid resource descriptor: {msg}")
            }
            ResourceError::IncompleteFramebuffer(status) => {
                write!(f, "Framebuffer is not complete: {status}")
            }
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
            ResourceError::OutOfBounds => {
                write!(f, "Resource access out of bounds.")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

/// A high-level error that can occur while rendering a frame.
#[derive(Debug)]
pub enum RenderError {
    /// A draw was issued without a current program.
    NoProgramBound,
    /// A critical rendering operation failed.
    RenderingFailed(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// The graphics device was lost and needs to be reinitialized.
    DeviceLost,
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NoProgramBound => write!(f, "Draw call issued with no program bound."),
            RenderError::RenderingFailed(msg) => {
                write!(f, "A critical rendering operation failed: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::DeviceLost => write!(
                f,
                "The graphics device was lost and needs to be reinitialized."
            ),
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

impl From<ShaderError> for RenderError {
    fn from(err: ShaderError) -> Self {
        RenderError::ResourceError(ResourceError::Shader(err))
    }
}

/// An error raised while loading a [`VideoSettings`](crate::renderer::VideoSettings) profile.
#[derive(Debug)]
pub enum SettingsError {
    /// The settings file could not be read.
    Io(std::io::Error),
    /// The RON document was malformed.
    Parse(ron::error::SpannedError),
    /// The settings serializer failed.
    Serialize(ron::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(err) => write!(f, "Failed to read video settings: {err}"),
            SettingsError::Parse(err) => write!(f, "Malformed video settings: {err}"),
            SettingsError::Serialize(err) => {
                write!(f, "Failed to serialize video settings: {err}")
            }
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Io(err) => Some(err),
            SettingsError::Parse(err) => Some(err),
            SettingsError::Serialize(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for SettingsError {
    fn from(err: std::io::Error) -> Self {
        SettingsError::Io(err)
    }
}

impl From<ron::error::SpannedError> for SettingsError {
    fn from(err: ron::error::SpannedError) -> Self {
        SettingsError::Parse(err)
    }
}

impl From<ron::Error> for SettingsError {
    fn from(err: ron::Error) -> Self {
        SettingsError::Serialize(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::LoadError {
            path: "shaders/gbuffer.vert".to_string(),
            source_error: "File not found".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Failed to load shader source from 'shaders/gbuffer.vert': File not found"
        );

        let err_comp = ShaderError::CompilationError {
            label: "light_volume".to_string(),
            details: "Syntax error at line 5".to_string(),
        };
        assert_eq!(
            format!("{err_comp}"),
            "Shader compilation failed for 'light_volume': Syntax error at line 5"
        );
    }

    #[test]
    fn resource_error_display_wrapping_shader_error() {
        let shader_err = ShaderError::NotFound { id: ProgramId(42) };
        let res_err: ResourceError = shader_err.into();
        assert_eq!(
            format!("{res_err}"),
            "Shader resource error: Program not found for ID: ProgramId(42)"
        );
        assert!(res_err.source().is_some());
    }

    #[test]
    fn render_error_display_wrapping_resource_error() {
        let res_err = ResourceError::IncompleteFramebuffer(FramebufferStatus::MissingAttachment);
        let render_err: RenderError = res_err.into();
        assert_eq!(
            format!("{render_err}"),
            "Graphics resource operation failed: Framebuffer is not complete: no image is attached"
        );
        assert!(render_err.source().is_some());
    }
}
