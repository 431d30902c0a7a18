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

//! Errors raised while building or managing toolboxes.

use crate::toolbox::ToolboxKind;
use thiserror::Error;
use umbra_core::renderer::ResourceError;

/// An error raised by a [`RenderToolboxCollection`](crate::toolbox::RenderToolboxCollection).
#[derive(Debug, Error)]
pub enum ToolboxError {
    /// A second toolbox of a kind already present was offered.
    #[error("a {0:?} toolbox is already present in the collection")]
    Duplicate(ToolboxKind),
    /// A toolbox shares resources with another one that has not been built.
    #[error("the {kind:?} toolbox needs the {dependency:?} toolbox, which is not present")]
    MissingDependency {
        /// The toolbox being built.
        kind: ToolboxKind,
        /// The toolbox it depends on.
        dependency: ToolboxKind,
    },
    /// Allocating a GPU resource failed.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}
