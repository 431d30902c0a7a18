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

//! # Umbra Core
//!
//! Foundational crate containing the GPU contracts, scene data types, and
//! settings shared by the Umbra frame-rendering pipeline.
//!
//! This crate only describes *what* the renderer talks to: the
//! [`renderer::GraphicsDevice`] trait, the descriptors and state it accepts,
//! the light and probe data it consumes, and the [`renderer::VideoSettings`]
//! profile that decides which GPU resources exist. The pipeline itself lives
//! in `umbra-lanes` and concrete devices in `umbra-infra`.

#![warn(missing_docs)]

pub mod math;
pub mod renderer;
