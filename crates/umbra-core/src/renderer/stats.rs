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

//! Per-frame render statistics and an optional trace of passes and draws.

/// A collection of statistics for a single rendered frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// A sequential counter for rendered frames.
    pub frame_number: u64,
    /// The number of draw calls issued during the frame.
    pub draw_calls: u32,
    /// The total number of triangles submitted for the frame.
    pub triangles_rendered: u32,
    /// Shadow-map passes rendered (six per point light).
    pub shadow_passes: u32,
    /// Light volumes shaded by the deferred lighting pass.
    pub light_volumes: u32,
    /// Toolboxes alive in the collection used for the frame.
    pub toolboxes: u32,
}

/// One entry of a [`FrameTrace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A labelled pass started.
    PassBegin(String),
    /// The innermost open pass ended.
    PassEnd(String),
    /// A draw call, with the label of the program that issued it.
    Draw {
        /// Label of the current program.
        program: String,
        /// Triangles drawn (zero for lines).
        triangles: u32,
    },
}

/// A flat log of what one frame did, recorded when tracing is enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameTrace {
    /// The recorded events, in order.
    pub events: Vec<TraceEvent>,
}

impl FrameTrace {
    /// Labels of every pass begun, in order.
    pub fn passes(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::PassBegin(label) => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns `true` if a pass with `label` was begun.
    pub fn has_pass(&self, label: &str) -> bool {
        self.passes().contains(&label)
    }

    /// Program labels of the draws issued inside the first pass named `label`
    /// (nested passes included).
    pub fn draws_in(&self, label: &str) -> Vec<&str> {
        let mut draws = Vec::new();
        let mut depth = 0usize;
        let mut inside = false;
        for event in &self.events {
            match event {
                TraceEvent::PassBegin(l) if !inside && l == label => {
                    inside = true;
                    depth = 1;
                }
                TraceEvent::PassBegin(_) if inside => depth += 1,
                TraceEvent::PassEnd(_) if inside => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                TraceEvent::Draw { program, .. } if inside => draws.push(program.as_str()),
                _ => {}
            }
        }
        draws
    }

    /// Total draw events.
    pub fn draw_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, TraceEvent::Draw { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(program: &str) -> TraceEvent {
        TraceEvent::Draw {
            program: program.into(),
            triangles: 2,
        }
    }

    #[test]
    fn draws_in_includes_nested_passes() {
        let trace = FrameTrace {
            events: vec![
                TraceEvent::PassBegin("forward".into()),
                draw("flat"),
                TraceEvent::PassBegin("debug_lines".into()),
                draw("lines"),
                TraceEvent::PassEnd("debug_lines".into()),
                TraceEvent::PassEnd("forward".into()),
                TraceEvent::PassBegin("postprocess".into()),
                draw("tonemap"),
                TraceEvent::PassEnd("postprocess".into()),
            ],
        };
        assert_eq!(trace.draws_in("forward"), vec!["flat", "lines"]);
        assert_eq!(trace.passes(), vec!["forward", "debug_lines", "postprocess"]);
        assert!(!trace.has_pass("geometry"));
        assert_eq!(trace.draw_count(), 3);
    }
}
