//! Per-frame diagnostics
//!
//! Binding misses and failed dispatches never abort a frame. Each occurrence is
//! collected into the frame's [`FrameReport`]; the log output is rate limited so
//! a persistent miss is warned about once and then reported at debug level.

use compute_pipeline_doc::{BindingSlot, Dimension};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    /// The slot's texture is not in the registry; the unit was left unbound
    TextureNotFound,
    /// An auxiliary role names a texture of the wrong dimensionality; the unit was left unbound
    RoleDimensionMismatch { expected: Dimension, actual: Dimension },
    /// The backend refused the dispatch
    DispatchFailed(String),
}

/// One non-fatal problem observed while running a pass
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub pass: String,
    /// Binding concerned, absent for dispatch failures
    pub slot: Option<BindingSlot>,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    /// Texture name the diagnostic concerns, if any
    pub fn texture(&self) -> Option<&str> {
        self.slot.as_ref().map(|slot| slot.texture.as_str())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.slot) {
            (DiagnosticKind::TextureNotFound, Some(slot)) => {
                write!(f, "pass \"{}\": could not find texture \"{}\" for {} unit {}", self.pass, slot.texture, slot.class, slot.unit)
            }
            (DiagnosticKind::RoleDimensionMismatch { expected, actual }, Some(slot)) => write!(
                f,
                "pass \"{}\": {} needs a {expected} texture but \"{}\" is {actual}",
                self.pass, slot.uniform, slot.texture
            ),
            (DiagnosticKind::DispatchFailed(reason), _) => write!(f, "pass \"{}\": dispatch failed: {reason}", self.pass),
            (kind, None) => write!(f, "pass \"{}\": {kind:?}", self.pass),
        }
    }
}

/// Outcome of one `run_frame` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub frame_index: u32,
    /// Passes whose dispatch was issued and accepted
    pub dispatched: usize,
    /// Passes skipped because their program failed to compile
    pub skipped: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FrameReport {
    /// True when every pass dispatched and every binding resolved
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.diagnostics.is_empty()
    }

    /// Names of textures that could not be found, one entry per occurrence
    pub fn missing_textures(&self) -> impl Iterator<Item = &str> {
        self.diagnostics.iter().filter(|d| d.kind == DiagnosticKind::TextureNotFound).filter_map(Diagnostic::texture)
    }
}

/// Remembers which problems were already warned about
#[derive(Debug, Default)]
pub(crate) struct DiagnosticLog {
    seen: HashSet<String>,
}

impl DiagnosticLog {
    pub fn emit(&mut self, diagnostic: &Diagnostic) {
        if self.seen.insert(diagnostic.to_string()) {
            tracing::warn!(pass = %diagnostic.pass, "{diagnostic}");
        } else {
            tracing::debug!(pass = %diagnostic.pass, "{diagnostic}");
        }
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}
