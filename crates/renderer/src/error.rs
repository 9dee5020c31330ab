use thiserror::Error;

use crate::types::{ResourceHandle, ResourceKind};

/// Why presenting to the output surface failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceLoss {
    /// The swapchain must be reconfigured before the next frame.
    Lost,
    Outdated,
    Timeout,
    OutOfMemory,
    Other,
}

impl SurfaceLoss {
    /// Whether reconfiguring the surface at its current size recovers.
    pub fn needs_reconfigure(self) -> bool {
        matches!(self, SurfaceLoss::Lost | SurfaceLoss::Outdated)
    }

    pub fn is_fatal(self) -> bool {
        matches!(self, SurfaceLoss::OutOfMemory)
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to acquire {kind:?} '{label}': {reason}")]
    ResourceAcquisition {
        kind: ResourceKind,
        label: String,
        reason: String,
    },
    #[error("background texture failed to load: {0}")]
    AsyncLoad(String),
    #[error("surface error: {0:?}")]
    Surface(SurfaceLoss),
    #[error("viewport has zero area ({width}x{height})")]
    DegenerateViewport { width: u32, height: u32 },
    #[error("unknown or released resource {0:?}")]
    UnknownResource(ResourceHandle),
    #[error("device error: {0}")]
    Device(String),
}

impl RenderError {
    pub fn acquisition(kind: ResourceKind, label: &str, reason: impl ToString) -> Self {
        RenderError::ResourceAcquisition {
            kind,
            label: label.to_string(),
            reason: reason.to_string(),
        }
    }
}
