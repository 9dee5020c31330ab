use std::fmt;
use std::str::FromStr;

/// Category of a GPU-side object owned by a surface or pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Geometry,
    Program,
    UniformBuffer,
    Texture,
    PostChain,
}

/// Opaque reference to one device resource.
///
/// Ids are never reused by a device, so a stale handle cannot alias a newer
/// resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceHandle {
    kind: ResourceKind,
    id: u64,
}

impl ResourceHandle {
    pub fn new(kind: ResourceKind, id: u64) -> Self {
        Self { kind, id }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Primitive a render surface draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    FullScreenQuad,
    Ring,
    SphereShell,
    SphereCore,
}

/// Which of the two pipelines is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderMode {
    /// Full-screen distortion of the background.
    Flat,
    /// Composited surfaces with orbit camera and bloom.
    #[default]
    Orbit,
}

impl RenderMode {
    pub fn other(self) -> Self {
        match self {
            RenderMode::Flat => RenderMode::Orbit,
            RenderMode::Orbit => RenderMode::Flat,
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMode::Flat => f.write_str("2D"),
            RenderMode::Orbit => f.write_str("3D"),
        }
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "2d" | "flat" => Ok(RenderMode::Flat),
            "3d" | "orbit" => Ok(RenderMode::Orbit),
            other => Err(format!("unknown mode '{other}'; expected 2d or 3d")),
        }
    }
}

/// Options of the single parameterised 2D pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Sample a background panorama; otherwise draw a procedural star field.
    pub texture_backed: bool,
    /// Allow the annotation list to be shown.
    pub annotations: bool,
    /// Honour the playback-speed parameter; otherwise time runs at 1x.
    pub speed_controllable: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            texture_backed: true,
            annotations: true,
            speed_controllable: true,
        }
    }
}

/// MSAA request for the scene pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the target formats.
    #[default]
    Auto,
    Off,
    /// Request a specific sample count (clamped to what the device supports).
    Samples(u32),
}

/// Colour blending of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Opaque,
    /// `dst + src * alpha`; layers composite instead of occluding.
    Additive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceCulling {
    None,
    Back,
    Front,
}

/// Where a program's output lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorTarget {
    /// Straight to the swapchain.
    Surface,
    /// The HDR scene target consumed by the post chain.
    Hdr,
}

/// Shader program variants, one per surface role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    BackgroundLens,
    HorizonCore,
    PhotonShell,
    AccretionDisk,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDescriptor {
    pub kind: ProgramKind,
    pub blend: BlendMode,
    pub culling: FaceCulling,
    pub depth_write: bool,
    pub target: ColorTarget,
}

/// Decoded RGBA8 image ready for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl fmt::Debug for TextureData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureData")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

/// Bloom and tone-mapping settings of the 3D post chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostSettings {
    pub bloom_intensity: f32,
    pub luminance_threshold: f32,
    pub luminance_smoothing: f32,
    pub exposure: f32,
}

impl Default for PostSettings {
    fn default() -> Self {
        Self {
            bloom_intensity: 2.0,
            luminance_threshold: 0.1,
            luminance_smoothing: 0.9,
            exposure: 1.5,
        }
    }
}

/// Clear colour of the 3D scene (`#000008`).
pub const SCENE_BACKGROUND: [f32; 4] = [0.0, 0.0, 8.0 / 255.0, 1.0];
pub const FLAT_BACKGROUND: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_and_displays() {
        assert_eq!("2D".parse::<RenderMode>(), Ok(RenderMode::Flat));
        assert_eq!(" 3d ".parse::<RenderMode>(), Ok(RenderMode::Orbit));
        assert!("4d".parse::<RenderMode>().is_err());
        assert_eq!(RenderMode::Flat.to_string(), "2D");
        assert_eq!(RenderMode::default(), RenderMode::Orbit);
        assert_eq!(RenderMode::Flat.other(), RenderMode::Orbit);
    }
}
