//! GLSL 450 sources for the surface programs and the bloom chain.
//!
//! Every surface program shares one uniform block whose layout mirrors
//! [`SurfaceUniforms`](crate::bridge::SurfaceUniforms). The lensing helpers
//! reimplement `lensing::kernel`; keep both in step.

use crate::types::ProgramKind;

const VERSION: &str = "#version 450\n";

const SURFACE_BLOCK: &str = r"
layout(std140, set = 0, binding = 0) uniform SurfaceParams {
    mat4 view_projection;
    mat4 model;
    vec4 camera_position;
    vec4 resolution;
    vec4 color;
    vec4 params;
    vec4 background;
    vec4 lens;
    vec4 shape;
} ubo;
";

const BACKGROUND_BINDINGS: &str = r"
layout(set = 1, binding = 0) uniform texture2D background_texture;
layout(set = 1, binding = 1) uniform sampler background_sampler;
";

// ubo.lens: critical radius, fade-out radius, gain, warp gain.
// ubo.shape: minimum sample radius, disk inner radius, disk outer radius.
const LENS_FUNCTIONS: &str = r"
float lens_magnitude(float radius, float strength) {
    float r = max(radius, ubo.shape.x);
    float rc = ubo.lens.x;
    float window = 1.0 - smoothstep(rc, ubo.lens.y, r);
    return ubo.lens.z * max(strength, 0.0) * rc * rc / r * window;
}

vec2 deflect_uv(vec2 uv, float aspect, float strength) {
    vec2 scale = vec2(max(aspect, 0.000001), 1.0);
    vec2 p = (uv - vec2(0.5, 0.5)) * scale;
    float radius = length(p);
    vec2 direction = p / max(radius, ubo.shape.x);
    vec2 bent = p - direction * lens_magnitude(radius, strength);
    return bent / scale + vec2(0.5, 0.5);
}

float horizon_mask(float radius) {
    return smoothstep(ubo.lens.x * 0.97, ubo.lens.x, radius);
}

float photon_ring(float radius) {
    float width = ubo.lens.x * 0.08;
    float offset = (radius - ubo.lens.x * 1.5) / width;
    return exp(-offset * offset);
}
";

const IDENTITY_DISPLACEMENT: &str = r"
vec3 displace(vec3 p) {
    return p;
}
";

const DISK_DISPLACEMENT: &str = r"
vec3 displace(vec3 p) {
    float radius = length(vec2(p.x, p.z));
    float lift = ubo.lens.w * lens_magnitude(radius, ubo.params.y);
    return vec3(p.x, p.y + lift, p.z);
}
";

const SURFACE_VERTEX_MAIN: &str = r"
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_normal;
layout(location = 2) in vec2 a_uv;

layout(location = 0) out vec2 v_uv;
layout(location = 1) out vec3 v_world;
layout(location = 2) out vec3 v_normal;
layout(location = 3) out vec3 v_local;

void main() {
    vec3 local = displace(a_position);
    vec4 world = ubo.model * vec4(local, 1.0);
    v_uv = a_uv;
    v_world = world.xyz;
    v_normal = (ubo.model * vec4(a_normal, 0.0)).xyz;
    v_local = local;
    gl_Position = ubo.view_projection * world;
}
";

const BACKGROUND_LENS_FRAGMENT: &str = r"
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_color;

float hash12(vec2 p) {
    vec3 p3 = fract(vec3(p.x, p.y, p.x) * 0.1031);
    p3 = p3 + vec3(dot(p3, vec3(p3.y, p3.z, p3.x) + vec3(33.33, 33.33, 33.33)));
    return fract((p3.x + p3.y) * p3.z);
}

vec3 star_field(vec2 p) {
    vec2 grid = p * 160.0;
    vec2 cell = floor(grid);
    float h = hash12(cell);
    float star = step(0.985, h);
    vec2 offset = fract(grid) - vec2(0.5, 0.5);
    float falloff = exp(-dot(offset, offset) * 40.0);
    vec3 sky = mix(vec3(0.01, 0.01, 0.03), vec3(0.03, 0.02, 0.06), clamp(p.y, 0.0, 1.0));
    float brightness = star * falloff * (0.6 + 0.4 * hash12(cell + vec2(7.0, 7.0)));
    return sky + vec3(brightness, brightness, brightness);
}

void main() {
    float aspect = ubo.resolution.w;
    float strength = ubo.params.y;
    vec2 scale = vec2(max(aspect, 0.000001), 1.0);
    vec2 p = (v_uv - vec2(0.5, 0.5)) * scale;
    float radius = length(p);

    vec2 bent = deflect_uv(v_uv, aspect, strength);
    vec3 textured = texture(sampler2D(background_texture, background_sampler), vec2(bent.x, 1.0 - bent.y)).rgb;
    vec3 procedural = star_field(bent * scale);
    vec3 sky = mix(procedural, textured, step(0.5, ubo.background.x));

    float pulse = 0.85 + 0.15 * sin(ubo.params.x * 2.0);
    vec3 ring = vec3(1.0, 0.7, 0.4) * photon_ring(radius) * pulse * strength * 0.25;
    out_color = vec4(sky * horizon_mask(radius) + ring, 1.0);
}
";

const HORIZON_CORE_FRAGMENT: &str = r"
layout(location = 1) in vec3 v_world;
layout(location = 2) in vec3 v_normal;
layout(location = 0) out vec4 out_color;

void main() {
    vec3 view_dir = normalize(ubo.camera_position.xyz - v_world);
    float facing = dot(normalize(v_normal), view_dir);
    float rim = pow(1.0 - clamp(abs(facing), 0.0, 1.0), 4.0);
    out_color = vec4(vec3(1.0, 0.45, 0.15) * rim * 0.08, 1.0);
}
";

const PHOTON_SHELL_FRAGMENT: &str = r"
layout(location = 0) out vec4 out_color;

void main() {
    float pulse = sin(ubo.params.w) * 0.5 + 0.5;
    out_color = vec4(vec3(0.4, 0.6, 1.0) * pulse * 0.3, pulse * 0.2);
}
";

const ACCRETION_DISK_FRAGMENT: &str = r"
layout(location = 3) in vec3 v_local;
layout(location = 0) out vec4 out_color;

void main() {
    float radius = length(vec2(v_local.x, v_local.z));
    float angle = atan(-v_local.z, v_local.x);
    float phase = ubo.params.z;
    float t = clamp((radius - ubo.shape.y) / (ubo.shape.z - ubo.shape.y), 0.0, 1.0);
    float falloff = pow(1.0 - t, 1.5);
    float inner_glow = 1.0 + 1.5 * exp(-8.0 * t);
    float swirl = 3.0 * angle - 2.0 * phase + 8.0 * log(max(radius, ubo.shape.x));
    float band = 0.75 + 0.25 * sin(swirl);
    float doppler = sin(angle + phase) * 0.5 + 0.5;
    vec3 tint = mix(vec3(1.2, 0.85, 0.7), vec3(0.8, 0.95, 1.3), doppler);
    float intensity = falloff * inner_glow * band;
    float alpha = clamp(ubo.color.w * falloff * band, 0.0, 1.0);
    out_color = vec4(ubo.color.xyz * tint * intensity, alpha);
}
";

/// Full-screen triangle for the post passes. `v_uv` has its origin top-left.
pub(crate) const FULLSCREEN_VERTEX: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    vec2 pos = positions[gl_VertexIndex];
    v_uv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

const POST_SOURCE_BINDINGS: &str = r"
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_color;

layout(set = 0, binding = 0) uniform texture2D source_texture;
layout(set = 0, binding = 1) uniform sampler source_sampler;
layout(std140, set = 0, binding = 2) uniform PostParams {
    vec4 texel_direction;
    vec4 settings;
} post;
";

// post.settings: luminance threshold, smoothing, bloom intensity, exposure.
const BRIGHT_PASS_MAIN: &str = r"
void main() {
    vec3 color = texture(sampler2D(source_texture, source_sampler), v_uv).rgb;
    float luma = dot(color, vec3(0.2126, 0.7152, 0.0722));
    float threshold = post.settings.x;
    float knee = max(post.settings.y, 0.0001);
    float weight = smoothstep(threshold, threshold + knee, luma);
    out_color = vec4(color * weight, 1.0);
}
";

const BLUR_PASS_MAIN: &str = r"
vec3 tap(vec2 uv) {
    return texture(sampler2D(source_texture, source_sampler), uv).rgb;
}

void main() {
    vec2 step_uv = post.texel_direction.xy * post.texel_direction.zw;
    vec3 sum = tap(v_uv) * 0.227027;
    sum = sum + (tap(v_uv + step_uv) + tap(v_uv - step_uv)) * 0.1945946;
    sum = sum + (tap(v_uv + step_uv * 2.0) + tap(v_uv - step_uv * 2.0)) * 0.1216216;
    sum = sum + (tap(v_uv + step_uv * 3.0) + tap(v_uv - step_uv * 3.0)) * 0.054054;
    sum = sum + (tap(v_uv + step_uv * 4.0) + tap(v_uv - step_uv * 4.0)) * 0.016216;
    out_color = vec4(sum, 1.0);
}
";

const COMPOSITE_PASS_MAIN: &str = r"
layout(set = 1, binding = 0) uniform texture2D bloom_texture;
layout(set = 1, binding = 1) uniform sampler bloom_sampler;

vec3 aces_filmic(vec3 x) {
    vec3 numerator = x * (x * 2.51 + vec3(0.03, 0.03, 0.03));
    vec3 denominator = x * (x * 2.43 + vec3(0.59, 0.59, 0.59)) + vec3(0.14, 0.14, 0.14);
    return clamp(numerator / denominator, vec3(0.0, 0.0, 0.0), vec3(1.0, 1.0, 1.0));
}

void main() {
    vec3 scene = texture(sampler2D(source_texture, source_sampler), v_uv).rgb;
    vec3 bloom = texture(sampler2D(bloom_texture, bloom_sampler), v_uv).rgb;
    vec3 color = (scene + bloom * post.settings.z) * post.settings.w;
    out_color = vec4(aces_filmic(color), 1.0);
}
";

/// Post pass selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PostPass {
    Bright,
    Blur,
    Composite,
}

pub(crate) fn surface_vertex_source(kind: ProgramKind) -> String {
    let displacement = match kind {
        ProgramKind::AccretionDisk => DISK_DISPLACEMENT,
        _ => IDENTITY_DISPLACEMENT,
    };
    [VERSION, SURFACE_BLOCK, LENS_FUNCTIONS, displacement, SURFACE_VERTEX_MAIN].concat()
}

pub(crate) fn surface_fragment_source(kind: ProgramKind) -> String {
    let body = match kind {
        ProgramKind::BackgroundLens => BACKGROUND_LENS_FRAGMENT,
        ProgramKind::HorizonCore => HORIZON_CORE_FRAGMENT,
        ProgramKind::PhotonShell => PHOTON_SHELL_FRAGMENT,
        ProgramKind::AccretionDisk => ACCRETION_DISK_FRAGMENT,
    };
    [VERSION, SURFACE_BLOCK, BACKGROUND_BINDINGS, LENS_FUNCTIONS, body].concat()
}

pub(crate) fn post_fragment_source(pass: PostPass) -> String {
    let body = match pass {
        PostPass::Bright => BRIGHT_PASS_MAIN,
        PostPass::Blur => BLUR_PASS_MAIN,
        PostPass::Composite => COMPOSITE_PASS_MAIN,
    };
    [VERSION, POST_SOURCE_BINDINGS, body].concat()
}

#[cfg(test)]
mod tests {
    use wgpu::naga::front::glsl::{Frontend, Options};
    use wgpu::naga::ShaderStage;

    use super::*;

    const PROGRAMS: [ProgramKind; 4] = [
        ProgramKind::BackgroundLens,
        ProgramKind::HorizonCore,
        ProgramKind::PhotonShell,
        ProgramKind::AccretionDisk,
    ];

    fn parse(stage: ShaderStage, source: &str) {
        let mut frontend = Frontend::default();
        if let Err(errors) = frontend.parse(&Options::from(stage), source) {
            panic!("{stage:?} shader failed to parse: {errors:?}\n{source}");
        }
    }

    #[test]
    fn surface_programs_parse() {
        for kind in PROGRAMS {
            parse(ShaderStage::Vertex, &surface_vertex_source(kind));
            parse(ShaderStage::Fragment, &surface_fragment_source(kind));
        }
    }

    #[test]
    fn post_passes_parse() {
        parse(ShaderStage::Vertex, FULLSCREEN_VERTEX);
        for pass in [PostPass::Bright, PostPass::Blur, PostPass::Composite] {
            parse(ShaderStage::Fragment, &post_fragment_source(pass));
        }
    }

    #[test]
    fn only_the_disk_is_displaced() {
        assert!(surface_vertex_source(ProgramKind::AccretionDisk).contains("ubo.lens.w"));
        assert!(!surface_vertex_source(ProgramKind::HorizonCore).contains("ubo.lens.w"));
    }
}
