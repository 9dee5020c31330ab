//! Explanatory labels for the scene features.
//!
//! There is no overlay renderer; when annotations are switched on the list is
//! written to the log.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annotation {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    /// Anchor in percent of the viewport, from the top-left corner.
    pub anchor: (f32, f32),
}

pub const ANNOTATIONS: [Annotation; 4] = [
    Annotation {
        id: "event-horizon",
        title: "Event Horizon",
        description: "The boundary beyond which nothing can escape the black hole's gravitational pull. \
                      Located at the Schwarzschild radius (Rs = 2GM/c^2).",
        anchor: (50.0, 50.0),
    },
    Annotation {
        id: "photon-sphere",
        title: "Photon Sphere",
        description: "The spherical region where photons can orbit the black hole. \
                      Located at 1.5 times the Schwarzschild radius (1.5Rs).",
        anchor: (42.0, 42.0),
    },
    Annotation {
        id: "accretion-disk",
        title: "Accretion Disk",
        description: "Hot, rotating disk of matter spiraling into the black hole. \
                      Material heats up due to friction, glowing at millions of degrees.",
        anchor: (35.0, 65.0),
    },
    Annotation {
        id: "gravitational-lensing",
        title: "Gravitational Lensing",
        description: "The bending of light rays due to the black hole's intense gravitational field, \
                      creating the characteristic distortion effect.",
        anchor: (25.0, 25.0),
    },
];

pub fn log_annotations() {
    for annotation in &ANNOTATIONS {
        tracing::info!(
            id = annotation.id,
            x = annotation.anchor.0,
            y = annotation.anchor.1,
            "{}: {}",
            annotation.title,
            annotation.description
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_anchors_on_screen() {
        for (index, annotation) in ANNOTATIONS.iter().enumerate() {
            assert!(ANNOTATIONS[index + 1..].iter().all(|other| other.id != annotation.id));
            assert!((0.0..=100.0).contains(&annotation.anchor.0));
            assert!((0.0..=100.0).contains(&annotation.anchor.1));
        }
    }
}
