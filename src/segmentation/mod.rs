//! Scene segmentation for cleaned screenplay text.
//!
//! A segmenter turns one film's text into an ordered list of scenes. Chunking
//! and indexing only ever see [`Scene`] values, so alternative strategies can be
//! plugged in behind the [`Segmenter`] trait.

mod header;

pub use header::{HeaderSegmenter, SceneSpan};

use serde::{Deserialize, Serialize};

/// Heading given to the single scene produced when no headers are found.
pub const FULL_SCRIPT_HEADING: &str = "FULL SCRIPT";

/// A structurally delimited span of a screenplay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// Film title this scene belongs to.
    pub film: String,
    /// Position of the scene header within the film (1-based), or 0 for the fallback.
    pub scene_id: u32,
    /// Scene heading, e.g. `INT. DEATH STAR - CORRIDOR`.
    pub heading: String,
    /// Scene text, heading line included.
    pub text: String,
}

impl Scene {
    /// Whether this is the whole-document fallback scene.
    pub fn is_full_script(&self) -> bool {
        self.scene_id == 0 && self.heading == FULL_SCRIPT_HEADING
    }
}

/// Result of segmenting one film.
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    /// Scenes in header order.
    pub scenes: Vec<Scene>,
    /// True if no headers were found and the whole text became one scene.
    pub fallback: bool,
    /// Detected scenes dropped for being shorter than the minimum length.
    pub dropped: usize,
}

/// Trait for scene segmentation strategies.
pub trait Segmenter: Send + Sync {
    /// Split a cleaned document into scenes.
    fn segment(&self, text: &str, film: &str) -> Segmentation;
}
