//! Scene-header segmentation.
//!
//! Scenes start at `INT.`/`EXT.`/`INT/EXT`/`I/E` slug lines, optionally
//! prefixed by a scene number, and run until the next slug line.

use super::{Scene, Segmentation, Segmenter, FULL_SCRIPT_HEADING};
use crate::error::Result;
use regex::Regex;
use tracing::{debug, warn};

/// Slug-line pattern. Group 1 is the heading without the scene number.
const SCENE_HEADER_PATTERN: &str = r"(?m)^(?:\d+\s+)?((?:INT/EXT|I/E|INT|EXT)[.\s].+?)$";

/// Byte range of one detected scene inside the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSpan {
    /// Offset of the header line (including any scene number).
    pub start: usize,
    /// Offset of the next header, or the end of the text.
    pub end: usize,
    /// Trimmed heading.
    pub heading: String,
}

/// Segmenter driven by screenplay slug lines.
#[derive(Debug, Clone)]
pub struct HeaderSegmenter {
    pattern: Regex,
    min_scene_length: usize,
}

impl HeaderSegmenter {
    /// Create a segmenter that drops scenes shorter than `min_scene_length` characters.
    pub fn new(min_scene_length: usize) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(SCENE_HEADER_PATTERN)?,
            min_scene_length,
        })
    }

    /// Detect scene spans. Spans are contiguous and the last one ends at `text.len()`;
    /// anything before the first span is preamble (title page, credits).
    pub fn spans(&self, text: &str) -> Vec<SceneSpan> {
        let headers: Vec<(usize, String)> = self
            .pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let start = caps.get(0)?.start();
                let heading = caps.get(1)?.as_str().trim().to_string();
                Some((start, heading))
            })
            .collect();

        headers
            .iter()
            .enumerate()
            .map(|(i, (start, heading))| SceneSpan {
                start: *start,
                end: headers.get(i + 1).map_or(text.len(), |(next, _)| *next),
                heading: heading.clone(),
            })
            .collect()
    }
}

impl Segmenter for HeaderSegmenter {
    fn segment(&self, text: &str, film: &str) -> Segmentation {
        let spans = self.spans(text);

        if spans.is_empty() {
            warn!("No scene headers found in '{}', treating as single document", film);
            return Segmentation {
                scenes: vec![Scene {
                    film: film.to_string(),
                    scene_id: 0,
                    heading: FULL_SCRIPT_HEADING.to_string(),
                    text: text.to_string(),
                }],
                fallback: true,
                dropped: 0,
            };
        }

        let mut scenes = Vec::with_capacity(spans.len());
        let mut dropped = 0;

        for (i, span) in spans.into_iter().enumerate() {
            let scene_text = text[span.start..span.end].trim();

            if scene_text.chars().count() < self.min_scene_length {
                debug!("Dropping near-empty scene '{}' in '{}'", span.heading, film);
                dropped += 1;
                continue;
            }

            scenes.push(Scene {
                film: film.to_string(),
                scene_id: (i + 1) as u32,
                heading: span.heading,
                text: scene_text.to_string(),
            });
        }

        Segmentation {
            scenes,
            fallback: false,
            dropped,
        }
    }
}
