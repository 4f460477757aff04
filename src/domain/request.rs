//! Typed representation of a validated stereogram request.
//!
//! File-valued inputs are generic so the same request shape can carry a
//! freshly received upload before staging and a stable staged path after it.

use super::color::HexColor;

/// Maximum number of characters accepted for a text depth map.
pub const MAX_DEPTH_TEXT_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub enum DepthSource<F> {
    Text(String),
    File(F),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern<F> {
    Dots(DotPattern),
    File(F),
}

/// Options for the generated random-dot background.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DotPattern {
    /// Dot probability as a percentage in `[0, 100]`.
    pub probability: Option<f64>,
    pub background: Option<HexColor>,
    pub colors: Vec<HexColor>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    WallEyed,
    CrossEyed,
}

impl ViewMode {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "w" => Some(Self::WallEyed),
            "c" => Some(Self::CrossEyed),
            _ => None,
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            Self::WallEyed => "-w",
            Self::CrossEyed => "-c",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest<F> {
    pub depth: DepthSource<F>,
    pub pattern: Pattern<F>,
    /// Gaussian blur amount in `[0, 100]`.
    pub blur: Option<u8>,
    pub view_mode: ViewMode,
    /// Forced maximum depth as a fraction in `[0, 1]`.
    pub forced_depth: Option<f64>,
}

impl<F> GenerationRequest<F> {
    /// Replace every file reference, depth map first, stopping at the first failure.
    pub fn try_map_files<G, E>(
        self,
        mut map: impl FnMut(F) -> Result<G, E>,
    ) -> Result<GenerationRequest<G>, E> {
        let depth = match self.depth {
            DepthSource::Text(text) => DepthSource::Text(text),
            DepthSource::File(file) => DepthSource::File(map(file)?),
        };
        let pattern = match self.pattern {
            Pattern::Dots(dots) => Pattern::Dots(dots),
            Pattern::File(file) => Pattern::File(map(file)?),
        };
        Ok(GenerationRequest {
            depth,
            pattern,
            blur: self.blur,
            view_mode: self.view_mode,
            forced_depth: self.forced_depth,
        })
    }

    pub fn file_count(&self) -> usize {
        usize::from(matches!(self.depth, DepthSource::File(_)))
            + usize::from(matches!(self.pattern, Pattern::File(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_request() -> GenerationRequest<&'static str> {
        GenerationRequest {
            depth: DepthSource::File("depth.png"),
            pattern: Pattern::File("pattern.png"),
            blur: Some(4),
            view_mode: ViewMode::CrossEyed,
            forced_depth: Some(0.5),
        }
    }

    #[test]
    fn view_mode_codes_round_trip_to_flags() {
        assert_eq!(ViewMode::from_code("w").map(ViewMode::flag), Some("-w"));
        assert_eq!(ViewMode::from_code("c").map(ViewMode::flag), Some("-c"));
        assert_eq!(ViewMode::from_code("W"), None);
        assert_eq!(ViewMode::default(), ViewMode::WallEyed);
    }

    #[test]
    fn try_map_files_visits_depth_then_pattern() {
        let mut seen = Vec::new();
        let mapped = file_request()
            .try_map_files(|name| {
                seen.push(name);
                Ok::<_, ()>(name.len())
            })
            .expect("mapping succeeds");

        assert_eq!(seen, ["depth.png", "pattern.png"]);
        assert_eq!(mapped.depth, DepthSource::File(9));
        assert_eq!(mapped.pattern, Pattern::File(11));
        assert_eq!(mapped.blur, Some(4));
        assert_eq!(mapped.view_mode, ViewMode::CrossEyed);
    }

    #[test]
    fn try_map_files_stops_at_first_failure() {
        let mut calls = 0;
        let result = file_request().try_map_files(|_| {
            calls += 1;
            Err::<(), _>("disk full")
        });
        assert_eq!(result, Err("disk full"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn text_and_dots_need_no_files() {
        let request: GenerationRequest<()> = GenerationRequest {
            depth: DepthSource::Text("hi".into()),
            pattern: Pattern::Dots(DotPattern::default()),
            blur: None,
            view_mode: ViewMode::WallEyed,
            forced_depth: None,
        };
        assert_eq!(request.file_count(), 0);
        assert_eq!(file_request().file_count(), 2);
    }
}
