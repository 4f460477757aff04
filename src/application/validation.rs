//! Turns the raw multipart field set into a typed [`GenerationRequest`].
//!
//! Rules are evaluated in a fixed order and the first violation wins, so a
//! given submission always produces the same client-facing message.

use std::collections::HashMap;

use thiserror::Error;

use crate::domain::{
    color::HexColor,
    file_name,
    request::{
        DepthSource, DotPattern, GenerationRequest, MAX_DEPTH_TEXT_CHARS, Pattern, ViewMode,
    },
};

/// Multipart field names understood by the gateway.
pub mod fields {
    pub const DEPTH_MODE: &str = "dm_switches";
    pub const DEPTH_TEXT: &str = "depthmap_text";
    pub const DEPTH_FILE: &str = "depthmap_file";
    pub const PATTERN_MODE: &str = "pattern_switches";
    pub const PATTERN_FILE: &str = "pattern_file";
    pub const DOT_PROBABILITY: &str = "dot_probability";
    pub const DOT_BG_COLOR: &str = "dot_bg_color";
    pub const DOT_COLORS: &str = "dot_colors";
    pub const BLUR: &str = "blur";
    pub const VIEW_MODE: &str = "view_mode";
    pub const FORCE_DEPTH: &str = "force_depth";
    pub const FORCED_DEPTH: &str = "forced_depth";
}

const MAX_PERCENT: u8 = 100;

/// Client-side violations, one per rule. `Display` is the message returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("You must select a depthmap and pattern mode")]
    MissingModes,
    #[error("Invalid depthmap mode")]
    InvalidDepthMode,
    #[error("Invalid pattern mode")]
    InvalidPatternMode,
    #[error("You must input some text for a text depthmap")]
    MissingDepthText,
    #[error("Depthmap text must be at most 30 characters")]
    DepthTextTooLong,
    #[error("Depthmap text contains unsupported characters")]
    InvalidDepthText,
    #[error("You must attach an image for an image depthmap")]
    MissingDepthFile,
    #[error("You must attach an image for an image pattern")]
    MissingPatternFile,
    #[error("Invalid dot probability")]
    InvalidDotProbability,
    #[error("Invalid background color '{value}'")]
    InvalidBackgroundColor { value: String },
    #[error("Invalid blur value")]
    InvalidBlur,
    #[error("Invalid view mode")]
    InvalidViewMode,
    #[error("Invalid depth value")]
    InvalidForcedDepth,
    #[error("Unsupported image type for {field}")]
    UnsupportedImageType { field: &'static str },
    #[error("Invalid dot color '{value}'")]
    InvalidDotColor { value: String },
}

/// An uploaded part as seen by validation: only its declared name matters here.
pub trait DeclaredUpload {
    fn declared_name(&self) -> &str;
}

/// Raw text fields and file parts of one multipart submission.
#[derive(Debug)]
pub struct FormSubmission<F> {
    fields: HashMap<String, String>,
    files: HashMap<String, F>,
}

impl<F> Default for FormSubmission<F> {
    fn default() -> Self {
        Self {
            fields: HashMap::new(),
            files: HashMap::new(),
        }
    }
}

impl<F> FormSubmission<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a text field; a repeated name keeps the last value.
    pub fn insert_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn insert_file(&mut self, name: impl Into<String>, file: F) {
        self.files.insert(name.into(), file);
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_field(name, value);
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, file: F) -> Self {
        self.insert_file(name, file);
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Optional fields submitted blank count as not supplied.
    fn supplied(&self, name: &str) -> Option<&str> {
        self.field(name).map(str::trim).filter(|value| !value.is_empty())
    }

    fn take_file(&mut self, name: &str) -> Option<F> {
        self.files.remove(name)
    }
}

enum DepthMode {
    Text,
    File,
}

enum PatternMode {
    Dots,
    File,
}

/// Validate a submission. Performs no I/O; unused file parts are dropped.
pub fn validate<F: DeclaredUpload>(
    mut submission: FormSubmission<F>,
) -> Result<GenerationRequest<F>, ValidationError> {
    let (Some(depth_mode), Some(pattern_mode)) = (
        submission.field(fields::DEPTH_MODE),
        submission.field(fields::PATTERN_MODE),
    ) else {
        return Err(ValidationError::MissingModes);
    };

    let depth_mode = match depth_mode {
        "text" => DepthMode::Text,
        "file" => DepthMode::File,
        _ => return Err(ValidationError::InvalidDepthMode),
    };
    let pattern_mode = match pattern_mode {
        "dots" => PatternMode::Dots,
        "file" => PatternMode::File,
        _ => return Err(ValidationError::InvalidPatternMode),
    };

    let depth = match depth_mode {
        DepthMode::Text => {
            let text = submission
                .field(fields::DEPTH_TEXT)
                .filter(|text| !text.is_empty())
                .ok_or(ValidationError::MissingDepthText)?;
            if text.chars().count() > MAX_DEPTH_TEXT_CHARS {
                return Err(ValidationError::DepthTextTooLong);
            }
            if text.chars().any(char::is_control) {
                return Err(ValidationError::InvalidDepthText);
            }
            DepthSource::Text(text.to_string())
        }
        DepthMode::File => DepthSource::File(
            submission
                .take_file(fields::DEPTH_FILE)
                .ok_or(ValidationError::MissingDepthFile)?,
        ),
    };

    let pattern_file = match pattern_mode {
        PatternMode::File => Some(
            submission
                .take_file(fields::PATTERN_FILE)
                .ok_or(ValidationError::MissingPatternFile)?,
        ),
        PatternMode::Dots => None,
    };

    let probability = submission
        .supplied(fields::DOT_PROBABILITY)
        .map(parse_probability)
        .transpose()?;

    let background = submission
        .supplied(fields::DOT_BG_COLOR)
        .map(|value| {
            HexColor::parse(value).ok_or_else(|| ValidationError::InvalidBackgroundColor {
                value: value.to_string(),
            })
        })
        .transpose()?;

    let blur = submission
        .supplied(fields::BLUR)
        .map(|value| parse_percent(value).ok_or(ValidationError::InvalidBlur))
        .transpose()?;

    let view_mode = match submission.supplied(fields::VIEW_MODE) {
        Some(code) => ViewMode::from_code(code).ok_or(ValidationError::InvalidViewMode)?,
        None => ViewMode::default(),
    };

    let forced_depth = if submission.field(fields::FORCE_DEPTH).is_some() {
        let percent = submission
            .supplied(fields::FORCED_DEPTH)
            .and_then(parse_percent)
            .ok_or(ValidationError::InvalidForcedDepth)?;
        Some(f64::from(percent) / 100.0)
    } else {
        None
    };

    if let DepthSource::File(file) = &depth {
        ensure_supported_image(file, fields::DEPTH_FILE)?;
    }
    if let Some(file) = &pattern_file {
        ensure_supported_image(file, fields::PATTERN_FILE)?;
    }

    let colors = match submission.supplied(fields::DOT_COLORS) {
        Some(list) => parse_color_list(list)?,
        None => Vec::new(),
    };

    let pattern = match pattern_file {
        Some(file) => Pattern::File(file),
        None => Pattern::Dots(DotPattern {
            probability,
            background,
            colors,
        }),
    };

    Ok(GenerationRequest {
        depth,
        pattern,
        blur,
        view_mode,
        forced_depth,
    })
}

fn parse_probability(value: &str) -> Result<f64, ValidationError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && (0.0..=f64::from(MAX_PERCENT)).contains(p))
        .ok_or(ValidationError::InvalidDotProbability)
}

/// Unsigned decimal digits only (no sign, no fraction) in `[0, 100]`.
fn parse_percent(value: &str) -> Option<u8> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let trimmed = value.trim_start_matches('0');
    if trimmed.len() > 3 {
        return None;
    }
    let parsed: u16 = if trimmed.is_empty() { 0 } else { trimmed.parse().ok()? };
    u8::try_from(parsed).ok().filter(|p| *p <= MAX_PERCENT)
}

fn parse_color_list(list: &str) -> Result<Vec<HexColor>, ValidationError> {
    list.split(',')
        .map(str::trim)
        .map(|entry| {
            HexColor::parse(entry).ok_or_else(|| ValidationError::InvalidDotColor {
                value: entry.to_string(),
            })
        })
        .collect()
}

fn ensure_supported_image<F: DeclaredUpload>(
    file: &F,
    field: &'static str,
) -> Result<(), ValidationError> {
    if file_name::is_supported_image(file.declared_name()) {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedImageType { field })
    }
}
