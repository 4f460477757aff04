//! Maps a staged [`GenerationRequest`] onto the generator's argument vector.

use std::{ffi::OsString, path::Path};

use crate::domain::request::{DepthSource, GenerationRequest, Pattern};

const TEXT_OPTION: &str = "--text";

/// Build the ordered arguments for one generator run.
///
/// Field values are pushed verbatim as separate tokens; `output_dir` should be absolute.
pub fn build_arguments<F: AsRef<Path>>(
    request: &GenerationRequest<F>,
    output_dir: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(16);

    match &request.depth {
        // One `--text=` token, so a text starting with `-` is never read as an option.
        DepthSource::Text(text) => args.push(format!("{TEXT_OPTION}={text}").into()),
        DepthSource::File(file) => {
            args.push("-d".into());
            args.push(file.as_ref().as_os_str().to_owned());
        }
    }

    match &request.pattern {
        Pattern::Dots(dots) => {
            args.push("--dots".into());
            if let Some(probability) = dots.probability {
                args.push("--dot-prob".into());
                args.push(format_fraction(probability / 100.0).into());
            }
            if let Some(color) = &dots.background {
                args.push("--dot-bg-color".into());
                args.push(color.as_str().into());
            }
            if !dots.colors.is_empty() {
                let joined = dots
                    .colors
                    .iter()
                    .map(|color| color.as_str())
                    .collect::<Vec<_>>()
                    .join(",");
                args.push("--dot-colors".into());
                args.push(joined.into());
            }
        }
        Pattern::File(file) => {
            args.push("-p".into());
            args.push(file.as_ref().as_os_str().to_owned());
        }
    }

    if let Some(blur) = request.blur {
        args.push("-b".into());
        args.push(blur.to_string().into());
    }

    args.push(request.view_mode.flag().into());

    if let Some(depth) = request.forced_depth {
        args.push("--forcedepth".into());
        args.push(format_fraction(depth).into());
    }

    args.push("-o".into());
    args.push(output_dir.as_os_str().to_owned());

    args
}

/// Decimal rendering with at most six fractional digits and no trailing zeros.
pub fn format_fraction(value: f64) -> String {
    let mut rendered = format!("{value:.6}");
    if rendered.contains('.') {
        let kept = rendered.trim_end_matches('0').trim_end_matches('.').len();
        rendered.truncate(kept);
    }
    if rendered == "-0" {
        rendered = "0".to_string();
    }
    rendered
}
