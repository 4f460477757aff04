//! Moves validated uploads out of their transient location.

use tracing::{debug, info};

use crate::{
    domain::request::GenerationRequest,
    infra::staging::{ReceivedUpload, StagingArea, UploadError, UploadedAsset},
};

const SOURCE: &str = "application::materialize";

/// Stage every uploaded file of `request`, rewriting its references to stable paths.
pub fn materialize(
    request: GenerationRequest<ReceivedUpload>,
    staging: &StagingArea,
) -> Result<GenerationRequest<UploadedAsset>, UploadError> {
    let uploads = request.file_count();
    if uploads == 0 {
        debug!(
            target = SOURCE,
            op = "materialize::request",
            result = "skipped",
            "Request has no uploads to stage"
        );
    }

    let staged = request.try_map_files(|upload| {
        let size_bytes = upload.size_bytes();
        let asset = staging.materialize(upload)?;
        info!(
            target = SOURCE,
            op = "materialize::stage_upload",
            result = "staged",
            original_name = %asset.original_name,
            stable_path = %asset.stable_path.display(),
            size_bytes,
            "Upload staged for generator"
        );
        Ok(asset)
    })?;

    debug!(
        target = SOURCE,
        op = "materialize::request",
        result = "staged",
        uploads,
        "Request uploads staged"
    );
    Ok(staged)
}
