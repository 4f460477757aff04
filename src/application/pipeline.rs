//! End-to-end generation flow for one request:
//! validate, stage uploads, invoke the generator, translate its answer.

use std::{sync::Arc, time::Instant};

use metrics::counter;
use tracing::{debug, error, info};

use crate::infra::{
    outputs::OutputDirectory,
    staging::{ReceivedUpload, StagingArea},
};

use super::{
    error::GenerationError,
    generator::GeneratorRunner,
    invocation::build_arguments,
    materialize::materialize,
    translate::{GeneratedImage, translate},
    validation::{FormSubmission, validate},
};

pub const METRIC_REQUESTS_TOTAL: &str = "stereogramaxo_requests_total";

const SOURCE: &str = "application::pipeline";

pub struct GenerationService {
    staging: Arc<StagingArea>,
    runner: Arc<dyn GeneratorRunner>,
    output: OutputDirectory,
}

impl GenerationService {
    pub fn new(
        staging: Arc<StagingArea>,
        runner: Arc<dyn GeneratorRunner>,
        output: OutputDirectory,
    ) -> Self {
        Self {
            staging,
            runner,
            output,
        }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn output(&self) -> &OutputDirectory {
        &self.output
    }

    /// Run one submission through every stage; the first failing stage ends the request.
    pub async fn generate(
        &self,
        submission: FormSubmission<ReceivedUpload>,
    ) -> Result<GeneratedImage, GenerationError> {
        let started_at = Instant::now();
        let result = self.run_stages(submission).await;
        let elapsed_ms = started_at.elapsed().as_millis() as u64;

        match &result {
            Ok(image) => {
                counter!(METRIC_REQUESTS_TOTAL, "outcome" => "success").increment(1);
                info!(
                    target = SOURCE,
                    op = "pipeline::generate",
                    result = "success",
                    elapsed_ms,
                    url = %image.url,
                    code = image.code,
                    "Stereogram generated"
                );
            }
            Err(err) => {
                counter!(METRIC_REQUESTS_TOTAL, "outcome" => err.kind()).increment(1);
                if let GenerationError::Validation(cause) = err {
                    info!(
                        target = SOURCE,
                        op = "pipeline::generate",
                        result = "rejected",
                        elapsed_ms,
                        error = %cause,
                        "Generation request rejected"
                    );
                } else {
                    error!(
                        target = SOURCE,
                        op = "pipeline::generate",
                        result = "error",
                        elapsed_ms,
                        error_code = err.kind(),
                        error = %err,
                        "Generation request failed"
                    );
                }
            }
        }

        result
    }

    async fn run_stages(
        &self,
        submission: FormSubmission<ReceivedUpload>,
    ) -> Result<GeneratedImage, GenerationError> {
        let request = validate(submission)?;
        let request = materialize(request, &self.staging)?;

        let args = build_arguments(&request, self.output.directory());
        debug!(
            target = SOURCE,
            op = "pipeline::invoke",
            args = ?args,
            "Invoking generator"
        );

        let outcome = self.runner.run(args).await?;
        translate(outcome, self.output.public_path())
    }
}
