//! Request → response, the entry point a serverless worker or the CLI calls.
//!
//! Every outcome is a [`Response`]; failures are reported in-band with
//! `success: false` rather than as a transport error.

use crate::convert::Pipeline;
use crate::output::{DocumentResponse, ErrorResponse, Response};
use crate::request::{Job, Request};
use serde_json::Value;
use tracing::{error, info};

/// Handle a raw JSON request (bare or enveloped).
pub async fn handle_value(pipeline: &Pipeline, value: Value) -> Response {
    match Request::from_value(value) {
        Ok(request) => handle(pipeline, request).await,
        Err(e) => {
            error!("Rejected request: {}", e);
            Response::Error(ErrorResponse::from(&e))
        }
    }
}

/// Handle a parsed request.
pub async fn handle(pipeline: &Pipeline, request: Request) -> Response {
    let job = match request.into_job(pipeline.config().max_batch_size) {
        Ok(job) => job,
        Err(e) => {
            error!("Rejected request: {}", e);
            return Response::Error(ErrorResponse::from(&e));
        }
    };

    match job {
        Job::ModelInfo => {
            info!("Model info requested");
            Response::ModelInfo(Box::new(pipeline.model_info()))
        }
        Job::Single(spec, options) => match pipeline.process_document(&spec, &options).await {
            Ok(result) => Response::Document(Box::new(DocumentResponse {
                success: true,
                result,
            })),
            Err(e) => {
                error!("Conversion of {} failed: {}", spec.display_name(), e);
                Response::Error(ErrorResponse::from(&e))
            }
        },
        Job::Batch(entries, options) => {
            Response::Batch(pipeline.process_batch(entries, &options).await)
        }
    }
}
