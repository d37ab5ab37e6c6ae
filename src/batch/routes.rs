use actix_files::NamedFile;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log;
use std::path::PathBuf;
use uuid::Uuid;

use crate::batch::model::{BatchAccepted, BatchJob, BatchRequest, BatchStatus};
use crate::dataset::DatasetReader;
use crate::generator::engine::log_summary;
use crate::generator::validation::{validate_naming_field, ValidationErrors};
use crate::generator::{validate_placeholders, BatchGenerator};
use crate::template::{Template, DOCUMENT_EXTENSION};
use crate::{AppState, ErrorResponse};

const PREVIEW_LIMIT: usize = 5;

#[utoipa::path(
    post,
    path = "/api/batches",
    tag = "Batches",
    request_body = BatchRequest,
    responses(
        (status = 202, description = "Batch accepted and running", body = BatchAccepted),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 422, description = "Dataset or template could not be opened", body = ErrorResponse)
    )
)]
pub async fn start_batch(
    state: web::Data<AppState>,
    item: web::Json<BatchRequest>,
) -> impl Responder {
    let request = item.into_inner();
    if let Err(message) = request.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request(&message));
    }

    let policy = state.config.encodings;
    let paths = (request.dataset_path.clone(), request.template_path.clone());
    let encoding = request.encoding.clone();
    let opened = web::block(move || -> Result<(DatasetReader, Template), String> {
        let (dataset_path, template_path) = paths;
        let dataset = DatasetReader::open_with(&dataset_path, encoding.as_deref(), policy)
            .map_err(|e| e.to_string())?;
        let template = Template::open(&template_path).map_err(|e| e.to_string())?;
        Ok((dataset, template))
    })
    .await;

    let (dataset, template) = match opened {
        Ok(Ok(inputs)) => inputs,
        Ok(Err(message)) => {
            log::warn!("Batch inputs could not be opened: {}", message);
            return HttpResponse::UnprocessableEntity().json(ErrorResponse::unprocessable(&message));
        }
        Err(e) => {
            log::error!("Batch input worker failed: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string()));
        }
    };

    let mut errors = ValidationErrors::new();
    validate_naming_field(&request.naming_field, "naming_field", dataset.fields(), &mut errors);
    if let Err(message) = errors.into_result() {
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request(&message));
    }

    let placeholders = validate_placeholders(template.placeholders(), dataset.fields());
    for status in placeholders.iter().filter(|status| !status.matched) {
        log::warn!(
            "Placeholder !{}! has no matching field and will be left as is",
            status.name
        );
    }

    // Without an explicit directory each job writes into its own folder under the root.
    let job_id = Uuid::new_v4();
    let output_dir = request
        .output_dir
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| state.config.output_root.join(job_id.to_string()));
    let preview = BatchGenerator::new(&dataset, &template)
        .preview_filenames(&request.naming_field, PREVIEW_LIMIT);
    let total = dataset.record_count();
    let cancel = state.jobs.create(job_id, &request, &output_dir, total);

    log::info!(
        "Starting batch job {} for {} records into {}",
        job_id,
        total,
        output_dir.display()
    );

    let accepted = BatchAccepted {
        job_id,
        total,
        output_dir: output_dir.display().to_string(),
        preview,
        placeholders,
    };

    let jobs = state.jobs.clone();
    let failure_preview = state.config.failure_preview;
    let naming_field = request.naming_field;
    tokio::spawn(async move {
        let progress_jobs = jobs.clone();
        let result = web::block(move || {
            BatchGenerator::new(&dataset, &template).generate_with(
                &output_dir,
                &naming_field,
                &cancel,
                |progress| progress_jobs.update_progress(job_id, progress),
            )
        })
        .await;

        let result = match result {
            Ok(Ok(summary)) => {
                log_summary(&summary, failure_preview);
                Ok(summary)
            }
            Ok(Err(e)) => {
                log::error!("Batch job {} failed: {}", job_id, e);
                Err(e.to_string())
            }
            Err(e) => {
                log::error!("Batch job {} worker failed: {}", job_id, e);
                Err(format!("batch worker failed: {}", e))
            }
        };
        jobs.finish(job_id, result);
    });

    HttpResponse::Accepted().json(accepted)
}

#[utoipa::path(
    get,
    path = "/api/batches",
    tag = "Batches",
    responses(
        (status = 200, description = "All batch jobs, oldest first", body = Vec<BatchJob>)
    )
)]
pub async fn list_batches(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.jobs.list())
}

#[utoipa::path(
    get,
    path = "/api/batches/{id}",
    tag = "Batches",
    params(
        ("id" = Uuid, Path, description = "Batch job ID")
    ),
    responses(
        (status = 200, description = "Batch job status", body = BatchJob),
        (status = 404, description = "Batch job not found", body = ErrorResponse)
    )
)]
pub async fn get_batch(state: web::Data<AppState>, path: web::Path<Uuid>) -> impl Responder {
    let id = path.into_inner();
    match state.jobs.get(id) {
        Some(job) => HttpResponse::Ok().json(job),
        None => HttpResponse::NotFound().json(ErrorResponse::not_found(&format!("Batch job {} not found", id))),
    }
}

#[utoipa::path(
    delete,
    path = "/api/batches/{id}",
    tag = "Batches",
    params(
        ("id" = Uuid, Path, description = "Batch job ID")
    ),
    responses(
        (status = 202, description = "Cancellation requested", body = BatchJob),
        (status = 404, description = "Batch job not found", body = ErrorResponse),
        (status = 409, description = "Batch job already finished", body = ErrorResponse)
    )
)]
pub async fn cancel_batch(state: web::Data<AppState>, path: web::Path<Uuid>) -> impl Responder {
    let id = path.into_inner();
    match state.jobs.cancel(id) {
        Some(true) => match state.jobs.get(id) {
            Some(job) => HttpResponse::Accepted().json(job),
            None => HttpResponse::NotFound().json(ErrorResponse::not_found(&format!("Batch job {} not found", id))),
        },
        Some(false) => HttpResponse::Conflict().json(ErrorResponse::conflict(&format!(
            "Batch job {} is no longer running",
            id
        ))),
        None => HttpResponse::NotFound().json(ErrorResponse::not_found(&format!("Batch job {} not found", id))),
    }
}

#[utoipa::path(
    get,
    path = "/api/batches/{id}/files/{filename}",
    tag = "Batches",
    params(
        ("id" = Uuid, Path, description = "Batch job ID"),
        ("filename" = String, Path, description = "Generated filename, without extension")
    ),
    responses(
        (status = 200, description = "Generated document"),
        (status = 404, description = "Unknown job or file", body = ErrorResponse)
    )
)]
pub async fn download_document(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
) -> impl Responder {
    let (id, filename) = path.into_inner();
    let Some(job) = state.jobs.get(id) else {
        return HttpResponse::NotFound().json(ErrorResponse::not_found(&format!("Batch job {} not found", id)));
    };

    // Only names the job reported as written are served.
    let produced = job
        .summary
        .as_ref()
        .is_some_and(|summary| summary.successes.iter().any(|name| *name == filename));
    if job.status == BatchStatus::Running || !produced {
        return HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
            "No generated document named '{}' in batch job {}",
            filename, id
        )));
    }

    let file_path = PathBuf::from(&job.output_dir).join(format!("{}.{}", filename, DOCUMENT_EXTENSION));
    match NamedFile::open(&file_path) {
        Ok(file) => file.into_response(&req),
        Err(e) => {
            log::error!("Failed to open {}: {}", file_path.display(), e);
            HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
                "Generated document '{}' is no longer available",
                filename
            )))
        }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/batches")
            .route(web::get().to(list_batches))
            .route(web::post().to(start_batch)),
    )
    .service(
        web::resource("/batches/{id}")
            .route(web::get().to(get_batch))
            .route(web::delete().to(cancel_batch)),
    )
    .service(
        web::resource("/batches/{id}/files/{filename}")
            .route(web::get().to(download_document)),
    );
}
