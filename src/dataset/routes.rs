use actix_web::{web, HttpResponse, Responder};
use log;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dataset::{DatasetReader, Field};
use crate::{AppState, ErrorResponse};

#[derive(Deserialize, Debug, ToSchema)]
pub struct InspectDatasetRequest {
    /// Path to a `.shp` or `.dbf` file on the server.
    pub path: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct DatasetSummary {
    pub path: String,
    /// Encoding the attribute table was decoded with.
    pub encoding: String,
    pub record_count: usize,
    pub fields: Vec<Field>,
}

#[utoipa::path(
    post,
    path = "/api/datasets/inspect",
    tag = "Datasets",
    request_body = InspectDatasetRequest,
    responses(
        (status = 200, description = "Dataset schema and record count", body = DatasetSummary),
        (status = 400, description = "Empty path", body = ErrorResponse),
        (status = 422, description = "Dataset could not be opened", body = ErrorResponse)
    )
)]
pub async fn inspect_dataset(
    state: web::Data<AppState>,
    item: web::Json<InspectDatasetRequest>,
) -> impl Responder {
    let request = item.into_inner();
    if request.path.trim().is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request("Dataset path must not be empty"));
    }

    let policy = state.config.encodings;
    let path = request.path.clone();
    let opened = web::block(move || {
        DatasetReader::open_with(&path, request.encoding.as_deref(), policy)
    })
    .await;

    match opened {
        Ok(Ok(reader)) => HttpResponse::Ok().json(DatasetSummary {
            path: reader.path().display().to_string(),
            encoding: reader.encoding().to_string(),
            record_count: reader.record_count(),
            fields: reader.fields().to_vec(),
        }),
        Ok(Err(e)) => {
            log::warn!("Dataset inspection failed: {}", e);
            HttpResponse::UnprocessableEntity().json(ErrorResponse::unprocessable(&e.to_string()))
        }
        Err(e) => {
            log::error!("Dataset inspection worker failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string()))
        }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/datasets/inspect").route(web::post().to(inspect_dataset)));
}
