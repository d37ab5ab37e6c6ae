use actix_web::{web, HttpResponse, Responder};
use log;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dataset::DatasetReader;
use crate::generator::{validate_placeholders, PlaceholderStatus};
use crate::template::Template;
use crate::{AppState, ErrorResponse};

#[derive(Deserialize, Debug, ToSchema)]
pub struct InspectTemplateRequest {
    /// Path to a `.docx` template on the server.
    pub template_path: String,
    /// When given, each placeholder is matched against this dataset's fields.
    #[serde(default)]
    pub dataset_path: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct TemplateSummary {
    pub template_path: String,
    /// Distinct placeholder names, sorted.
    pub placeholders: Vec<String>,
    /// Present only when a dataset was supplied.
    pub matches: Option<Vec<PlaceholderStatus>>,
}

#[utoipa::path(
    post,
    path = "/api/templates/inspect",
    tag = "Templates",
    request_body = InspectTemplateRequest,
    responses(
        (status = 200, description = "Placeholders found in the template", body = TemplateSummary),
        (status = 400, description = "Empty template path", body = ErrorResponse),
        (status = 422, description = "Template or dataset could not be opened", body = ErrorResponse)
    )
)]
pub async fn inspect_template(
    state: web::Data<AppState>,
    item: web::Json<InspectTemplateRequest>,
) -> impl Responder {
    let request = item.into_inner();
    if request.template_path.trim().is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request("Template path must not be empty"));
    }

    let policy = state.config.encodings;
    let inspected = web::block(move || -> Result<TemplateSummary, String> {
        let template = Template::open(&request.template_path).map_err(|e| e.to_string())?;
        let matches = match &request.dataset_path {
            Some(dataset_path) => {
                let dataset = DatasetReader::open_with(dataset_path, request.encoding.as_deref(), policy)
                    .map_err(|e| e.to_string())?;
                Some(validate_placeholders(template.placeholders(), dataset.fields()))
            }
            None => None,
        };

        Ok(TemplateSummary {
            template_path: request.template_path,
            placeholders: template.placeholders().to_vec(),
            matches,
        })
    })
    .await;

    match inspected {
        Ok(Ok(summary)) => HttpResponse::Ok().json(summary),
        Ok(Err(message)) => {
            log::warn!("Template inspection failed: {}", message);
            HttpResponse::UnprocessableEntity().json(ErrorResponse::unprocessable(&message))
        }
        Err(e) => {
            log::error!("Template inspection worker failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string()))
        }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/templates/inspect").route(web::post().to(inspect_template)));
}
