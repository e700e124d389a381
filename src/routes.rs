use serde::Serialize;
use worker::{Context, Env, FormEntry, Request, Response, Result, RouteContext, Router};

use pdf_reading_order::{DEFAULT_COLUMN_TOLERANCE, LayoutOptions, ParseResult};

use crate::error::ApiError;
use crate::models::{ColumnsResponse, HealthResponse, ServiceInfo, UPLOAD_FIELD};

#[derive(Debug, Clone)]
pub struct AppState {
    pub column_tolerance: f64,
}

struct Upload {
    name: String,
    bytes: Vec<u8>,
}

pub async fn handle(req: Request, env: Env, _ctx: Context) -> Result<Response> {
    let configured = env.var("COLUMN_TOLERANCE").ok().map(|value| value.to_string());
    let state = AppState {
        column_tolerance: column_tolerance_from_var(configured.as_deref()),
    };

    Router::with_data(state)
        .post_async("/parse-pdf", parse_pdf_route)
        .post_async("/detect-columns", detect_columns_route)
        .get("/health", |_req, _ctx| json_response(&HealthResponse::healthy()))
        .get("/", |_req, _ctx| json_response(&ServiceInfo::current()))
        .run(req, env)
        .await
}

async fn parse_pdf_route(mut req: Request, _ctx: RouteContext<AppState>) -> Result<Response> {
    match parse_pdf_response(&mut req).await {
        Ok(response) => json_response(&response),
        Err(error) => {
            worker::console_error!("parse-pdf rejected: {error}");
            error.into_response()
        }
    }
}

async fn detect_columns_route(mut req: Request, ctx: RouteContext<AppState>) -> Result<Response> {
    match detect_columns_response(&mut req, ctx.data.column_tolerance).await {
        Ok(response) => json_response(&response),
        Err(error) => {
            worker::console_error!("detect-columns rejected: {error}");
            error.into_response()
        }
    }
}

async fn parse_pdf_response(req: &mut Request) -> Result<ParseResult, ApiError> {
    let upload = read_upload(req).await?;
    let result = pdf_reading_order::parse(&upload.bytes);
    worker::console_log!(
        "parsed {} ({} bytes): success={} pages={} blocks={}",
        upload.name,
        upload.bytes.len(),
        result.success,
        result.page_count,
        result.blocks.len()
    );
    Ok(result)
}

async fn detect_columns_response(
    req: &mut Request,
    column_tolerance: f64,
) -> Result<ColumnsResponse, ApiError> {
    let url = req.url()?;
    let page = parse_page_query(
        url.query_pairs()
            .find(|(key, _)| key == "page")
            .map(|(_, value)| value.into_owned())
            .as_deref(),
    )?;

    let upload = read_upload(req).await?;
    let options = LayoutOptions { column_tolerance };
    let columns = pdf_reading_order::detect_page_columns(&upload.bytes, page, &options)?;
    worker::console_log!(
        "detected {} column band(s) on page {page} of {}",
        columns.len(),
        upload.name
    );

    Ok(ColumnsResponse {
        page,
        column_tolerance,
        columns,
    })
}

async fn read_upload(req: &mut Request) -> Result<Upload, ApiError> {
    let form = req
        .form_data()
        .await
        .map_err(|error| ApiError::BadRequest(format!("expected multipart upload: {error}")))?;

    let Some(FormEntry::File(file)) = form.get(UPLOAD_FIELD) else {
        return Err(ApiError::BadRequest(format!(
            "missing file field `{UPLOAD_FIELD}`"
        )));
    };

    let name = file.name();
    ensure_pdf_filename(&name)?;
    let bytes = file.bytes().await?;
    Ok(Upload { name, bytes })
}

fn json_response<T>(payload: &T) -> Result<Response>
where
    T: Serialize,
{
    let mut response = Response::from_json(payload)?;
    response.headers_mut().set("Cache-Control", "no-store")?;
    Ok(response)
}

/// Only the extension is checked; content problems surface as a failed parse.
pub fn ensure_pdf_filename(name: &str) -> Result<(), ApiError> {
    let is_pdf = name
        .rsplit_once('.')
        .is_some_and(|(_, extension)| extension.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        Ok(())
    } else {
        Err(ApiError::BadRequest("File must be a PDF".to_string()))
    }
}

pub fn parse_page_query(raw: Option<&str>) -> Result<u32, ApiError> {
    let Some(raw) = raw else {
        return Ok(1);
    };

    let page = raw.trim().parse::<u32>()?;
    if page == 0 {
        return Err(ApiError::BadRequest("page must be 1 or greater".to_string()));
    }
    Ok(page)
}

pub fn column_tolerance_from_var(raw: Option<&str>) -> f64 {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .map(|column_tolerance| LayoutOptions { column_tolerance })
        .filter(|options| options.validate().is_ok())
        .map_or(DEFAULT_COLUMN_TOLERANCE, |options| options.column_tolerance)
}
