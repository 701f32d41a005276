//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI 3.0 specification for the AI feature endpoints to
//! `openapi.json`, for clients that consume the spec outside Swagger UI.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn write_spec(
    api_doc: utoipa::openapi::OpenApi,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec_json = api_doc.to_pretty_json()?;
    std::fs::write(path, spec_json)?;
    println!("OpenAPI specification written to {}", path);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    write_spec(ApiDoc::openapi(), "openapi.json")?;
    Ok(())
}
