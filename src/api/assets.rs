//! Static assets: the fixed HTML pages and the uploaded images, served verbatim.
use crate::api::sanitize_filename;
use crate::twoface::{Cause, DescribeErr, ExternalError, Fallible};
use actix_files::NamedFile;
use actix_web::{web, HttpResponse};
use std::path::PathBuf;

/// Where the static files live. Shared with every asset handler via app data.
#[derive(Clone)]
pub struct AssetDirs {
    pub upload_dir: PathBuf,
    pub pages_dir: PathBuf,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/about").route(web::get().to(about)))
        .service(web::resource("/contact").route(web::get().to(contact)))
        .service(web::resource("/images/{filename}").route(web::get().to(image)));
}

async fn index(dirs: web::Data<AssetDirs>) -> Fallible<HttpResponse> {
    page(&dirs, "index.html")
}

async fn about(dirs: web::Data<AssetDirs>) -> Fallible<HttpResponse> {
    page(&dirs, "about.html")
}

async fn contact(dirs: web::Data<AssetDirs>) -> Fallible<HttpResponse> {
    page(&dirs, "contact.html")
}

fn page(dirs: &AssetDirs, name: &str) -> Fallible<HttpResponse> {
    let html = std::fs::read_to_string(dirs.pages_dir.join(name)).describe_err(ExternalError {
        cause: Cause::StorageRead,
        text: "couldn't read page",
    })?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html))
}

/// Serve an uploaded image. NamedFile picks the content type from the extension.
async fn image(dirs: web::Data<AssetDirs>, filename: web::Path<String>) -> Fallible<NamedFile> {
    let path = dirs.upload_dir.join(sanitize_filename(&filename));
    NamedFile::open(path).describe_err(ExternalError {
        cause: Cause::NotFound,
        text: "file not found",
    })
}
