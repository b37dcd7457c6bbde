mod api;
mod config;
mod datastore;
mod metrics;
mod twoface;

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate guard;

use crate::api::assets::AssetDirs;
use crate::config::Config;
use crate::datastore::jsonfile::JsonFileStore;
use actix_service::Service;
use actix_web::{dev::ServiceResponse, middleware, web, App, HttpServer};
use futures::future::FutureExt;
use std::sync::Arc;
use tracing::{info, Level};

fn main() {
    let args: Vec<_> = std::env::args().collect();
    guard!(let [_, config_file_path, ..] = &args[..] else {
        eprintln!("First argument should be path to config file");
        return
    });

    let config = Config::from_file(config_file_path);

    // Set up logger output
    let subscriber_builder = tracing_subscriber::fmt().with_max_level(Level::DEBUG);
    if config.human_logs {
        subscriber_builder.init();
    } else {
        subscriber_builder.json().init();
    }

    info!("starting plume");

    let sys = actix_rt::System::new("plume");

    // Open the post store, creating the upload directory and an empty document on first run.
    let db = JsonFileStore::new(config.data_file.clone(), config.upload_dir.clone())
        .expect("couldn't open the post store");
    prometheus::register(Box::new(db.clone())).expect("couldn't register store metrics");

    let state = api::State { ds: Arc::new(db) };
    let asset_dirs = AssetDirs {
        upload_dir: config.upload_dir.clone(),
        pages_dir: config.pages_dir.clone(),
    };

    // Start the blog server
    info!(addr = &config.listen_address[..], "starting blog server");
    let max_body_size = config.max_body_size;
    HttpServer::new(move || {
        App::new()
            // Middleware for Prometheus
            .wrap_fn(|request, srv| srv.call(request).map(increment_response_metrics))
            .data(state.clone())
            .data(asset_dirs.clone())
            // enable logger
            .wrap(middleware::Logger::default())
            // limit size of the payload (global configuration)
            .data(web::JsonConfig::default().limit(max_body_size))
            .service(web::scope("/posts").configure(api::posts::configure::<JsonFileStore>))
            .configure(api::assets::configure)
    })
    .bind(config.listen_address.clone())
    .expect("couldn't start the blog HTTP server")
    .run();

    // Start the metrics server
    info!(addr = &config.metrics_address[..], "starting metrics server");
    HttpServer::new(|| {
        App::new().service(
            web::scope("/metrics")
                .service(web::resource("/").route(web::get().to(metrics::endpoint::gather)))
                .service(web::resource("").route(web::get().to(metrics::endpoint::gather))),
        )
    })
    .bind(config.metrics_address)
    .expect("couldn't start metrics server")
    .run();

    sys.run().expect("actix runtime terminated");
}

/// If response is OK, increment the metrics for HTTP statuses.
fn increment_response_metrics<E, B>(
    response: Result<ServiceResponse<B>, E>,
) -> Result<ServiceResponse<B>, E> {
    match response {
        Ok(response) => {
            metrics::HTTP_RESPONSES
                .with_label_values(&[response.status().as_str()])
                .inc();
            Ok(response)
        }
        other => other,
    }
}
