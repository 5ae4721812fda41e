#[macro_use]
extern crate diesel;

use std::io;

use actix_web::{error::JsonPayloadError, middleware, web, App, HttpRequest, HttpServer};

mod cache;
mod config;
mod error;
mod models;
mod nutrition;
mod query;
mod routes;
mod schema;
mod state;

use crate::{config::Config, error::AppError, state::State};

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Malformed payload: {err}")).into()
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::load().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let state = State::new(&config)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let state = web::Data::new(state);

    log::info!(
        "starting HTTP server at http://{}:{} (bound policy {:?})",
        config.host,
        config.port,
        state.bound_policy
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error))
            .wrap(middleware::Logger::default())
            .service(web::scope("/apis").configure(routes::configure))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
