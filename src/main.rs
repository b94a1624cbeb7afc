// src/main.rs

mod app_state;
mod collaborator;
mod config;
mod error;
mod models;
mod pagination;
mod pipeline;
mod project;
mod routes;
mod statistics;
mod store;
mod task;

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::info;

use crate::app_state::AppState;
use crate::config::{Config, ConfigError, StoreBackend};
use crate::store::{DocumentStore, MemoryStore, MongoStore};

async fn open_store(config: &Config) -> io::Result<Arc<dyn DocumentStore>> {
    match config.store_backend {
        StoreBackend::Mongo => {
            let uri = config
                .mongo_uri
                .as_deref()
                .ok_or_else(|| io::Error::other(ConfigError::Missing("MONGO_URI")))?;
            let store = MongoStore::init(uri, &config.database_name)
                .await
                .map_err(io::Error::other)?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("Using the in-memory store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(io::Error::other)?;
    let store = open_store(&config).await?;
    let state = AppState::new(store);

    info!("Server running at http://{}", config.bind_address);
    info!("Allowed CORS Origin: {}", config.frontend_origin);

    let frontend_origin = config.frontend_origin.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![http::header::CONTENT_TYPE, http::header::ACCEPT])
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
    })
    .bind(&config.bind_address)?
    .run()
    .await
}
