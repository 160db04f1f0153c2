mod config;
mod db;
mod middleware;
mod models;
mod routes;
mod services;
mod utils;

use std::sync::Arc;

use actix_web::{App, HttpServer, web};

use crate::config::AuthConfig;
use crate::services::auth_service::AuthenticationService;
use crate::services::emails::PostmarkClient;
use crate::utils::clock::SystemClock;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    log::info!("🔌 Connecting to database...");
    let db = db::establish_connection()
        .await
        .expect("Failed to connect to database");
    log::info!("✅ Database connected!");
    let db = web::Data::new(db);

    let config = AuthConfig::from_env();
    let auth_service = web::Data::new(AuthenticationService::new(
        config,
        Arc::new(PostmarkClient::from_env()),
        Arc::new(SystemClock),
    ));

    log::info!("🚀 Starting server on http://127.0.0.1:8080");

    HttpServer::new(move || {
        App::new()
            .app_data(db.clone())
            .app_data(auth_service.clone())
            .configure(routes::configure_routes)
    })
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
}
