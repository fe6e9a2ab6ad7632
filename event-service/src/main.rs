use lambda_http::{run, Error};
use log::info;

mod handlers;
mod models;
mod routes;

#[cfg(test)]
mod tests;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Event Service Lambda");

    let app = routes::create_router().await;
    run(app).await
}
