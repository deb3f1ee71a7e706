use clipshare::config::Config;
use clipshare::error::ApplicationError;
use clipshare::{api, logger};
use dotenvy::dotenv;

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = Config::from_env()?;

    let _guard = logger::init(&config)?;

    let app = api::create_app(&config).await?;

    api::serve(config.host, app).await
}
