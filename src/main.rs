use dotenvy::dotenv;
use order_core::config::Config;
use order_core::{create_pool, run_migrations, OrderService, PgStore};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env()?;
    let pool = create_pool(&config.database_url, &config.pool)?;
    run_migrations(&pool)?;
    log::info!("Schema is up to date");

    let service = OrderService::new(PgStore::new(pool));
    let stats = service.order_stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
