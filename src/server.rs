use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{config::RelayConfig, handlers, state::AppState};

/// Logs go to stderr at `info` unless `RUST_LOG` says otherwise. Output from
/// actix's own `log` records is bridged into the same subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(handlers::index)))
        .service(web::resource("/api/health").route(web::get().to(handlers::health)))
        .service(web::resource("/api/classify").route(web::post().to(handlers::classify)));
}

/// Origins are expected to be validated by `RelayConfig`; `*` allows any.
pub fn cors(allowed_origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST"])
        .allow_any_header()
        .max_age(3600);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return cors.allow_any_origin();
    }

    allowed_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let address = (config.host.clone(), config.port);
    let state = web::Data::new(AppState::new(config)?);

    info!("Forwarding predictions to {}", state.upstream.url());
    info!("Relay listening on http://{}:{}", address.0, address.1);

    HttpServer::new(move || {
        App::new()
            .wrap(cors(&state.config.allowed_origins))
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind(address)?
    .run()
    .await?;

    info!("Relay shut down");
    Ok(())
}
