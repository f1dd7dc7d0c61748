mod api;

use std::sync::Arc;

use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use rocket::{launch, Build, Rocket};
use tokio_util::sync::CancellationToken;

use variant_core::{BatchConfig, BatchProcessor, Facade, LinearBlendScorer, NullScorer, PathogenicityScorer, PendingRegistry};

/// Applies pending migrations on every boot (spec §6: "schema must be
/// created idempotently on startup; no destructive migration"), the same
/// way the teacher's `mmoldb-app`/`mmoldb-ingest` binaries do via an
/// `AdHoc::on_ignite` fairing.
async fn run_migrations(rocket: Rocket<Build>) -> Rocket<Build> {
    let url = variant_db::postgres_url_from_environment();
    tokio::task::spawn_blocking(move || variant_db::migrations::run_migrations(&url))
        .await
        .expect("migrations task panicked")
        .expect("failed to apply pending migrations");

    rocket
}

/// Default bind port, per Open Question 2's resolution (SPEC_FULL.md §7):
/// `VARIANT_APP_PORT` overrides it.
fn get_figment() -> Figment {
    let port: u16 = std::env::var("VARIANT_APP_PORT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(5000);

    rocket::Config::figment().merge(("port", port))
}

#[launch]
fn rocket() -> _ {
    env_logger::init();

    let config = BatchConfig::load().expect("invalid configuration");
    let pool = variant_db::get_pool(config.max_workers as u32 + 1)
        .expect("failed to build the Postgres connection pool");
    let registry = PendingRegistry::new();

    // Spec §9 / §4.6: a missing model path is a degraded mode, not a
    // startup failure.
    let scorer: Arc<dyn PathogenicityScorer> = match &config.ml_model_path {
        Some(_) => Arc::new(LinearBlendScorer::default()),
        None => Arc::new(NullScorer),
    };

    let vep_client = vep_client::VepClient::new(config.vep_endpoint.clone());
    let processor = BatchProcessor::new(pool.clone(), vep_client, scorer, registry.clone(), config);
    let shutdown_token = processor.shutdown_token();
    let facade = Arc::new(Facade::new(pool.clone(), registry.clone(), processor.clone()));

    let dispatcher = processor.clone();
    let dispatcher_handle = Arc::new(tokio::sync::Mutex::new(Some(tokio::spawn(async move {
        dispatcher.run().await
    }))));

    rocket::custom(get_figment())
        .mount("/", api::routes())
        .manage(pool)
        .manage(registry)
        .manage(facade)
        .manage(processor)
        .manage(shutdown_token.clone())
        .attach(AdHoc::on_ignite("Migrations", run_migrations))
        .attach(AdHoc::on_shutdown("Stop batch processor", move |_| {
            let shutdown_token = shutdown_token.clone();
            let dispatcher_handle = dispatcher_handle.clone();
            Box::pin(async move {
                // Spec §4.2: submissions arriving after this point see
                // `service_unavailable`; the dispatcher drains and
                // processes one final batch to completion before this
                // awaits its handle, so the process never exits mid-persist.
                shutdown_token.cancel();
                if let Some(handle) = dispatcher_handle.lock().await.take() {
                    let _ = handle.await;
                }
            })
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_5000_when_unset() {
        std::env::remove_var("VARIANT_APP_PORT");
        let figment = get_figment();
        let port: u16 = figment.extract_inner("port").unwrap();
        assert_eq!(port, 5000);
    }
}
