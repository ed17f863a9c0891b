use std::net::SocketAddr;

use clap::Parser;
use snippetbox::{
    config::{Args, Config},
    pages::TemplateCache,
    routes::app,
    sessions::{store::PgSessionStore, SessionManager},
    snippets::PgSnippetModel,
    users::PgUserModel,
    AppState, InnerAppState,
};
use sqlx::PgPool;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Args::parse()).await {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::load_or_generate(&args.config)?;

    let pool = PgPool::connect(&args.dsn).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(InnerAppState {
        snippets: Box::new(PgSnippetModel::new(pool.clone())),
        users: Box::new(PgUserModel::new(pool.clone())),
        sessions: SessionManager::new(
            Box::new(PgSessionStore::new(pool)),
            config.session_lifetime(),
            config.cookies_secret()?,
        )
        .secure(config.secure_cookies),
        templates: TemplateCache::new()?,
        static_dir: config.static_dir.clone(),
        read_timeout: config.read_timeout(),
        request_timeout: config.request_timeout(),
    });

    let listener = tokio::net::TcpListener::bind(args.addr).await?;

    log::info!("starting server on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app(app_state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    log::info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("shutting down");
}
