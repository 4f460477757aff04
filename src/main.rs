use std::{ffi::OsString, io, process, sync::Arc};

use stereogramaxo::{
    application::{error::AppError, pipeline::GenerationService},
    config::{self, Command, Settings},
    infra::{
        error::InfraError,
        generator::ProcessGenerator,
        http::{self, HttpState},
        outputs::OutputDirectory,
        staging::StagingArea,
        telemetry,
    },
};
use tokio::{net::TcpListener, sync::oneshot, task::JoinError};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        Command::Serve(_) => run_serve(settings).await,
        Command::Check(_) => run_check(settings),
    }
}

struct Prepared {
    staging: StagingArea,
    output: OutputDirectory,
    generator: ProcessGenerator,
}

fn prepare(settings: &Settings) -> Result<Prepared, AppError> {
    let storage = &settings.storage;
    let staging = StagingArea::new(&storage.staging_dir)
        .map_err(InfraError::directory("staging", &storage.staging_dir))?;
    let output = OutputDirectory::new(&storage.output_dir, storage.public_output_path.as_str())
        .map_err(InfraError::directory("output", &storage.output_dir))?;

    let generator = ProcessGenerator::new(
        settings.generator.program.clone(),
        settings
            .generator
            .args
            .iter()
            .map(OsString::from)
            .collect(),
        settings.generator.timeout,
    );

    Ok(Prepared {
        staging,
        output,
        generator,
    })
}

fn run_check(settings: Settings) -> Result<(), AppError> {
    let prepared = prepare(&settings)?;

    let mut prefix = vec![prepared.generator.program().display().to_string()];
    prefix.extend(
        prepared
            .generator
            .leading_args()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned()),
    );

    println!("listen:      {}", settings.server.addr);
    println!("generator:   {}", prefix.join(" "));
    println!("timeout:     {:?}", prepared.generator.timeout());
    println!("staging dir: {}", prepared.staging.root().display());
    println!("output dir:  {}", prepared.output.directory().display());
    println!("output url:  /{}/", prepared.output.public_path());
    Ok(())
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let Prepared {
        staging,
        output,
        generator,
    } = prepare(&settings)?;

    info!(
        target = "stereogramaxo::startup",
        program = %generator.program().display(),
        timeout_ms = generator.timeout().as_millis() as u64,
        staging_dir = %staging.root().display(),
        output_dir = %output.directory().display(),
        "Generation service configured"
    );

    let service = GenerationService::new(Arc::new(staging), Arc::new(generator), output);
    let state = HttpState {
        generation: Arc::new(service),
    };
    let router = http::build_router(state, settings.storage.max_request_bytes.get());

    let addr = settings.server.addr;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| InfraError::Bind { addr, source })?;
    info!(
        target = "stereogramaxo::startup",
        addr = %settings.server.addr,
        "Listening"
    );

    let (signalled_tx, signalled_rx) = oneshot::channel();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        },
    );
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        finished = &mut server => return server_result(finished),
        _ = signalled_rx => {}
    }

    let grace = settings.server.graceful_shutdown;
    info!(
        target = "stereogramaxo::shutdown",
        grace_ms = grace.as_millis() as u64,
        "Draining in-flight requests"
    );
    match tokio::time::timeout(grace, &mut server).await {
        Ok(finished) => server_result(finished),
        Err(_) => {
            warn!(
                target = "stereogramaxo::shutdown",
                "Graceful shutdown timed out; aborting remaining requests"
            );
            server.abort();
            Ok(())
        }
    }
}

fn server_result(finished: Result<io::Result<()>, JoinError>) -> Result<(), AppError> {
    match finished {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
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
}
