use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod executor;
pub mod registry;
pub mod service;

use crate::config::Config;
use crate::executor::analysis::AiAnalyzeExecutor;
use crate::executor::docker::DockerBuildExecutor;
use crate::executor::package::PackageInstallExecutor;
use crate::executor::run::RunExecutor;
use crate::executor::{ExecutorSet, ExecutorSupervisor};
use crate::registry::JobRegistry;
use crate::service::job::JobContext;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gantry_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Gantry Orchestrator...");

    let config = Config::from_env();
    config.validate().expect("Invalid configuration");

    let registry = Arc::new(JobRegistry::new());

    let executors = ExecutorSet {
        run: Arc::new(RunExecutor::new(
            config.run_command.clone(),
            config.workspace_base.clone(),
            config.run_timeout,
        )),
        package_install: Arc::new(PackageInstallExecutor::new(
            config.pip_command.clone(),
            config.environments_base.clone(),
            config.package_install_timeout,
        )),
        docker_build: Arc::new(DockerBuildExecutor::new(
            config.container_engine.clone(),
            config.environments_base.clone(),
            config.docker_build_timeout,
        )),
        ai_analyze: Arc::new(AiAnalyzeExecutor::new(
            config.analysis_endpoint.clone(),
            config.analysis_api_key.clone(),
            config.analysis_model.clone(),
            config.ai_analyze_timeout,
        )),
    };

    let supervisor = Arc::new(ExecutorSupervisor::new(Arc::clone(&registry), executors));
    let ctx = Arc::new(JobContext {
        registry,
        supervisor,
    });

    tracing::info!("Registry and executors initialized");

    // Build router with all API endpoints
    let app = api::create_router(ctx);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
