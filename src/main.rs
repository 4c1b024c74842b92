use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use deep_search_agent::{
    agents::PipelineOrchestrator,
    bot::BotRunner,
    channel::TelegramChannel,
    config::Config,
    conversation::{ConversationStateMachine, SessionStore},
    llm::provider::{LLMProviderConfig, LLM},
    mailer::PostmarkMailer,
    reasoning::LlmReasoningService,
    routes::{self, HealthState},
    search::{SearchAggregator, SerpApiClient, TavilyClient},
    utils::init_logger,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // LOG_DIR may come from .env
    dotenvy::dotenv().ok();
    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logger(std::env::var("LOG_DIR").ok().as_deref());

    // Load configuration
    let config = Config::from_env()?;
    info!(provider = %config.llm.provider, model = %config.llm.default_model, writer = %config.llm.writer_model, "Configuration loaded");
    for key in config.missing_optional_keys() {
        warn!(key, "Optional key not set, the feature that needs it will fail per call");
    }

    // Reasoning service
    let llm = LLM::new(LLMProviderConfig {
        provider: config.llm.provider,
        api_key: config.llm.api_key.clone(),
    });
    let reasoning = Arc::new(LlmReasoningService::from_config(llm, &config.llm));

    // Search providers
    let aggregator = SearchAggregator::new(
        Arc::new(TavilyClient::from_config(&config.search)),
        Arc::new(SerpApiClient::from_config(&config.search)),
    )
    .with_max_results(config.search.max_results)
    .with_timeout(config.search.timeout());

    let pipeline = PipelineOrchestrator::new(reasoning.clone(), Arc::new(aggregator))
        .with_stage_timeout(config.pipeline.stage_timeout())
        .with_evidence_content_chars(config.search.evidence_content_chars);

    let telegram = Arc::new(TelegramChannel::from_config(&config.telegram));
    let store = Arc::new(SessionStore::new());
    let machine = ConversationStateMachine::new(
        store.clone(),
        reasoning,
        Arc::new(pipeline),
        Arc::new(PostmarkMailer::from_config(&config.email)),
        telegram.clone(),
    )
    .with_chunk_limit(config.pipeline.message_chunk_limit)
    .with_stage_timeout(config.pipeline.stage_timeout());

    let shutdown = CancellationToken::new();

    // Optional health endpoint
    if let Some(port) = config.server.health_port {
        let host: std::net::IpAddr = config.server.host.parse()?;
        let addr = SocketAddr::new(host, port);
        let state = HealthState {
            store: store.clone(),
            started_at: chrono::Utc::now(),
        };
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = routes::serve(addr, state, server_shutdown).await {
                error!(error = %e, "Health server stopped");
            }
        });
    }

    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
        }
        ctrl_c_shutdown.cancel();
    });

    BotRunner::new(telegram, Arc::new(machine)).run(shutdown).await;
    Ok(())
}
