use anyhow::Context;
use dotenvy::dotenv;
use livechat_bot::bot::{
    BotContext, Classifier, Dispatcher, DualQueue, PollLoop, ResilientExecutor,
};
use livechat_bot::config::AppConfig;
use livechat_bot::feed::YouTubeFeed;
use livechat_bot::llm::OpenAiGenerator;
use livechat_bot::settings::{self, JsonSettingsStore};
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting credentials from log output
struct RedactionPatterns {
    google_api_key: Regex,
    oauth_token: Regex,
    bearer: Regex,
    openai_key: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            google_api_key: Regex::new(r"AIza[0-9A-Za-z_-]{35}")?,
            oauth_token: Regex::new(r"ya29\.[0-9A-Za-z._-]+")?,
            bearer: Regex::new(r"(?i)(bearer\s+)[0-9A-Za-z._~+/=-]+")?,
            openai_key: Regex::new(r"sk-[0-9A-Za-z_-]{16,}")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = self
            .google_api_key
            .replace_all(input, "[GOOGLE_API_KEY]")
            .to_string();
        output = self.bearer.replace_all(&output, "${1}[MASKED]").to_string();
        output = self
            .oauth_token
            .replace_all(&output, "[OAUTH_TOKEN]")
            .to_string();
        output = self
            .openai_key
            .replace_all(&output, "[LLM_API_KEY]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length even though the redacted one may differ
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Compile redaction patterns before any log line is written
    let patterns = Arc::new(
        RedactionPatterns::new().context("Failed to compile redaction patterns")?,
    );
    init_logging(patterns);

    info!("Starting live chat bot...");

    let config = init_config();

    let store = Arc::new(JsonSettingsStore::new(config.settings_path.clone()));
    let mut ctx = BotContext {
        queue: DualQueue::with_normal_capacity(config.normal_lane_capacity),
        ..BotContext::new(settings::load_or_default(store.as_ref()).await)
    };

    let feed = Arc::new(YouTubeFeed::from_config(&config));
    info!("YouTube feed initialized for chat {}.", config.live_chat_id);

    let generator = match OpenAiGenerator::from_config(&config) {
        Ok(g) => Arc::new(g),
        Err(e) => {
            error!("Failed to initialize reply generator: {}", e);
            std::process::exit(1);
        }
    };
    info!("Reply generator initialized ({}).", config.llm_model);

    let executor = ResilientExecutor::default();
    let dispatcher = Dispatcher::new(generator, executor.clone(), config.generation_timeout());
    let classifier = Classifier::new(config.bot_name.clone(), config.bot_channel_id.clone());

    let mut poll_loop = PollLoop::new(
        feed,
        store,
        classifier,
        dispatcher,
        executor,
        config.page_size,
        config.max_replies_per_cycle,
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    info!("Bot is running...");
    if let Err(e) = poll_loop.run(&mut ctx, shutdown).await {
        error!("Bot stopped: {}", e);
        std::process::exit(1);
    }
    info!("Bot stopped.");
    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_config() -> AppConfig {
    match AppConfig::new() {
        Ok(c) => {
            info!("Configuration loaded successfully.");
            c
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM
async fn watch_signals(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    () = wait_for_signal(tokio::signal::ctrl_c(), "Ctrl+C") => {}
                    _ = term.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                wait_for_signal(tokio::signal::ctrl_c(), "Ctrl+C").await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        wait_for_signal(tokio::signal::ctrl_c(), "Ctrl+C").await;
    }

    shutdown.cancel();
}

/// Resolve once `signal` fires; never resolve if listening for it failed
async fn wait_for_signal<F>(signal: F, name: &str)
where
    F: std::future::Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Received {name}"),
        Err(e) => {
            error!("Failed to listen for {name}: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_redacts_credentials() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;
        let key = format!("AIza{}", "a".repeat(35));
        let line = format!(
            "GET /liveChat/messages?key={key} authorization: Bearer ya29.abc-DEF_123 sk-0123456789abcdefXYZ"
        );
        let redacted = patterns.redact(&line);

        assert!(!redacted.contains(&key));
        assert!(!redacted.contains("ya29.abc"));
        assert!(!redacted.contains("sk-0123456789abcdef"));
        assert!(redacted.contains("key=[GOOGLE_API_KEY]"));
        assert!(redacted.contains("Bearer [MASKED]"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_signal_listener_does_not_stop_bot() {
        let broken = async { Err(io::Error::other("no signal driver")) };
        let waited =
            tokio::time::timeout(Duration::from_secs(3600), wait_for_signal(broken, "Ctrl+C")).await;
        assert!(waited.is_err());

        let fired = tokio::time::timeout(
            Duration::from_secs(1),
            wait_for_signal(async { Ok(()) }, "Ctrl+C"),
        )
        .await;
        assert!(fired.is_ok());
    }
}
