use std::path::{Path, PathBuf};
use std::pin::Pin;

use bytes::Bytes;
use chat_bridge::config::{load_config, load_config_or_default, AppConfig};
use chat_bridge::error::BridgeError;
use chat_bridge::observability::init_tracing;
use chat_bridge::translate_with_options;
use clap::error::ErrorKind;
use clap::Parser;
use futures_util::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Translate an OpenAI chat-completion SSE stream into Anthropic message events.
#[derive(Debug, Parser)]
#[command(name = "chat-bridge", version, about)]
struct Cli {
    /// YAML config file; `config.yaml` is used when present
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Model echoed into `message_start`, overriding `translator.default_model`
    #[arg(long, value_name = "NAME")]
    model: Option<String>,

    /// Upstream stream to read; stdin when omitted or `-`
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,
}

impl Cli {
    fn input_path(&self) -> Option<&Path> {
        self.input
            .as_deref()
            .filter(|path| path.as_os_str() != "-")
    }
}

fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|e| match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
        _ => {
            let err = BridgeError::Usage(e.to_string());
            eprint!("{e}");
            std::process::exit(err.exit_code());
        }
    });

    let config = match cli.config.as_ref() {
        Some(path) => load_config(path),
        None => load_config_or_default(DEFAULT_CONFIG_PATH),
    }
    .unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        std::process::exit(1);
    });

    init_tracing(&config.features.log_level);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to initialize Tokio runtime: {e}");
            std::process::exit(1);
        });

    if let Err(err) = runtime.block_on(run(config, cli)) {
        tracing::error!(error = %err, "translation failed");
        eprintln!("chat-bridge: {err}");
        std::process::exit(err.exit_code());
    }
}

async fn run(config: AppConfig, cli: Cli) -> Result<(), BridgeError> {
    let reader: Pin<Box<dyn AsyncRead + Send>> = match cli.input_path() {
        Some(path) => Box::pin(tokio::fs::File::open(path).await?),
        None => Box::pin(tokio::io::stdin()),
    };
    let options = config.translator.translate_options(cli.model.as_deref());
    let input = read_chunks(reader, config.translator.read_chunk_size);

    let mut stdout = tokio::io::stdout();
    pump(translate_with_options(input, options), &mut stdout).await
}

/// Turn an async reader into a stream of chunks of at most `chunk_size` bytes.
fn read_chunks<R>(reader: R, chunk_size: usize) -> impl Stream<Item = std::io::Result<Bytes>> + Send
where
    R: AsyncRead + Send + Unpin + 'static,
{
    futures_util::stream::unfold(Some(reader), move |reader| async move {
        let mut reader = reader?;
        let mut buf = vec![0u8; chunk_size];
        match reader.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some(reader)))
            }
            Err(err) => Some((Err(err), None)),
        }
    })
}

/// Write every frame to `out`, flushing after each so downstream readers see
/// events as soon as they are produced.
async fn pump<S, W>(frames: S, out: &mut W) -> Result<(), BridgeError>
where
    S: Stream<Item = std::io::Result<Bytes>>,
    W: AsyncWrite + Unpin,
{
    let mut frames = std::pin::pin!(frames);
    while let Some(frame) = frames.next().await {
        let frame = frame?;
        out.write_all(&frame).await?;
        out.flush().await?;
    }
    Ok(())
}
