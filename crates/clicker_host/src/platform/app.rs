use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clicker_engine::{
    ensure_storage_dir, Collaborators, Dispatch, Engine, FileSessionMirror, Reply, ScriptedPage,
};
use clicker_logging::{clicker_debug, clicker_error, clicker_info, clicker_warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};

use super::bridge::ExtensionBridge;
use super::framing::{read_frame, write_frame, FrameError};
use super::logging::{self, LogDestination};
use super::persistence::{load_engine_config, FileSettingsStore};
use super::protocol::{Incoming, Outgoing, RequestId, Route};

/// Overrides the directory holding config, settings, session state and logs.
const HOST_DIR_ENV: &str = "CLICKER_HOST_DIR";
/// When set, logs are mirrored to stderr.
const LOG_STDERR_ENV: &str = "CLICKER_HOST_LOG_STDERR";
const SESSION_DIRNAME: &str = "session";

pub fn run_host() -> anyhow::Result<()> {
    let dir = host_dir()?;
    ensure_storage_dir(&dir).with_context(|| format!("cannot use host directory {dir:?}"))?;
    let destination = if env::var_os(LOG_STDERR_ENV).is_some() {
        LogDestination::FileAndStderr
    } else {
        LogDestination::File
    };
    logging::initialize(&dir, destination);
    clicker_info!("Host starting in {:?}", dir);
    clicker_debug!("Launched with arguments {:?}", env::args().collect::<Vec<_>>());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build async runtime")?;
    let result = runtime.block_on(serve(dir, tokio::io::stdin(), tokio::io::stdout()));
    if let Err(err) = &result {
        clicker_error!("Host stopped: {:#}", err);
    }
    result
}

fn host_dir() -> anyhow::Result<PathBuf> {
    if let Some(dir) = env::var_os(HOST_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let exe = env::current_exe().context("cannot locate the host executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .context("host executable has no parent directory")
}

/// Serves one extension connection until `input` ends.
async fn serve<R, W>(dir: PathBuf, mut input: R, output: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let config = load_engine_config(&dir);
    let (outgoing, queue) = mpsc::unbounded_channel();
    let bridge = Arc::new(ExtensionBridge::new(
        outgoing.clone(),
        config.page_call_timeout(),
    ));
    let mirror = Arc::new(FileSessionMirror::new(
        dir.join(SESSION_DIRNAME),
        config.session_ttl(),
    ));
    let engine = Engine::build(
        &config,
        Collaborators {
            page: Arc::new(ScriptedPage::new(bridge.clone())),
            tabs: bridge.clone(),
            settings_page: bridge.clone(),
            settings: Arc::new(FileSettingsStore::open(dir.clone())),
            mirror: mirror.clone(),
        },
    )
    .context("failed to assemble engine")?;
    engine.store.add_listener(bridge.clone());

    let writer = tokio::spawn(write_loop(output, queue));
    let result = read_loop(&mut input, &engine, &mirror, &bridge, &outgoing).await;
    bridge.disconnect();
    writer.abort();
    result
}

async fn read_loop<R>(
    input: &mut R,
    engine: &Engine,
    mirror: &FileSessionMirror,
    bridge: &ExtensionBridge,
    outgoing: &mpsc::UnboundedSender<Outgoing>,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        let Some(frame) = read_frame(input).await.context("failed to read frame")? else {
            clicker_info!("Extension closed the connection");
            return Ok(());
        };
        let incoming: Incoming = match serde_json::from_slice(&frame) {
            Ok(incoming) => incoming,
            Err(err) => {
                clicker_warn!("Ignoring malformed message: {}", err);
                continue;
            }
        };

        match incoming.route() {
            Route::Session(session_id) => match mirror.begin_session(&session_id) {
                Ok(()) => clicker_info!("Browser session {} started", session_id),
                Err(err) => clicker_warn!("Tab states will not be mirrored: {}", err),
            },
            Route::Router { id, request } => {
                let dispatch = engine.router.dispatch(request);
                if let (Some(id), Dispatch::Deferred(reply)) = (id, dispatch) {
                    tokio::spawn(send_reply(id, reply, outgoing.clone()));
                }
            }
            Route::Tab(event) => engine.store.handle_tab_event(event).await,
            Route::CallResult { call_id, result } => bridge.complete(call_id, result),
        }
    }
}

async fn send_reply(
    id: RequestId,
    reply: oneshot::Receiver<Reply>,
    outgoing: mpsc::UnboundedSender<Outgoing>,
) {
    let frame = match reply.await {
        Ok(reply) => Outgoing::Reply {
            id,
            reply: Some(reply),
            error: None,
        },
        Err(_) => Outgoing::Reply {
            id,
            reply: None,
            error: Some("request failed".to_string()),
        },
    };
    // The writer is gone only when the connection is shutting down.
    let _ = outgoing.send(frame);
}

async fn write_loop<W>(mut output: W, mut queue: mpsc::UnboundedReceiver<Outgoing>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = queue.recv().await {
        match write_frame(&mut output, &message).await {
            Ok(()) => {}
            Err(FrameError::TooLarge(len)) => {
                clicker_warn!("Dropping outgoing message of {} bytes", len);
            }
            Err(err) => {
                clicker_error!("Failed to write to the extension: {}", err);
                return;
            }
        }
    }
}
