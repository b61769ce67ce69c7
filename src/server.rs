//! WebSocket push server: one client at a time, one JSON snapshot per tick.
//!
//! Runs on a current-thread runtime; the session loop is awaited inline so a
//! second client is only accepted after the first session ends.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

use crate::config::ServerConfig;
use crate::game::GameSnapshot;
use crate::log;
use crate::logging::LogFile;

/// 1ティックごとにスナップショットを生成する側（カメラ＋推論パイプラインなど）
pub trait SnapshotSource {
    /// `Ok(None)` はローカルでの終了要求
    fn next_snapshot(&mut self) -> Result<Option<GameSnapshot>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// ローカルの終了要求（ウィンドウで q など）
    Quit,
    /// クライアントが切断
    Disconnected,
}

/// 設定のアドレスで待ち受けて、接続ごとにセッションを実行する
pub async fn run<S, F>(config: &ServerConfig, open_source: F, logfile: &LogFile) -> Result<()>
where
    S: SnapshotSource,
    F: FnMut() -> Result<S>,
{
    let tick = config.tick()?;
    let listener = TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    log!(logfile, "[ws] listening on ws://{}", listener.local_addr()?);
    serve(listener, tick, open_source, logfile).await
}

pub async fn serve<S, F>(listener: TcpListener, tick: Duration, mut open_source: F, logfile: &LogFile) -> Result<()>
where
    S: SnapshotSource,
    F: FnMut() -> Result<S>,
{
    if tick.is_zero() {
        bail!("tick interval must be non-zero");
    }
    loop {
        let (tcp, peer) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                log!(logfile, "[ws] accept failed: {e}");
                continue;
            }
        };
        handle_connection(tcp, peer, tick, &mut open_source, logfile).await;
        log!(logfile, "[ws] waiting for next client");
    }
}

/// 1接続分: ハンドシェイク → ソース作成 → セッション
///
/// ソース作成に失敗した場合（カメラが開けないなど）はログを出して接続を閉じる。
pub async fn handle_connection<S, F>(
    tcp: TcpStream,
    peer: SocketAddr,
    tick: Duration,
    open_source: &mut F,
    logfile: &LogFile,
) -> Option<SessionEnd>
where
    S: SnapshotSource,
    F: FnMut() -> Result<S>,
{
    let _ = tcp.set_nodelay(true);
    let mut ws = match tokio_tungstenite::accept_async(tcp).await {
        Ok(ws) => ws,
        Err(e) => {
            log!(logfile, "[ws] handshake with {peer} failed: {e}");
            return None;
        }
    };
    log!(logfile, "[ws] client connected: {peer}");

    let source = match open_source() {
        Ok(s) => s,
        Err(e) => {
            log!(logfile, "[session] failed to start: {e:#}");
            let _ = ws.close(None).await;
            return None;
        }
    };

    // ソースはrun_session内でdropされる（カメラもそこで解放）
    match run_session(ws, source, tick).await {
        Ok(SessionEnd::Quit) => {
            log!(logfile, "[session] quit requested, closed {peer}");
            Some(SessionEnd::Quit)
        }
        Ok(SessionEnd::Disconnected) => {
            log!(logfile, "[session] client disconnected: {peer}");
            Some(SessionEnd::Disconnected)
        }
        Err(e) => {
            log!(logfile, "[session] error: {e:#}");
            None
        }
    }
}

/// ティックごとにスナップショットを送信。クライアントからのメッセージは読み捨てる
pub async fn run_session<S, T>(ws: WebSocketStream<T>, mut source: S, tick: Duration) -> Result<SessionEnd>
where
    S: SnapshotSource,
    T: AsyncRead + AsyncWrite + Unpin,
{
    // interval_at は0周期でpanicする
    if tick.is_zero() {
        bail!("tick interval must be non-zero");
    }
    let (mut sink, mut stream) = ws.split();
    let mut ticker = interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let snapshot = match source.next_snapshot()? {
            Some(s) => s,
            None => {
                let _ = sink.send(Message::Close(None)).await;
                return Ok(SessionEnd::Quit);
            }
        };

        match sink.send(Message::Text(snapshot.to_json()?)).await {
            Ok(()) => {}
            Err(e) if is_disconnect(&e) => return Ok(SessionEnd::Disconnected),
            Err(e) => return Err(e).context("failed to send snapshot"),
        }

        loop {
            tokio::select! {
                _ = ticker.tick() => break,
                msg = stream.next() => match msg {
                    None | Some(Ok(Message::Close(_))) => return Ok(SessionEnd::Disconnected),
                    Some(Ok(_)) => {}
                    Some(Err(e)) if is_disconnect(&e) => return Ok(SessionEnd::Disconnected),
                    Some(Err(e)) => return Err(e).context("websocket read failed"),
                },
            }
        }
    }
}

fn is_disconnect(err: &tungstenite::Error) -> bool {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => true,
        tungstenite::Error::Protocol(tungstenite::error::ProtocolError::ResetWithoutClosingHandshake) => true,
        tungstenite::Error::Io(e) => matches!(
            e.kind(),
            io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
        ),
        _ => false,
    }
}
