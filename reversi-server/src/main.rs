//! 黑白棋对战服务端入口

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use protocol::{DEFAULT_ADDR, DEFAULT_BOARDLEN, DEFAULT_TIMEOUT_MS};
use reversi_server::{run_drainer, serve, GameSink, GameStore, Lobby, ServerConfig};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(author, version, about = "黑白棋对战服务器")]
struct Args {
    /// 监听地址，裸 ":端口" 表示绑定全部网卡
    #[arg(long, default_value = DEFAULT_ADDR)]
    addr: String,

    /// 棋盘边长（不小于 4 的偶数）
    #[arg(long, default_value_t = DEFAULT_BOARDLEN)]
    boardlen: usize,

    /// 单手超时（毫秒）
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout: u64,

    /// 启用对局记录入库
    #[arg(long, default_value_t = false)]
    db: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    if args.boardlen < 4 || args.boardlen % 2 != 0 {
        anyhow::bail!("棋盘边长必须为不小于 4 的偶数: {}", args.boardlen);
    }

    let bind_addr = if args.addr.starts_with(':') {
        format!("0.0.0.0{}", args.addr)
    } else {
        args.addr.clone()
    };
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(
        "黑白棋服务器启动 addr={} boardlen={} timeout={}ms db={}",
        bind_addr, args.boardlen, args.timeout, args.db
    );

    let store = if args.db {
        let store = Arc::new(GameStore::new());
        let sink = GameSink::new()?;
        info!("对局记录入库已启用 dir={:?}", sink.games_dir());
        tokio::spawn(run_drainer(store.clone(), sink));
        Some(store)
    } else {
        None
    };

    let lobby = Arc::new(Lobby::new());
    let cfg = ServerConfig {
        boardlen: args.boardlen,
        timeout_ms: args.timeout,
    };
    serve(listener, lobby, cfg, store).await;
    Ok(())
}
