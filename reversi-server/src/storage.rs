//! 对局记录入库
//!
//! 完成的对局先追加进内存队列（仲裁任务只在锁内做一次 push，
//! 从不等待 IO），由单个落盘任务每十秒整批换出并写入持久存储。
//! 落盘失败只记日志，不影响对局；进程崩溃丢掉未落盘的记录是可
//! 接受的。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{error, info};

use protocol::{GameMessage, DRAIN_INTERVAL};

/// 完成对局的内存队列
pub struct GameStore {
    queue: Mutex<Vec<GameMessage>>,
}

impl GameStore {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条完成对局记录
    pub fn push(&self, record: GameMessage) {
        self.lock().push(record);
    }

    /// 整批换出队列中的全部记录
    pub fn take_all(&self) -> Vec<GameMessage> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<GameMessage>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for GameStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 落盘目标：每局一个 JSON 文档，以对局 ID 命名
pub struct GameSink {
    games_dir: PathBuf,
}

impl GameSink {
    /// 使用平台数据目录下的默认位置
    pub fn new() -> Result<Self> {
        let data_dir = dirs::data_dir().context("无法获取应用数据目录")?;
        Self::with_dir(data_dir.join("reversi-server").join("games"))
    }

    /// 指定落盘目录创建
    pub fn with_dir(games_dir: PathBuf) -> Result<Self> {
        if !games_dir.exists() {
            fs::create_dir_all(&games_dir)
                .with_context(|| format!("无法创建存储目录: {:?}", games_dir))?;
        }
        Ok(Self { games_dir })
    }

    /// 写入一批记录，返回写入条数
    pub fn store_batch(&self, records: &[GameMessage]) -> Result<usize> {
        for record in records {
            let path = self.games_dir.join(format!("{}.json", record.gameid));
            let json = serde_json::to_string_pretty(record).context("序列化对局记录失败")?;
            fs::write(&path, json).with_context(|| format!("写入文件失败: {:?}", path))?;
        }
        Ok(records.len())
    }

    /// 落盘目录路径
    pub fn games_dir(&self) -> &Path {
        &self.games_dir
    }
}

/// 定期把队列中的记录批量落盘
pub async fn run_drainer(store: std::sync::Arc<GameStore>, sink: GameSink) {
    let mut interval = tokio::time::interval(DRAIN_INTERVAL);
    loop {
        interval.tick().await;
        let batch = store.take_all();
        if batch.is_empty() {
            continue;
        }
        match sink.store_batch(&batch) {
            Ok(count) => info!("对局记录已落盘 count={}", count),
            Err(e) => error!("对局记录落盘失败 err={}", e),
        }
    }
}
