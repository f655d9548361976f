// 填充任务
// 后台逐个解析未解析的 key，并把结果写回缓存

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

use crate::cache::CacheService;
use crate::config::Config;
use crate::database::StoreError;
use crate::resolver::LinkResolver;

/// 两个 key 之间的等待时间
#[derive(Debug, Clone, Copy)]
pub struct SweepPacing {
    pub after_success: Duration,
    pub after_failure: Duration,
}

impl SweepPacing {
    pub fn from_config(config: &Config) -> Self {
        Self {
            after_success: config.sweep_success_delay(),
            after_failure: config.sweep_failure_delay(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepState {
    Running,
    Completed,
    Cancelled,
    /// 任务 panic 退出
    Failed,
}

#[derive(Debug, Default)]
struct SweepProgress {
    processed: AtomicUsize,
    resolved: AtomicUsize,
    self_linked: AtomicUsize,
    unresolved: AtomicUsize,
    failed: AtomicUsize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepStatus {
    pub id: Uuid,
    pub state: SweepState,
    pub scheduled: usize,
    pub processed: usize,
    pub resolved: usize,
    pub self_linked: usize,
    pub unresolved: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulateOutcome {
    pub scheduled: usize,
    pub sweep_id: Option<Uuid>,
    pub already_running: bool,
}

/// 一次后台填充的句柄
struct SweepHandle {
    id: Uuid,
    scheduled: usize,
    started_at: DateTime<Utc>,
    progress: Arc<SweepProgress>,
    /// 取回 join 结果后置为 None
    task: Option<JoinHandle<()>>,
    state: SweepState,
}

impl SweepHandle {
    /// 任务已经结束就取回 join 结果，定下最终状态
    async fn settle(&mut self) {
        if !self.task.as_ref().is_some_and(JoinHandle::is_finished) {
            return;
        }
        if let Some(task) = self.task.take() {
            self.state = finished_state(self.id, task.await);
        }
    }

    fn is_running(&self) -> bool {
        self.task.is_some()
    }

    fn status(&self) -> SweepStatus {
        SweepStatus {
            id: self.id,
            state: self.state,
            scheduled: self.scheduled,
            processed: self.progress.processed.load(Ordering::SeqCst),
            resolved: self.progress.resolved.load(Ordering::SeqCst),
            self_linked: self.progress.self_linked.load(Ordering::SeqCst),
            unresolved: self.progress.unresolved.load(Ordering::SeqCst),
            failed: self.progress.failed.load(Ordering::SeqCst),
            started_at: self.started_at,
        }
    }
}

fn finished_state(id: Uuid, result: Result<(), JoinError>) -> SweepState {
    match result {
        Ok(()) => SweepState::Completed,
        Err(e) if e.is_cancelled() => SweepState::Cancelled,
        Err(e) => {
            tracing::error!("Sweep {} panicked: {}", id, e);
            SweepState::Failed
        }
    }
}

/// 填充协调器
///
/// 同一时间最多一个后台任务；任务运行中再次调用 populate 不会重复启动。
pub struct Populator {
    cache: Arc<CacheService>,
    resolver: Arc<dyn LinkResolver>,
    marker: String,
    head_limit: usize,
    pacing: SweepPacing,
    current: Mutex<Option<SweepHandle>>,
}

impl Populator {
    pub fn new(
        cache: Arc<CacheService>,
        resolver: Arc<dyn LinkResolver>,
        marker: impl Into<String>,
        head_limit: usize,
        pacing: SweepPacing,
    ) -> Self {
        Self {
            cache,
            resolver,
            marker: marker.into(),
            head_limit,
            pacing,
            current: Mutex::new(None),
        }
    }

    /// 查询未解析的 key 并在后台开始填充，立即返回计划处理的数量
    pub async fn populate(&self) -> Result<PopulateOutcome, StoreError> {
        let mut current = self.current.lock().await;

        if let Some(handle) = current.as_mut() {
            handle.settle().await;
            if handle.is_running() {
                tracing::info!("Sweep {} is still running, not starting another", handle.id);
                return Ok(PopulateOutcome {
                    scheduled: 0,
                    sweep_id: Some(handle.id),
                    already_running: true,
                });
            }
        }

        let keys = self.cache.unresolved_keys().await?;
        let id = Uuid::new_v4();
        let scheduled = keys.len();
        let progress = Arc::new(SweepProgress::default());

        tracing::info!("Starting sweep {} over {} unresolved keys", id, scheduled);
        let task = tokio::spawn(run_sweep(
            id,
            keys,
            self.cache.clone(),
            self.resolver.clone(),
            self.marker.clone(),
            self.head_limit,
            self.pacing,
            progress.clone(),
        ));

        *current = Some(SweepHandle {
            id,
            scheduled,
            started_at: Utc::now(),
            progress,
            task: Some(task),
            state: SweepState::Running,
        });

        Ok(PopulateOutcome {
            scheduled,
            sweep_id: Some(id),
            already_running: false,
        })
    }

    /// 当前或最近一次任务的状态
    pub async fn status(&self) -> Option<SweepStatus> {
        let mut current = self.current.lock().await;
        let handle = current.as_mut()?;
        handle.settle().await;
        Some(handle.status())
    }

    /// 取消正在运行的任务，返回是否真的取消了
    ///
    /// 状态以 join 结果为准：abort 之前刚好跑完的任务仍记为 completed。
    pub async fn cancel(&self) -> bool {
        let mut current = self.current.lock().await;
        let Some(handle) = current.as_mut() else {
            return false;
        };
        let Some(task) = handle.task.take() else {
            return false;
        };

        task.abort();
        handle.state = finished_state(handle.id, task.await);
        let cancelled = handle.state == SweepState::Cancelled;
        if cancelled {
            tracing::info!("Sweep {} cancelled", handle.id);
        }
        cancelled
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_sweep(
    id: Uuid,
    keys: Vec<String>,
    cache: Arc<CacheService>,
    resolver: Arc<dyn LinkResolver>,
    marker: String,
    head_limit: usize,
    pacing: SweepPacing,
    progress: Arc<SweepProgress>,
) {
    for key in keys {
        let result = resolver.resolve_detailed(&key, head_limit, &marker).await;

        let delay = match result.destination_for(&key) {
            Some(value) => match cache.set(&key, &value).await {
                Ok(()) => {
                    let counter = if value == key {
                        &progress.self_linked
                    } else {
                        &progress.resolved
                    };
                    counter.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!("Sweep {}: {} -> {}", id, key, value);
                    pacing.after_success
                }
                Err(e) => {
                    progress.failed.fetch_add(1, Ordering::SeqCst);
                    tracing::error!("Sweep {}: failed to store {}: {}", id, key, e);
                    pacing.after_failure
                }
            },
            None => {
                // 留空，等下一次填充重试
                progress.unresolved.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(
                    "Sweep {}: {} left unresolved (member={:?}, status={})",
                    id,
                    key,
                    result.member_detected,
                    result.status_code
                );
                pacing.after_success
            }
        };

        progress.processed.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(delay).await;
    }

    tracing::info!(
        "Sweep {} finished: {} processed, {} resolved, {} self-linked, {} unresolved, {} failed",
        id,
        progress.processed.load(Ordering::SeqCst),
        progress.resolved.load(Ordering::SeqCst),
        progress.self_linked.load(Ordering::SeqCst),
        progress.unresolved.load(Ordering::SeqCst),
        progress.failed.load(Ordering::SeqCst),
    );
}
