//! 运行状态表 - 编排层
//!
//! 监管器和对账任务都会改这张表，所有访问都经过同一把互斥锁，
//! 保证每条记录同一时刻只有一个写入者。

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::process::Child;
use tracing::debug;

use crate::models::WorkflowRun;

/// 表内条目：运行记录 + 对应的子进程句柄
pub struct TrackedRun {
    pub run: WorkflowRun,
    /// 子进程退出并被对账后置为 None
    pub child: Option<Child>,
    /// 插入序号（list 按它倒序：最新的在前）
    seq: u64,
}

/// 运行状态表
pub struct RunTable {
    inner: Mutex<Inner>,
    capacity: usize,
}

struct Inner {
    runs: HashMap<u32, TrackedRun>,
    next_seq: u64,
}

impl RunTable {
    /// 创建状态表
    ///
    /// # 参数
    /// - `capacity`: 容量上限，超出后淘汰最旧的已结束运行
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                runs: HashMap::new(),
                next_seq: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// 登记一个新运行
    pub fn insert(&self, run: WorkflowRun, child: Child) {
        let mut inner = self.inner.lock().unwrap();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.runs.insert(
            run.pid,
            TrackedRun {
                run,
                child: Some(child),
                seq,
            },
        );
        rotate(&mut inner, self.capacity);
    }

    /// 读取一条运行记录的快照
    pub fn get(&self, pid: u32) -> Option<WorkflowRun> {
        self.inner
            .lock()
            .unwrap()
            .runs
            .get(&pid)
            .map(|t| t.run.clone())
    }

    /// 在锁内修改一条记录
    pub fn with_mut<R>(&self, pid: u32, f: impl FnOnce(&mut TrackedRun) -> R) -> Option<R> {
        self.inner.lock().unwrap().runs.get_mut(&pid).map(f)
    }

    /// 在锁内遍历全部记录（对账用）
    pub fn for_each<F: FnMut(&mut TrackedRun)>(&self, mut f: F) {
        let mut inner = self.inner.lock().unwrap();
        for tracked in inner.runs.values_mut() {
            f(tracked);
        }
        rotate(&mut inner, self.capacity);
    }

    /// 全部运行记录，最新的在前
    pub fn list(&self) -> Vec<WorkflowRun> {
        let inner = self.inner.lock().unwrap();
        let mut entries: Vec<(&u64, &WorkflowRun)> = inner
            .runs
            .values()
            .map(|t| (&t.seq, &t.run))
            .collect();
        entries.sort_by(|a, b| b.0.cmp(a.0));
        entries.into_iter().map(|(_, run)| run.clone()).collect()
    }

    /// 移除一条记录（显式清理）
    pub fn remove(&self, pid: u32) -> Option<WorkflowRun> {
        self.inner
            .lock()
            .unwrap()
            .runs
            .remove(&pid)
            .map(|t| t.run)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 容量满时淘汰最旧的已结束运行；活跃运行从不淘汰
fn rotate(inner: &mut Inner, capacity: usize) {
    while inner.runs.len() > capacity {
        let oldest_finished = inner
            .runs
            .values()
            .filter(|t| t.run.state.is_terminal())
            .min_by_key(|t| t.seq)
            .map(|t| t.run.pid);
        match oldest_finished {
            Some(pid) => {
                debug!("状态表已满，淘汰运行 pid={}", pid);
                inner.runs.remove(&pid);
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunState, WorkflowKind};
    use std::path::PathBuf;

    fn run(pid: u32, state: RunState) -> WorkflowRun {
        WorkflowRun {
            pid,
            kind: WorkflowKind::Partial,
            state,
            started_at: chrono::Local::now(),
            current_step: 0,
            total_steps: 3,
            log_file: PathBuf::from(format!("logs/{}.log", pid)),
            failure_reason: None,
        }
    }

    fn sleeping_child() -> Child {
        tokio::process::Command::new("sleep")
            .arg("5")
            .spawn()
            .expect("测试需要能启动 sleep")
    }

    #[tokio::test]
    async fn test_list_is_most_recent_first() {
        let table = RunTable::new(10);
        for pid in [11, 22, 33] {
            table.insert(run(pid, RunState::Running), sleeping_child());
        }
        let pids: Vec<u32> = table.list().iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![33, 22, 11]);
    }

    #[tokio::test]
    async fn test_rotation_evicts_oldest_finished_only() {
        let table = RunTable::new(2);
        table.insert(run(1, RunState::Completed), sleeping_child());
        table.insert(run(2, RunState::Running), sleeping_child());
        table.insert(run(3, RunState::Failed), sleeping_child());

        // 容量 2：最旧的已结束运行 (pid=1) 被淘汰，活跃的保留
        assert_eq!(table.len(), 2);
        assert!(table.get(1).is_none());
        assert!(table.get(2).is_some());
        assert!(table.get(3).is_some());
    }

    #[tokio::test]
    async fn test_with_mut_updates_record() {
        let table = RunTable::new(10);
        table.insert(run(7, RunState::Starting), sleeping_child());

        let updated = table.with_mut(7, |t| {
            t.run.state = RunState::Running;
            t.run.current_step = 2;
        });
        assert!(updated.is_some());

        let snapshot = table.get(7).unwrap();
        assert_eq!(snapshot.state, RunState::Running);
        assert_eq!(snapshot.current_step, 2);

        assert!(table.with_mut(999, |_| ()).is_none());
    }
}
