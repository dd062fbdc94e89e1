//! 播放器销毁队列
//!
//! 播放器的 Drop 会等待它的后台线程退出，不能在该线程自己的事件回调里执行，
//! 也不能在持锁时执行。终止事件因此只投递一个移除任务，由独立线程完成。

use std::io;
use std::sync::Weak;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use segue_player::PlayerId;

/// 可以按标识移除并销毁播放器的一方
pub(crate) trait ActiveSet: Send + Sync + 'static {
    /// 找不到时什么也不做，返回 `false`
    fn remove_active(&self, id: PlayerId) -> bool;
}

enum DisposalTask {
    Remove(PlayerId),
    Flush(Sender<()>),
    Shutdown,
}

/// 投递端
pub(crate) struct Disposer {
    tx: Sender<DisposalTask>,
}

impl Disposer {
    /// 创建投递端和接收端
    pub(crate) fn channel() -> (Self, DisposalQueue) {
        let (tx, rx) = unbounded();
        (Self { tx }, DisposalQueue { rx })
    }

    pub(crate) fn schedule_removal(&self, id: PlayerId) {
        if self.tx.send(DisposalTask::Remove(id)).is_err() {
            log::warn!("disposal worker gone, player {} left in place", id);
        }
    }

    /// 等待此前投递的任务全部完成
    pub(crate) fn flush(&self) {
        let (ack_tx, ack_rx) = bounded(1);
        if self.tx.send(DisposalTask::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.tx.send(DisposalTask::Shutdown);
    }
}

/// 接收端，交给 [`DisposalQueue::spawn`] 消费
pub(crate) struct DisposalQueue {
    rx: Receiver<DisposalTask>,
}

impl DisposalQueue {
    pub(crate) fn spawn<S: ActiveSet>(self, owner: Weak<S>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("segue-disposal".to_string())
            .spawn(move || self.run(owner))
    }

    fn run<S: ActiveSet>(self, owner: Weak<S>) {
        while let Ok(task) = self.rx.recv() {
            match task {
                DisposalTask::Remove(id) => match owner.upgrade() {
                    Some(owner) => {
                        if !owner.remove_active(id) {
                            log::debug!("player {} already removed", id);
                        }
                    }
                    None => break,
                },
                DisposalTask::Flush(ack) => {
                    let _ = ack.send(());
                }
                DisposalTask::Shutdown => break,
            }
        }
        log::debug!("disposal worker exiting");
    }
}
