//! 播放调度
//!
//! 所有状态（播放状态、音量、活动列表、预备播放器）由同一把锁保护。
//! 通知在持锁时发布，订阅者看到的顺序与状态变化的顺序一致；
//! 发布只往无界通道里发送，不会阻塞也不会回调进来。
//! 被移出的播放器总是在解锁后销毁。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use segue_player::{
    DecoderPlayerFactory, OutputSink, Player, PlayerEvent, PlayerFactory, PlayerId,
    PlayerObserver,
};

use crate::disposal::{ActiveSet, Disposer};
use crate::hub::EventHub;
use crate::{PlaybackState, StreamEventKind, TransportConfig, TransportError, TransportEvent};

/// 被 Transport 独占持有的播放器
struct Slot {
    id: PlayerId,
    player: Box<dyn Player>,
}

struct Core {
    state: PlaybackState,
    volume: f64,
    /// 最近启动的在前
    active: VecDeque<Slot>,
    next: Option<Slot>,
}

impl Core {
    fn set_state(&mut self, state: PlaybackState, events: &mut Vec<TransportEvent>) {
        if self.state != state {
            log::debug!("playback state {:?} -> {:?}", self.state, state);
            self.state = state;
            events.push(TransportEvent::PlaybackStateChanged(state));
        }
    }

    fn is_active(&self, id: PlayerId) -> bool {
        self.active.iter().any(|slot| slot.id == id)
    }

    fn is_front(&self, id: PlayerId) -> bool {
        self.active.front().map(|slot| slot.id) == Some(id)
    }
}

struct Shared {
    core: Mutex<Core>,
    factory: Arc<dyn PlayerFactory>,
    output: Arc<OutputSink>,
    hub: EventHub,
    disposer: Disposer,
    this: Weak<Shared>,
}

/// 播放调度器
///
/// 控制方法可以从任意线程调用，不会返回错误：没有可操作的播放器时
/// 返回 `false`，数值参数被截断，播放器故障以 [`StreamEventKind::Error`] 通知。
pub struct Transport {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Transport {
    /// 使用系统默认输出设备和 [`DecoderPlayerFactory`]
    pub fn with_config(config: &TransportConfig) -> Result<Self, TransportError> {
        Self::new(
            Arc::new(DecoderPlayerFactory::new(config.player.clone())),
            Arc::new(OutputSink::default_output()),
            config.volume,
        )
    }

    pub fn new(
        factory: Arc<dyn PlayerFactory>,
        output: Arc<OutputSink>,
        volume: f64,
    ) -> Result<Self, TransportError> {
        let (disposer, queue) = Disposer::channel();
        let volume = if volume.is_nan() { 1.0 } else { volume.clamp(0.0, 1.0) };

        let shared = Arc::new_cyclic(|this| Shared {
            core: Mutex::new(Core {
                state: PlaybackState::Stopped,
                volume,
                active: VecDeque::new(),
                next: None,
            }),
            factory,
            output,
            hub: EventHub::default(),
            disposer,
            this: this.clone(),
        });

        let worker = queue.spawn(Arc::downgrade(&shared))?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// 订阅通知，每个接收端都会收到全部后续事件
    pub fn subscribe(&self) -> Receiver<TransportEvent> {
        self.shared.hub.subscribe()
    }

    pub fn output(&self) -> &Arc<OutputSink> {
        &self.shared.output
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.shared.lock().state
    }

    /// 预备下一首，当前曲目播完时立即接上
    pub fn prepare_next_track(&self, url: &str) {
        log::info!("preparing next track {}", url);
        let slot = self.shared.create_slot(url);

        let replaced = self.shared.lock().next.replace(slot);
        if let Some(replaced) = replaced {
            log::debug!("discarding prepared track {}", replaced.player.url());
        }
    }

    /// 立即开始播放 `url`
    pub fn start(&self, url: &str) {
        log::info!("starting {}", url);
        let slot = self.shared.create_slot(url);
        self.shared.start_with_player(slot);
    }

    /// 丢弃预备播放器并销毁所有活动播放器
    pub fn stop(&self) {
        log::info!("stop");
        let mut events = Vec::new();

        let (prepared, detached) = {
            let mut core = self.shared.lock();
            let prepared = core.next.take();
            let detached: Vec<Slot> = core.active.drain(..).collect();
            core.set_state(PlaybackState::Stopped, &mut events);
            self.shared.hub.publish(events);
            (prepared, detached)
        };

        // 销毁会等待播放线程退出，而播放线程的回调需要这把锁
        if !detached.is_empty() {
            log::debug!("disposing {} active player(s)", detached.len());
        }
        drop(prepared);
        drop(detached);
    }

    pub fn pause(&self) -> bool {
        log::info!("pause");
        self.shared.for_each_active(PlaybackState::Paused, |slot| slot.player.pause())
    }

    pub fn resume(&self) -> bool {
        log::info!("resume");
        self.shared.for_each_active(PlaybackState::Playing, |slot| slot.player.resume())
    }

    /// 最近启动的播放器的位置（秒），没有则为 0
    pub fn position(&self) -> f64 {
        self.shared
            .lock()
            .active
            .front()
            .map(|slot| slot.player.position())
            .unwrap_or(0.0)
    }

    pub fn set_position(&self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        let mut core = self.shared.lock();
        if let Some(slot) = core.active.front_mut() {
            slot.player.set_position(seconds);
            self.shared
                .hub
                .publish(vec![TransportEvent::PositionChanged(seconds)]);
        }
    }

    pub fn volume(&self) -> f64 {
        self.shared.lock().volume
    }

    /// 设置音量，截断到 [0, 1]
    pub fn set_volume(&self, volume: f64) {
        if volume.is_nan() {
            log::warn!("ignoring NaN volume");
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        log::info!("set volume {}%", (volume * 100.0).round());

        let mut core = self.shared.lock();
        let changed = core.volume != volume;
        core.volume = volume;
        // 即使没变也下发，播放器切换后保持一致
        if let Some(slot) = core.active.front_mut() {
            slot.player.set_volume(volume);
        }
        if changed {
            self.shared
                .hub
                .publish(vec![TransportEvent::VolumeChanged(volume)]);
        }
    }

    pub fn active_count(&self) -> usize {
        self.shared.lock().active.len()
    }

    pub fn has_prepared_track(&self) -> bool {
        self.shared.lock().next.is_some()
    }

    pub fn prepared_track(&self) -> Option<String> {
        self.shared
            .lock()
            .next
            .as_ref()
            .map(|slot| slot.player.url().to_string())
    }

    /// 最近启动的曲目
    pub fn now_playing(&self) -> Option<String> {
        self.shared
            .lock()
            .active
            .front()
            .map(|slot| slot.player.url().to_string())
    }

    /// 等待已经排队的播放器移除全部完成
    pub fn flush(&self) {
        self.shared.disposer.flush();
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.stop();
        self.shared.disposer.shutdown();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("disposal worker panicked");
            }
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 工厂调用在锁外进行
    fn create_slot(&self, url: &str) -> Slot {
        let volume = self.lock().volume;
        let id = PlayerId::next();
        let player = self.factory.create(url, volume, &self.output);
        log::debug!("created player {} for {}", id, url);
        Slot { id, player }
    }

    fn start_with_player(&self, slot: Slot) {
        let scheduled = slot.player.url().to_string();

        let stale = {
            let mut core = self.lock();
            let stale = core.next.take().filter(|prepared| prepared.id != slot.id);
            self.activate(&mut core, slot);
            self.hub.publish(vec![TransportEvent::stream(
                StreamEventKind::Scheduled,
                &scheduled,
            )]);
            stale
        };

        if let Some(stale) = stale {
            log::debug!("discarding prepared track {}", stale.player.url());
        }
    }

    /// 订阅事件、放到活动列表最前并开始播放；调用方持锁
    fn activate(&self, core: &mut Core, mut slot: Slot) {
        slot.player.subscribe(Arc::new(TransportListener {
            id: slot.id,
            url: slot.player.url().to_string(),
            shared: self.this.clone(),
        }));
        slot.player.set_volume(core.volume);
        slot.player.play();
        log::debug!("player {} now active", slot.id);
        core.active.push_front(slot);
    }

    fn for_each_active(&self, target: PlaybackState, f: impl Fn(&mut Slot)) -> bool {
        let mut events = Vec::new();
        let mut core = self.lock();
        for slot in core.active.iter_mut() {
            f(slot);
        }
        let any = !core.active.is_empty();
        if any {
            core.set_state(target, &mut events);
        }
        self.hub.publish(events);
        any
    }

    fn handle_player_event(&self, id: PlayerId, url: &str, event: PlayerEvent) {
        let mut events = Vec::new();
        let terminal = event.is_terminal();

        {
            let mut core = self.lock();

            // 已被 stop() 摘下或已移除的播放器，迟到的事件直接忽略
            if !core.is_active(id) {
                log::debug!("ignoring {:?} from detached player {}", event, id);
                return;
            }

            // 较早启动的播放器结束时，不影响更新的播放器的状态
            let is_front = core.is_front(id);

            match event {
                PlayerEvent::Started => {
                    events.push(TransportEvent::stream(StreamEventKind::Playing, url));
                    core.set_state(PlaybackState::Playing, &mut events);
                }
                PlayerEvent::AlmostEnded => {
                    events.push(TransportEvent::stream(StreamEventKind::AlmostDone, url));
                    if core.next.is_none() {
                        log::debug!("{} almost done and nothing prepared", url);
                    }
                }
                PlayerEvent::Finished => {
                    events.push(TransportEvent::stream(StreamEventKind::Finished, url));
                    match core.next.take() {
                        Some(next) => {
                            let next_url = next.player.url().to_string();
                            log::info!("gapless transition {} -> {}", url, next_url);
                            self.activate(&mut core, next);
                            events.push(TransportEvent::stream(
                                StreamEventKind::Scheduled,
                                &next_url,
                            ));
                            core.set_state(PlaybackState::Playing, &mut events);
                        }
                        None if is_front => core.set_state(PlaybackState::Stopped, &mut events),
                        None => {}
                    }
                }
                PlayerEvent::Stopped => {
                    events.push(TransportEvent::stream(StreamEventKind::Stopped, url));
                    if is_front {
                        core.set_state(PlaybackState::Stopped, &mut events);
                    }
                }
                PlayerEvent::Error(message) => {
                    log::warn!("player {} failed on {}: {}", id, url, message);
                    events.push(TransportEvent::stream(StreamEventKind::Error, url));
                    if is_front {
                        core.set_state(PlaybackState::Stopped, &mut events);
                    }
                }
            }

            self.hub.publish(events);
        }

        // 当前在播放器自己的线程上，销毁交给销毁线程
        if terminal {
            self.disposer.schedule_removal(id);
        }
    }
}

impl ActiveSet for Shared {
    fn remove_active(&self, id: PlayerId) -> bool {
        let removed = {
            let mut core = self.lock();
            core.active
                .iter()
                .position(|slot| slot.id == id)
                .and_then(|index| core.active.remove(index))
        };

        match removed {
            Some(slot) => {
                log::debug!("removing finished player {} ({})", id, slot.player.url());
                drop(slot);
                true
            }
            None => false,
        }
    }
}

/// 安装到播放器上的观察者，只持有 Transport 的弱引用
struct TransportListener {
    id: PlayerId,
    url: String,
    shared: Weak<Shared>,
}

impl PlayerObserver for TransportListener {
    fn on_player_event(&self, event: PlayerEvent) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_player_event(self.id, &self.url, event);
        }
    }
}
