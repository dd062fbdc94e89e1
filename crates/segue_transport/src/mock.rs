//! 测试用播放器

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use segue_player::{OutputSink, Player, PlayerEvent, PlayerFactory, PlayerObserver};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Play,
    Pause,
    Resume,
    Stop,
    SetPosition(f64),
    SetVolume(f64),
}

#[derive(Default)]
struct Probe {
    calls: Mutex<Vec<Call>>,
    observer: Mutex<Option<Arc<dyn PlayerObserver>>>,
    position: Mutex<f64>,
    dropped: AtomicBool,
}

/// 测试侧持有的句柄，可以观察调用并模拟事件
#[derive(Clone)]
pub(crate) struct MockHandle {
    pub(crate) url: String,
    pub(crate) initial_volume: f64,
    probe: Arc<Probe>,
}

impl MockHandle {
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.probe.calls.lock().unwrap().clone()
    }

    pub(crate) fn is_subscribed(&self) -> bool {
        self.probe.observer.lock().unwrap().is_some()
    }

    /// 取出订阅的观察者，用来模拟播放器销毁后才到达的事件
    pub(crate) fn observer(&self) -> Option<Arc<dyn PlayerObserver>> {
        self.probe.observer.lock().unwrap().clone()
    }

    pub(crate) fn is_dropped(&self) -> bool {
        self.probe.dropped.load(Ordering::SeqCst)
    }

    pub(crate) fn set_reported_position(&self, seconds: f64) {
        *self.probe.position.lock().unwrap() = seconds;
    }

    /// 像播放线程那样发出事件；未订阅时丢弃
    pub(crate) fn emit(&self, event: PlayerEvent) {
        if let Some(observer) = self.observer() {
            observer.on_player_event(event);
        }
    }
}

struct MockPlayer {
    url: String,
    probe: Arc<Probe>,
}

impl MockPlayer {
    fn record(&self, call: Call) {
        self.probe.calls.lock().unwrap().push(call);
    }
}

impl Player for MockPlayer {
    fn url(&self) -> &str {
        &self.url
    }

    fn subscribe(&mut self, observer: Arc<dyn PlayerObserver>) {
        *self.probe.observer.lock().unwrap() = Some(observer);
    }

    fn play(&mut self) {
        self.record(Call::Play);
    }

    fn pause(&mut self) {
        self.record(Call::Pause);
    }

    fn resume(&mut self) {
        self.record(Call::Resume);
    }

    fn stop(&mut self) {
        self.record(Call::Stop);
    }

    fn position(&self) -> f64 {
        *self.probe.position.lock().unwrap()
    }

    fn set_position(&mut self, seconds: f64) {
        self.record(Call::SetPosition(seconds));
    }

    fn set_volume(&mut self, volume: f64) {
        self.record(Call::SetVolume(volume));
    }
}

impl Drop for MockPlayer {
    fn drop(&mut self) {
        // 观察者持有 Transport 的弱引用，随播放器一起释放
        self.probe.observer.lock().unwrap().take();
        self.probe.dropped.store(true, Ordering::SeqCst);
    }
}

/// 记录每个创建出来的播放器
#[derive(Default)]
pub(crate) struct MockFactory {
    created: Mutex<Vec<MockHandle>>,
}

impl MockFactory {
    pub(crate) fn created(&self) -> Vec<MockHandle> {
        self.created.lock().unwrap().clone()
    }

    /// 按地址找最近创建的播放器
    pub(crate) fn player(&self, url: &str) -> MockHandle {
        self.created()
            .into_iter()
            .rev()
            .find(|handle| handle.url == url)
            .unwrap_or_else(|| panic!("no player created for {}", url))
    }
}

impl PlayerFactory for MockFactory {
    fn create(&self, url: &str, volume: f64, _output: &Arc<OutputSink>) -> Box<dyn Player> {
        let probe = Arc::new(Probe::default());
        self.created.lock().unwrap().push(MockHandle {
            url: url.to_string(),
            initial_volume: volume,
            probe: probe.clone(),
        });
        Box::new(MockPlayer {
            url: url.to_string(),
            probe,
        })
    }
}
