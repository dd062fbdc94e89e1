//! 交互循环

use std::io::{self, BufRead, Write};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use segue_transport::{PlaybackState, StreamEventKind, Transport, TransportEvent};

use crate::command::{Command, HELP};

/// 执行结果
#[derive(Debug, PartialEq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell<'a> {
    transport: &'a Transport,
}

impl<'a> Shell<'a> {
    pub fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// 逐行读取命令直到 `quit` 或输入结束
    pub fn run(&self, input: impl BufRead) -> Result<()> {
        prompt()?;
        for line in input.lines() {
            let line = line.context("Failed to read command")?;
            match Command::parse(&line) {
                Ok(Some(command)) => {
                    if self.execute(command) == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => eprintln!("{}", e),
            }
            prompt()?;
        }
        Ok(())
    }

    pub fn execute(&self, command: Command) -> Flow {
        let transport = self.transport;
        match command {
            Command::Play(url) => {
                transport.stop();
                transport.start(&url);
            }
            Command::Next(url) => transport.prepare_next_track(&url),
            Command::Pause => {
                let done = match transport.playback_state() {
                    PlaybackState::Paused => transport.resume(),
                    _ => transport.pause(),
                };
                if !done {
                    println!("nothing is playing");
                }
            }
            Command::Stop => transport.stop(),
            Command::Seek(seconds) => transport.set_position(seconds),
            Command::Volume(volume) => transport.set_volume(volume),
            Command::Position => println!("{:.1}s", transport.position()),
            Command::Status => {
                println!("state:   {:?}", transport.playback_state());
                println!("volume:  {:.0}%", transport.volume() * 100.0);
                println!(
                    "playing: {}",
                    transport.now_playing().as_deref().unwrap_or("-")
                );
                println!(
                    "next:    {}",
                    transport.prepared_track().as_deref().unwrap_or("-")
                );
                println!("output:  {}", transport.output().name());
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }
}

fn prompt() -> Result<()> {
    let mut stdout = io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()?;
    Ok(())
}

/// 在后台线程打印所有通知，Transport 销毁后线程退出
pub fn spawn_event_printer(events: Receiver<TransportEvent>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("segue-events".to_string())
        .spawn(move || {
            for event in events {
                println!("{}", describe(&event));
                if let TransportEvent::Stream {
                    kind: StreamEventKind::AlmostDone,
                    ..
                } = event
                {
                    println!("  (use `next <file>` to queue the following track)");
                }
            }
        })
}

fn describe(event: &TransportEvent) -> String {
    match event {
        TransportEvent::PlaybackStateChanged(state) => format!("[state] {:?}", state),
        TransportEvent::Stream { kind, url } => format!("[stream] {:?} {}", kind, url),
        TransportEvent::VolumeChanged(volume) => format!("[volume] {:.0}%", volume * 100.0),
        TransportEvent::PositionChanged(seconds) => format!("[seek] {:.1}s", seconds),
    }
}
