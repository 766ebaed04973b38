//! Season playback for the seed race.
//!
//! `Playback` is the plain state machine. `spawn_driver` moves it into a
//! tokio task that owns it, applies commands in arrival order and ticks on a
//! fixed cadence only while playing.

use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::error::DataError;

pub const DEFAULT_CADENCE: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Moved to the year at the new index.
    Advanced(i32),
    /// Moved to the final year and stopped.
    Finished(i32),
    /// Not playing; nothing changed.
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playback {
    years: Vec<i32>,
    index: usize,
    playing: bool,
}

impl Playback {
    /// Years are sorted and deduplicated so the list is strictly increasing.
    pub fn new(mut years: Vec<i32>) -> Self {
        years.sort_unstable();
        years.dedup();
        Self {
            years,
            index: 0,
            playing: false,
        }
    }

    pub fn with_skipped(years: impl IntoIterator<Item = i32>, skip: &[i32]) -> Self {
        Self::new(years.into_iter().filter(|y| !skip.contains(y)).collect())
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_year(&self) -> Option<i32> {
        self.years.get(self.index).copied()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    fn at_end(&self) -> bool {
        self.index + 1 >= self.years.len()
    }

    /// Start advancing. Returns whether playback is now running; it will not
    /// start on an empty list or from the last year.
    pub fn play(&mut self) -> bool {
        if !self.at_end() {
            self.playing = true;
        }
        self.playing
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn toggle(&mut self) -> bool {
        if self.playing {
            self.pause();
            false
        } else {
            self.play()
        }
    }

    pub fn reset(&mut self) {
        self.playing = false;
        self.index = 0;
    }

    /// Jump to `index`. Playback always stops first; an out-of-range index
    /// leaves the position unchanged.
    pub fn select(&mut self, index: usize) -> Option<i32> {
        self.playing = false;
        let year = self.years.get(index).copied()?;
        self.index = index;
        Some(year)
    }

    pub fn tick(&mut self) -> Tick {
        if !self.playing {
            return Tick::Idle;
        }
        if self.at_end() {
            self.playing = false;
            return Tick::Idle;
        }

        self.index += 1;
        let year = self.years[self.index];
        if self.at_end() {
            self.playing = false;
            Tick::Finished(year)
        } else {
            Tick::Advanced(year)
        }
    }

    pub fn frame(&self) -> Frame {
        Frame {
            index: self.index(),
            year: self.current_year(),
            playing: self.playing,
        }
    }
}

/// Snapshot published after every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub index: usize,
    pub year: Option<i32>,
    pub playing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    Play,
    Pause,
    Toggle,
    Reset,
    Select(usize),
}

struct Request {
    command: PlaybackCommand,
    reply: oneshot::Sender<Result<Frame, DataError>>,
}

/// Client side of a running playback driver.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    commands: mpsc::Sender<Request>,
    frames: watch::Receiver<Frame>,
}

impl PlaybackHandle {
    /// Apply `command` and return the frame it produced. An out-of-range
    /// selection still halts playback but comes back as an error.
    pub async fn send(&self, command: PlaybackCommand) -> Result<Frame, DataError> {
        let stopped = || DataError::unavailable("playback", "driver has stopped");
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Request { command, reply })
            .await
            .map_err(|_| stopped())?;
        response.await.map_err(|_| stopped())?
    }

    pub fn current(&self) -> Frame {
        *self.frames.borrow()
    }

    pub fn frames(&self) -> watch::Receiver<Frame> {
        self.frames.clone()
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn start_ticker(cadence: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + cadence, cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Run `playback` on a background task. The task ends once every handle
/// has been dropped.
pub fn spawn_driver(playback: Playback, cadence: Duration) -> (PlaybackHandle, JoinHandle<()>) {
    let (command_tx, mut command_rx) = mpsc::channel(16);
    let (frame_tx, frame_rx) = watch::channel(playback.frame());

    let task = tokio::spawn(async move {
        let mut playback = playback;
        let mut ticker: Option<Interval> = None;

        loop {
            tokio::select! {
                request = command_rx.recv() => {
                    let Some(Request { command, reply }) = request else { break };
                    let mut outcome = Ok(());
                    match command {
                        PlaybackCommand::Play => { playback.play(); }
                        PlaybackCommand::Pause => playback.pause(),
                        PlaybackCommand::Toggle => { playback.toggle(); }
                        PlaybackCommand::Reset => playback.reset(),
                        PlaybackCommand::Select(index) => {
                            if playback.select(index).is_none() {
                                tracing::warn!("Ignoring playback selection {} out of range", index);
                                outcome = Err(DataError::InvalidQuery(format!(
                                    "season index {} is out of range (0-{})",
                                    index,
                                    playback.years().len().saturating_sub(1)
                                )));
                            }
                        }
                    }

                    if !playback.is_playing() {
                        ticker = None;
                    } else if ticker.is_none() {
                        ticker = Some(start_ticker(cadence));
                    }
                    let frame = playback.frame();
                    frame_tx.send_replace(frame);
                    let _ = reply.send(outcome.map(|_| frame));
                }
                _ = next_tick(&mut ticker) => {
                    match playback.tick() {
                        Tick::Advanced(year) => tracing::debug!("Playback advanced to {}", year),
                        Tick::Finished(year) => tracing::debug!("Playback finished at {}", year),
                        Tick::Idle => {}
                    }
                    if !playback.is_playing() {
                        ticker = None;
                    }
                    frame_tx.send_replace(playback.frame());
                }
            }
        }

        tracing::debug!("Playback driver stopped");
    });

    (
        PlaybackHandle {
            commands: command_tx,
            frames: frame_rx,
        },
        task,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five_years() -> Playback {
        Playback::new(vec![2019, 2021, 2022, 2023, 2024])
    }

    #[test]
    fn test_years_strictly_increasing() {
        let playback = Playback::with_skipped(vec![2024, 2019, 2020, 2019, 2025, 2021], &[2020, 2025]);
        assert_eq!(playback.years(), &[2019, 2021, 2024]);
    }

    #[test]
    fn test_play_runs_to_end_and_stops() {
        let mut playback = five_years();
        assert!(playback.play());

        let mut ticks = Vec::new();
        for _ in 0..10 {
            ticks.push(playback.tick());
            assert!(playback.index() <= 4);
        }

        assert_eq!(&ticks[..4], &[
            Tick::Advanced(2021),
            Tick::Advanced(2022),
            Tick::Advanced(2023),
            Tick::Finished(2024),
        ]);
        assert!(ticks[4..].iter().all(|t| *t == Tick::Idle));
        assert_eq!(playback.index(), 4);
        assert!(!playback.is_playing());
    }

    #[test]
    fn test_pause_keeps_position() {
        let mut playback = five_years();
        playback.play();
        playback.tick();
        playback.tick();
        playback.pause();
        assert_eq!(playback.tick(), Tick::Idle);
        assert_eq!(playback.current_year(), Some(2022));
    }

    #[test]
    fn test_reset_returns_to_start() {
        let mut playback = five_years();
        playback.play();
        playback.tick();
        playback.reset();
        assert_eq!(playback.index(), 0);
        assert!(!playback.is_playing());
    }

    #[test]
    fn test_select_halts_playback() {
        let mut playback = five_years();
        playback.play();
        assert_eq!(playback.select(3), Some(2023));
        assert!(!playback.is_playing());

        playback.play();
        assert_eq!(playback.select(9), None);
        assert!(!playback.is_playing());
        assert_eq!(playback.index(), 3);
    }

    #[test]
    fn test_play_at_end_or_empty_is_noop() {
        let mut playback = five_years();
        playback.select(4);
        assert!(!playback.play());

        let mut empty = Playback::new(Vec::new());
        assert!(!empty.play());
        assert_eq!(empty.current_year(), None);
        assert_eq!(empty.tick(), Tick::Idle);
    }

    #[test]
    fn test_toggle() {
        let mut playback = five_years();
        assert!(playback.toggle());
        assert!(!playback.toggle());
        assert!(!playback.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_plays_to_last_year() {
        let (handle, _task) = spawn_driver(five_years(), DEFAULT_CADENCE);
        let mut frames = handle.frames();

        let started = Instant::now();
        handle.send(PlaybackCommand::Play).await.unwrap();

        let last = *frames
            .wait_for(|frame| frame.index == 4 && !frame.playing)
            .await
            .unwrap();

        assert_eq!(last.year, Some(2024));
        let elapsed = started.elapsed();
        assert!(elapsed >= DEFAULT_CADENCE * 4 && elapsed < DEFAULT_CADENCE * 5);

        // nothing moves after the end
        tokio::time::sleep(DEFAULT_CADENCE * 3).await;
        assert_eq!(handle.current(), last);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_select_stops_timer() {
        let (handle, _task) = spawn_driver(five_years(), DEFAULT_CADENCE);
        let mut frames = handle.frames();

        handle.send(PlaybackCommand::Play).await.unwrap();
        frames.wait_for(|frame| frame.index == 1).await.unwrap();

        handle.send(PlaybackCommand::Select(3)).await.unwrap();
        frames.wait_for(|frame| frame.index == 3).await.unwrap();
        assert!(!handle.current().playing);

        tokio::time::sleep(DEFAULT_CADENCE * 2).await;
        assert_eq!(handle.current().index, 3);

        handle.send(PlaybackCommand::Reset).await.unwrap();
        frames.wait_for(|frame| frame.index == 0).await.unwrap();
        assert!(!handle.current().playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_replies_with_resulting_frame() {
        let (handle, _task) = spawn_driver(five_years(), DEFAULT_CADENCE);

        let frame = handle.send(PlaybackCommand::Toggle).await.unwrap();
        assert!(frame.playing);
        assert_eq!(frame.index, 0);

        tokio::time::sleep(DEFAULT_CADENCE + Duration::from_millis(10)).await;
        let frame = handle.send(PlaybackCommand::Pause).await.unwrap();
        assert!(!frame.playing);
        assert_eq!(frame.year, Some(2021));

        let frame = handle.send(PlaybackCommand::Select(3)).await.unwrap();
        assert_eq!((frame.index, frame.year), (3, Some(2023)));

        handle.send(PlaybackCommand::Play).await.unwrap();
        let rejected = handle.send(PlaybackCommand::Select(7)).await;
        assert!(matches!(rejected, Err(DataError::InvalidQuery(_))));
        assert_eq!(handle.current().index, 3);
        assert!(!handle.current().playing);
    }
}
