// command.rs - Producer to worker command queue

//! Bounded command queue between the public API and the mixer worker.
//!
//! Producers push under a short lock. The worker swaps the pending buffer
//! out with its own drained buffer, so the lock is never held while
//! commands are processed.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::sound::mixer::types::{
    ActorChannel, ActorId, MixerError, MixerResult, SoundCategory, SoundId,
};

/// Default number of pending play commands
pub const DEFAULT_COMMAND_CAPACITY: usize = 128;

/// A request from the API to the worker
#[derive(Clone)]
pub enum Command {
    Play {
        category: SoundCategory,
        sound: SoundId,
        data: Arc<[u8]>,
        actor: Option<ActorId>,
        channel: ActorChannel,
    },
    StopMusic,
}

impl Command {
    pub fn is_music_play(&self) -> bool {
        matches!(self, Command::Play { category, .. } if category.is_music())
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Play {
                category,
                sound,
                data,
                actor,
                channel,
            } => f
                .debug_struct("Play")
                .field("category", category)
                .field("sound", sound)
                .field("bytes", &data.len())
                .field("actor", actor)
                .field("channel", channel)
                .finish(),
            Command::StopMusic => f.write_str("StopMusic"),
        }
    }
}

#[derive(Debug, Default)]
struct Pending {
    commands: Vec<Command>,
    /// A drained music play whose pass has not been published yet
    music_in_flight: bool,
}

/// Thread-safe command queue
#[derive(Debug)]
pub struct CommandQueue {
    pending: Mutex<Pending>,
    capacity: usize,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_CAPACITY)
    }
}

/// Whether the latest music-affecting command in `commands` starts music
fn last_music_is_play(commands: &[Command]) -> Option<bool> {
    commands
        .iter()
        .rev()
        .find(|c| c.is_music_play() || matches!(c, Command::StopMusic))
        .map(Command::is_music_play)
}

impl CommandQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(Pending {
                commands: Vec::with_capacity(capacity),
                music_in_flight: false,
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queue a command. Play commands are refused once `capacity` of them
    /// are pending; `StopMusic` is always accepted.
    pub fn push(&self, command: Command) -> MixerResult<()> {
        let mut pending = self.pending.lock();
        if matches!(command, Command::Play { .. }) {
            let plays = pending
                .commands
                .iter()
                .filter(|c| matches!(c, Command::Play { .. }))
                .count();
            if plays >= self.capacity {
                return Err(MixerError::QueueFull(plays));
            }
        }
        pending.commands.push(command);
        Ok(())
    }

    /// Queue `StopMusic` if music is queued, in flight, or `playing` says
    /// so. `playing` runs under the queue lock.
    pub fn push_stop_music<F>(&self, playing: F) -> MixerResult<()>
    where
        F: FnOnce() -> bool,
    {
        let mut pending = self.pending.lock();
        let has_music = match last_music_is_play(&pending.commands) {
            Some(queued) => queued,
            None => pending.music_in_flight || playing(),
        };
        if !has_music {
            return Err(MixerError::NothingToStop);
        }
        pending.commands.push(Command::StopMusic);
        Ok(())
    }

    /// Move all pending commands into `out` (cleared first), preserving order
    pub fn drain_into(&self, out: &mut Vec<Command>) {
        out.clear();
        let mut pending = self.pending.lock();
        std::mem::swap(&mut pending.commands, out);
        if let Some(play) = last_music_is_play(out) {
            pending.music_in_flight = play;
        }
    }

    /// Record whether music is actually playing once the drained commands
    /// have been applied; a drained play whose data failed to decode no
    /// longer counts
    pub fn settle_music(&self, playing: bool) {
        self.pending.lock().music_in_flight = playing;
    }

    /// End of a mixing pass: run `publish` under the queue lock and forget
    /// the music drained for this pass
    pub fn complete_pass<F>(&self, publish: F)
    where
        F: FnOnce(),
    {
        let mut pending = self.pending.lock();
        publish();
        pending.music_in_flight = false;
    }

    /// Whether music will be playing once queued commands are applied,
    /// ignoring music that is already playing
    pub fn music_pending(&self) -> bool {
        let pending = self.pending.lock();
        last_music_is_play(&pending.commands).unwrap_or(pending.music_in_flight)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().commands.is_empty()
    }

    pub fn clear(&self) {
        let mut pending = self.pending.lock();
        pending.commands.clear();
        pending.music_in_flight = false;
    }
}
