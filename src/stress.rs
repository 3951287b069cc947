//! Random file stress loop
//!
//! Creates files with random names, appends random-length chunks of the fixed
//! write buffer, closes each file with ~10% probability per chunk and falls
//! back to reformatting the card when files can no longer be created.
//!
//! # States
//! - `Opening`: draw a name and create the file. On failure, delete the last
//!   file written; if that works, recover. If it does not, retry with a new
//!   name, up to `max_reopen_attempts` times before recovering anyway.
//! - `Writing`: write one chunk, then either close the file or pause and write
//!   another. A failed write closes the file and goes back to `Opening`.
//! - `Recovering`: remount with format. Success resumes `Opening`; failure
//!   halts the loop for good.
//!
//! The volume is only borrowed while opening and writing; recovery needs it by
//! value, so [`StressLoop::run`] leaves the borrowing inner loop before
//! remounting.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;

use crate::buffer::{WriteBuffer, WRITE_BUFFER};
use crate::cancel::CancelToken;
use crate::config::StressConfig;
use crate::error::Error;
use crate::fmt::Debug2Format;
use crate::mount::Storage;
use crate::path::{file_path, FilePath};
use crate::power::PowerSequence;
use crate::random::EntropySource;
use crate::storage::{StorageService, Volume, VolumeFile};

/// Process-lifetime counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Counters {
    /// Files closed successfully
    pub written_files: u32,
    /// Bytes in successful chunk writes
    pub written_bytes: u64,
    /// Successful remount-with-format cycles
    pub recoveries: u32,
}

// Counters are diagnostics; they saturate instead of wrapping or panicking.
impl Counters {
    fn file_closed(&mut self) {
        self.written_files = self.written_files.saturating_add(1);
    }

    fn chunk_written(&mut self, len: usize) {
        self.written_bytes = self.written_bytes.saturating_add(len as u64);
    }

    fn recovered(&mut self) {
        self.recoveries = self.recoveries.saturating_add(1);
    }
}

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    Opening,
    Writing,
    Recovering,
    /// Remount failed; terminal
    Halted,
    /// Stopped through the cancel token; terminal
    Cancelled,
}

/// A file being filled
pub struct OpenFile<F> {
    pub file: F,
    pub path: FilePath,
    /// Bytes written to this file so far
    pub size: usize,
}

/// State while the volume is borrowed
pub enum State<F> {
    Opening,
    Writing(OpenFile<F>),
    Recovering,
    Cancelled,
}

impl<F> State<F> {
    pub fn phase(&self) -> Phase {
        match self {
            State::Opening => Phase::Opening,
            State::Writing(_) => Phase::Writing,
            State::Recovering => Phase::Recovering,
            State::Cancelled => Phase::Cancelled,
        }
    }
}

/// How [`StressLoop::run`] ended
pub enum Outcome<V, E> {
    /// Cancelled; the volume is still mounted and handed back
    Cancelled { volume: V, counters: Counters },
    /// Recovery failed; no volume is mounted any more
    Halted { error: Error<E>, counters: Counters },
}

/// Whether a close draw ends the current file
pub fn should_close(draw: u32, threshold: u32) -> bool {
    draw > threshold
}

pub struct StressLoop<'a, R, D, M: RawMutex> {
    rng: R,
    delay: D,
    cancel: &'a CancelToken<M>,
    config: StressConfig,
    buffer: &'static WriteBuffer,
    counters: Counters,
    last_file: Option<FilePath>,
    reopen_attempts: u8,
    phase: Phase,
}

impl<'a, R, D, M> StressLoop<'a, R, D, M>
where
    R: EntropySource,
    D: DelayNs,
    M: RawMutex,
{
    pub fn new(rng: R, delay: D, cancel: &'a CancelToken<M>, config: StressConfig) -> Self {
        Self {
            rng,
            delay,
            cancel,
            config,
            buffer: &WRITE_BUFFER,
            counters: Counters::default(),
            last_file: None,
            reopen_attempts: 0,
            phase: Phase::Opening,
        }
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Path of the most recently created file, the deletion target on failure
    pub fn last_file(&self) -> Option<&str> {
        self.last_file.as_deref()
    }

    /// Runs until cancelled or until recovery fails.
    ///
    /// `volume` must have been mounted through `storage`.
    pub async fn run<S, P>(
        &mut self,
        storage: &mut Storage<S, P>,
        mut volume: S::Volume,
    ) -> Outcome<S::Volume, S::Error>
    where
        S: StorageService,
        P: PowerSequence,
    {
        let root = storage.root();
        info!("stress loop started in {}", root);

        loop {
            let exit = {
                let mut state = State::Opening;
                self.phase = Phase::Opening;
                loop {
                    state = self.step(root, &volume, state).await;
                    self.phase = state.phase();
                    match state {
                        State::Recovering | State::Cancelled => break self.phase,
                        State::Opening | State::Writing(_) => {}
                    }
                }
            };

            if exit == Phase::Cancelled || self.cancel.is_cancelled() {
                self.phase = Phase::Cancelled;
                info!("stress loop cancelled");
                return Outcome::Cancelled {
                    volume,
                    counters: self.counters,
                };
            }

            warn!(
                "recovering [written files={}, bytes={}]",
                self.counters.written_files,
                self.counters.written_bytes
            );
            match storage.remount_with_format(volume).await {
                Ok(fresh) => {
                    info!("Remounted after formatting");
                    volume = fresh;
                    self.last_file = None;
                    self.reopen_attempts = 0;
                    self.counters.recovered();
                }
                Err(err) => {
                    error!("Remounting after formatting failed");
                    self.phase = Phase::Halted;
                    let error = match err {
                        Error::Mount(mount) => Error::RecoveryExhausted(mount),
                        other => other,
                    };
                    return Outcome::Halted {
                        error,
                        counters: self.counters,
                    };
                }
            }
        }
    }

    /// Performs one transition
    pub async fn step<'v, V: Volume>(
        &mut self,
        root: &str,
        volume: &'v V,
        state: State<V::File<'v>>,
    ) -> State<V::File<'v>> {
        if self.cancel.is_cancelled() {
            if let State::Writing(open) = state {
                self.close_quietly(open).await;
            }
            return State::Cancelled;
        }

        match state {
            State::Opening => self.open(root, volume).await,
            State::Writing(open) => self.write_chunk(open).await,
            terminal => terminal,
        }
    }

    async fn open<'v, V: Volume>(&mut self, root: &str, volume: &'v V) -> State<V::File<'v>> {
        let Some(path) = file_path(root, self.rng.next_u32()) else {
            error!("no room for a file name under {}", root);
            return self.after_failed_create(volume).await;
        };

        match volume.create(&path).await {
            Ok(file) => {
                info!("File {} {} opened", self.counters.written_files, path.as_str());
                self.reopen_attempts = 0;
                self.last_file = Some(path.clone());
                State::Writing(OpenFile { file, path, size: 0 })
            }
            Err(err) => {
                error!(
                    "open {} [written files={}, bytes={}]: {}",
                    path.as_str(),
                    self.counters.written_files,
                    self.counters.written_bytes,
                    Debug2Format(&Error::<V::Error>::FileCreate(err))
                );
                self.after_failed_create(volume).await
            }
        }
    }

    /// Frees space by deleting the last file, or counts another failed attempt
    async fn after_failed_create<'v, V: Volume>(&mut self, volume: &'v V) -> State<V::File<'v>> {
        match self.last_file.take() {
            Some(last) => {
                info!("Trying to remove last one: {}", last.as_str());
                match volume.remove(&last).await {
                    Ok(()) => return State::Recovering,
                    Err(err) => {
                        warn!("remove {}: {}", last.as_str(), Debug2Format(&err));
                        self.last_file = Some(last);
                    }
                }
            }
            None => warn!("no previous file to remove"),
        }

        self.reopen_attempts = self.reopen_attempts.saturating_add(1);
        if self.reopen_attempts >= self.config.max_reopen_attempts {
            warn!("{} failed open attempts, reformatting", self.reopen_attempts);
            State::Recovering
        } else {
            State::Opening
        }
    }

    async fn write_chunk<F: VolumeFile>(&mut self, mut open: OpenFile<F>) -> State<F> {
        let len = self.buffer.chunk_len(self.rng.next_u32());

        if let Err(err) = open.file.write(self.buffer.chunk(len)).await {
            error!(
                "write {} [written files={}, bytes={}]: {}",
                open.path.as_str(),
                self.counters.written_files,
                self.counters.written_bytes,
                Debug2Format(&Error::<F::Error>::FileWrite(err))
            );
            self.close_quietly(open).await;
            return State::Opening;
        }

        open.size = open.size.saturating_add(len);
        self.counters.chunk_written(len);
        info!("Chunk with {} bytes has been written, size {}", len, open.size);

        if !should_close(self.rng.next_u32(), self.config.close_threshold) {
            if self.pause().await {
                self.close_quietly(open).await;
                return State::Cancelled;
            }
            return State::Writing(open);
        }

        match open.file.close().await {
            Ok(()) => {
                self.counters.file_closed();
                info!("File {} {} closed", self.counters.written_files, open.path.as_str());
            }
            Err(err) => {
                error!(
                    "close {}: {}",
                    open.path.as_str(),
                    Debug2Format(&Error::<F::Error>::FileClose(err))
                );
            }
        }

        if self.pause().await {
            return State::Cancelled;
        }
        State::Opening
    }

    /// Closes a file whose outcome no longer matters
    async fn close_quietly<F: VolumeFile>(&mut self, open: OpenFile<F>) {
        if let Err(err) = open.file.close().await {
            debug!("close {} ignored: {}", open.path.as_str(), Debug2Format(&err));
        }
    }

    /// Sleeps for the configured pause; `true` if cancelled meanwhile
    async fn pause(&mut self) -> bool {
        let sleep = self.delay.delay_ms(self.config.pause_ms);
        match select(sleep, self.cancel.cancelled()).await {
            Either::First(()) => false,
            Either::Second(()) => true,
        }
    }
}
