//! In-memory stand-ins for the platform: a card with injectable failures, a
//! scripted entropy source, a delay that counts pauses and recording pins.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::convert::Infallible;
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use nanorand::WyRand;
use sd_stress::{
    CancelToken, CardInfo, EntropySource, MountConfig, MountError, StorageService, Volume,
    VolumeFile,
};

pub type Token = CancelToken<NoopRawMutex>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    NoCard,
    Corrupt,
    Full,
    Io,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Mount { format: bool },
    Unmount,
    Create(String),
    CreateFailed(String),
    Write(String, usize),
    WriteFailed(String),
    Close(String),
    Remove(String),
    RemoveFailed(String),
}

#[derive(Default)]
pub struct CardState {
    pub ops: Vec<Op>,
    pub files: BTreeMap<String, usize>,
    pub mounted: bool,
    /// Result of each mount call in order; `None` or an empty queue succeeds
    pub mount_results: VecDeque<Option<MountError<MockError>>>,
    pub unmount_fails: bool,
    /// 1-based create calls that fail
    pub failing_creates: Vec<usize>,
    pub all_creates_fail: bool,
    /// 1-based write calls that fail
    pub failing_writes: Vec<usize>,
    pub removes_fail: bool,
    pub closes_fail: bool,
    creates: usize,
    writes: usize,
}

impl CardState {
    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(op)).count()
    }
}

pub type Shared = Rc<RefCell<CardState>>;

pub struct MockCard {
    pub state: Shared,
}

impl MockCard {
    pub fn new() -> (Self, Shared) {
        let state = Shared::default();
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

pub struct MockVolume {
    state: Shared,
}

pub struct MockFile<'a> {
    volume: &'a MockVolume,
    path: String,
}

impl StorageService for MockCard {
    type Error = MockError;
    type Volume = MockVolume;

    async fn mount(
        &mut self,
        _root: &str,
        config: &MountConfig,
    ) -> Result<MockVolume, MountError<MockError>> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::Mount {
            format: config.format_before_mount,
        });
        if let Some(Some(err)) = state.mount_results.pop_front() {
            return Err(err);
        }
        if state.mounted {
            return Err(MountError::AlreadyMounted);
        }
        if config.format_before_mount {
            state.files.clear();
        }
        state.mounted = true;
        Ok(MockVolume {
            state: self.state.clone(),
        })
    }

    async fn unmount(&mut self, _root: &str, _volume: MockVolume) -> Result<(), MockError> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::Unmount);
        state.mounted = false;
        if state.unmount_fails {
            return Err(MockError::Io);
        }
        Ok(())
    }
}

impl Volume for MockVolume {
    type Error = MockError;
    type File<'a> = MockFile<'a>;

    async fn create(&self, path: &str) -> Result<MockFile<'_>, MockError> {
        let mut state = self.state.borrow_mut();
        state.creates += 1;
        let call = state.creates;
        if state.all_creates_fail || state.failing_creates.contains(&call) {
            state.ops.push(Op::CreateFailed(path.to_owned()));
            return Err(MockError::Full);
        }
        state.ops.push(Op::Create(path.to_owned()));
        state.files.insert(path.to_owned(), 0);
        Ok(MockFile {
            volume: self,
            path: path.to_owned(),
        })
    }

    async fn remove(&self, path: &str) -> Result<(), MockError> {
        let mut state = self.state.borrow_mut();
        if state.removes_fail || state.files.remove(path).is_none() {
            state.ops.push(Op::RemoveFailed(path.to_owned()));
            return Err(MockError::Io);
        }
        state.ops.push(Op::Remove(path.to_owned()));
        Ok(())
    }

    async fn card_info(&self) -> Result<CardInfo, MockError> {
        Ok(CardInfo {
            cluster_size: 16 * 1024,
            total_bytes: 1 << 30,
            free_bytes: 1 << 29,
        })
    }
}

impl VolumeFile for MockFile<'_> {
    type Error = MockError;

    async fn write(&mut self, data: &[u8]) -> Result<(), MockError> {
        let mut state = self.volume.state.borrow_mut();
        state.writes += 1;
        let call = state.writes;
        if state.failing_writes.contains(&call) {
            state.ops.push(Op::WriteFailed(self.path.clone()));
            return Err(MockError::Io);
        }
        state.ops.push(Op::Write(self.path.clone(), data.len()));
        *state.files.entry(self.path.clone()).or_default() += data.len();
        Ok(())
    }

    async fn close(self) -> Result<(), MockError> {
        let mut state = self.volume.state.borrow_mut();
        state.ops.push(Op::Close(self.path.clone()));
        if state.closes_fail {
            return Err(MockError::Io);
        }
        Ok(())
    }
}

/// Hands out scripted draws first, then falls back to a seeded generator
pub struct Script {
    draws: VecDeque<u32>,
    fallback: WyRand,
}

impl Script {
    pub fn new(draws: &[u32]) -> Self {
        Self {
            draws: draws.iter().copied().collect(),
            fallback: WyRand::new_seed(7),
        }
    }

    pub fn random(seed: u64) -> Self {
        Self {
            draws: VecDeque::new(),
            fallback: WyRand::new_seed(seed),
        }
    }
}

impl EntropySource for Script {
    fn next_u32(&mut self) -> u32 {
        match self.draws.pop_front() {
            Some(draw) => draw,
            None => self.fallback.next_u32(),
        }
    }
}

/// Returns immediately and cancels `token` once `cancel_after` pauses happened
pub struct PauseCounter<'a> {
    pub pauses: Rc<Cell<usize>>,
    pub last_ms: Rc<Cell<u32>>,
    cancel_after: usize,
    token: &'a Token,
}

impl<'a> PauseCounter<'a> {
    pub fn new(token: &'a Token, cancel_after: usize) -> Self {
        Self {
            pauses: Rc::default(),
            last_ms: Rc::default(),
            cancel_after,
            token,
        }
    }
}

impl embedded_hal_async::delay::DelayNs for PauseCounter<'_> {
    async fn delay_ns(&mut self, _ns: u32) {}

    async fn delay_ms(&mut self, ms: u32) {
        self.last_ms.set(ms);
        self.pauses.set(self.pauses.get() + 1);
        if self.pauses.get() >= self.cancel_after {
            self.token.cancel();
        }
    }
}

/// Output pin that logs every level change
pub struct RecordingPin {
    pub name: &'static str,
    pub log: Rc<RefCell<Vec<(&'static str, bool)>>>,
}

impl embedded_hal::digital::ErrorType for RecordingPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.log.borrow_mut().push((self.name, false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.log.borrow_mut().push((self.name, true));
        Ok(())
    }
}

pub type MockStorage = sd_stress::Storage<MockCard, sd_stress::CardPower<RecordingPin, RecordingPin>>;

/// A storage over a fresh mock card, with its shared state and pin log
pub fn storage(config: sd_stress::StorageConfig) -> (MockStorage, Shared, Rc<RefCell<Vec<(&'static str, bool)>>>) {
    let (card, state) = MockCard::new();
    let pins = Rc::new(RefCell::new(Vec::new()));
    let power = sd_stress::CardPower::new(
        RecordingPin {
            name: "cs",
            log: pins.clone(),
        },
        RecordingPin {
            name: "pwr",
            log: pins.clone(),
        },
    );
    let storage = sd_stress::Storage::new(card, power, config).unwrap();
    (storage, state, pins)
}
