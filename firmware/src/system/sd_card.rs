//! SD card storage service
//!
//! Implements the `sd_stress` storage seam on top of `sdspi` (SD protocol over
//! SPI) and `embedded-fatfs` (FAT). Every mount builds a fresh SD device on the
//! shared SPI bus, runs card identification at 400 kHz, switches to the data
//! clock, optionally formats, and opens the filesystem. Unmounting flushes the
//! filesystem and drops the device; the bus and chip-select line stay here for
//! the next mount.
//!
//! # Bus sharing
//! The chip-select line is used both for power sequencing (parked high before
//! the card is powered) and by the SPI device, so it lives in a static
//! blocking mutex and is handed out as a copyable [`SharedPin`].

use core::cell::{Cell, RefCell};
use core::convert::Infallible;

use block_device_adapters::{BufStream, BufStreamError};
use defmt::{info, warn, Format};
use embassy_embedded_hal::shared_bus::asynch::spi::SpiDeviceWithConfig;
use embassy_embedded_hal::SetConfig;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::SPI0;
use embassy_rp::spi::{self, Async, Spi};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Delay;
use embedded_fatfs::{
    format_volume, DefaultTimeProvider, FileSystem, FormatVolumeOptions, FsOptions, LossyOemCpConverter,
};
use embedded_hal::digital::{ErrorType, OutputPin};
use embedded_io_async::Write;
use sd_stress::{CardInfo, CardPower, MountConfig, MountError, StorageService, Volume, VolumeFile};
use sdspi::{sd_init, SdSpi};
use static_cell::StaticCell;

use crate::system::resources::SdCardResources;

/// Clock used while the card identifies itself
const IDENTIFICATION_FREQUENCY: u32 = 400_000;

/// Data clock after identification (SD default speed)
const DATA_FREQUENCY: u32 = 20_000_000;

/// Sector size of the block stream under the filesystem
const SECTOR_SIZE: usize = 512;

type SpiBus = Mutex<CriticalSectionRawMutex, Spi<'static, SPI0, Async>>;
type SdDevice = SdSpi<SpiDeviceWithConfig<'static, CriticalSectionRawMutex, Spi<'static, SPI0, Async>, SharedPin>, Delay, aligned::A1>;
type SdStream = BufStream<SdDevice, SECTOR_SIZE>;
type SdFileSystem = FileSystem<SdStream>;
type FatError = embedded_fatfs::Error<BufStreamError<sdspi::Error>>;

static SPI_BUS: StaticCell<SpiBus> = StaticCell::new();
static CHIP_SELECT: StaticCell<BlockingMutex<CriticalSectionRawMutex, RefCell<Output<'static>>>> = StaticCell::new();

/// Storage orchestration as used by this firmware
pub type SdStorage = sd_stress::Storage<SdCardService, CardPower<SharedPin, Output<'static>>>;

/// Failures of the SD card or its filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum SdError {
    /// The card did not respond or the bus failed
    Card,
    /// Formatting the card failed
    Format,
    /// The volume holds no valid FAT filesystem
    NoFilesystem,
    NotFound,
    AlreadyExists,
    NoSpace,
    /// The path is not under the mount root or not a valid FAT name
    InvalidPath,
    TooManyOpenFiles,
    Io,
}

impl From<FatError> for SdError {
    fn from(err: FatError) -> Self {
        match err {
            embedded_fatfs::Error::NotFound => SdError::NotFound,
            embedded_fatfs::Error::AlreadyExists => SdError::AlreadyExists,
            embedded_fatfs::Error::NotEnoughSpace => SdError::NoSpace,
            embedded_fatfs::Error::CorruptedFileSystem => SdError::NoFilesystem,
            embedded_fatfs::Error::InvalidInput
            | embedded_fatfs::Error::InvalidFileNameLength
            | embedded_fatfs::Error::UnsupportedFileNameCharacter => SdError::InvalidPath,
            _ => SdError::Io,
        }
    }
}

/// Chip-select line shared between power sequencing and the SPI device
#[derive(Clone, Copy)]
pub struct SharedPin(&'static BlockingMutex<CriticalSectionRawMutex, RefCell<Output<'static>>>);

impl ErrorType for SharedPin {
    type Error = Infallible;
}

impl OutputPin for SharedPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.lock(|pin| pin.borrow_mut().set_low());
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.lock(|pin| pin.borrow_mut().set_high());
        Ok(())
    }
}

fn identification_config() -> spi::Config {
    let mut config = spi::Config::default();
    config.frequency = IDENTIFICATION_FREQUENCY;
    config
}

/// Sets up the SPI bus and the card's control lines.
///
/// Must be called once, before any task is spawned.
pub fn init(r: SdCardResources) -> (SdCardService, CardPower<SharedPin, Output<'static>>) {
    let spi = Spi::new(
        r.spi,
        r.clk_pin,
        r.mosi_pin,
        r.miso_pin,
        r.tx_dma,
        r.rx_dma,
        identification_config(),
    );
    let bus = SPI_BUS.init(Mutex::new(spi));

    // CS starts high so the card stays deselected while the bus comes up
    let cs = SharedPin(CHIP_SELECT.init(BlockingMutex::new(RefCell::new(Output::new(r.cs_pin, Level::High)))));
    let power = Output::new(r.power_pin, Level::Low);

    (SdCardService { bus, cs }, CardPower::new(cs, power))
}

pub struct SdCardService {
    bus: &'static SpiBus,
    cs: SharedPin,
}

impl SdCardService {
    async fn open_card(&mut self) -> Result<SdStream, SdError> {
        let identification = identification_config();
        {
            // The previous volume left the bus at the data clock
            let mut bus = self.bus.lock().await;
            bus.set_config(&identification).map_err(|_| SdError::Card)?;
            // 74+ clocks with CS high before the first command
            let mut cs = self.cs;
            sd_init(&mut *bus, &mut cs).await.map_err(|_| SdError::Card)?;
        }

        let device = SpiDeviceWithConfig::new(self.bus, self.cs, identification);
        let mut sd = SdSpi::<_, _, aligned::A1>::new(device, Delay);
        sd.init().await.map_err(|_| SdError::Card)?;

        let mut config = spi::Config::default();
        config.frequency = DATA_FREQUENCY;
        sd.spi().set_config(config);

        Ok(BufStream::new(sd))
    }
}

impl StorageService for SdCardService {
    type Error = SdError;
    type Volume = SdVolume;

    async fn mount(&mut self, root: &str, config: &MountConfig) -> Result<SdVolume, MountError<SdError>> {
        let mut format = config.format_before_mount;
        loop {
            let mut stream = self.open_card().await.map_err(MountError::Card)?;

            if format {
                info!("formatting card, {} byte clusters", config.allocation_unit_size);
                let options = FormatVolumeOptions::new().bytes_per_cluster(config.allocation_unit_size);
                format_volume(&mut stream, options)
                    .await
                    .map_err(|_| MountError::Card(SdError::Format))?;
            }

            match FileSystem::new(stream, FsOptions::new()).await {
                Ok(fs) => {
                    return Ok(SdVolume {
                        fs,
                        root: heapless::String::try_from(root).map_err(|_| MountError::Card(SdError::InvalidPath))?,
                        open_files: Cell::new(0),
                        max_files: config.max_files,
                    })
                }
                Err(_) if config.format_if_mount_failed && !format => {
                    warn!("no filesystem, formatting");
                    format = true;
                }
                Err(err) => return Err(MountError::NotMountable(SdError::from(err))),
            }
        }
    }

    async fn unmount(&mut self, _root: &str, volume: SdVolume) -> Result<(), SdError> {
        volume.fs.unmount().await.map_err(SdError::from)
    }
}

/// A mounted FAT volume on the card
pub struct SdVolume {
    fs: SdFileSystem,
    root: heapless::String<{ sd_stress::path::MAX_PATH_LEN }>,
    open_files: Cell<usize>,
    max_files: usize,
}

impl SdVolume {
    /// Strips the mount root, leaving the name inside the root directory
    fn relative<'p>(&self, path: &'p str) -> Result<&'p str, SdError> {
        path.strip_prefix(self.root.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| !name.is_empty())
            .ok_or(SdError::InvalidPath)
    }
}

impl Volume for SdVolume {
    type Error = SdError;
    type File<'a> = SdFile<'a>;

    async fn create(&self, path: &str) -> Result<SdFile<'_>, SdError> {
        if self.open_files.get() >= self.max_files {
            return Err(SdError::TooManyOpenFiles);
        }
        let name = self.relative(path)?;
        let mut file = self.fs.root_dir().create_file(name).await?;
        file.truncate().await?;
        self.open_files.set(self.open_files.get() + 1);
        Ok(SdFile { file, open_files: &self.open_files })
    }

    async fn remove(&self, path: &str) -> Result<(), SdError> {
        let name = self.relative(path)?;
        self.fs.root_dir().remove(name).await?;
        Ok(())
    }

    async fn card_info(&self) -> Result<CardInfo, SdError> {
        let stats = self.fs.stats().await?;
        let cluster_size = stats.cluster_size();
        Ok(CardInfo {
            cluster_size,
            total_bytes: u64::from(stats.total_clusters()) * u64::from(cluster_size),
            free_bytes: u64::from(stats.free_clusters()) * u64::from(cluster_size),
        })
    }
}

/// An open file on an [`SdVolume`]
pub struct SdFile<'a> {
    file: embedded_fatfs::File<'a, SdStream, DefaultTimeProvider, LossyOemCpConverter>,
    open_files: &'a Cell<usize>,
}

impl VolumeFile for SdFile<'_> {
    type Error = SdError;

    async fn write(&mut self, data: &[u8]) -> Result<(), SdError> {
        self.file.write_all(data).await?;
        Ok(())
    }

    async fn close(mut self) -> Result<(), SdError> {
        self.open_files.set(self.open_files.get().saturating_sub(1));
        self.file.flush().await?;
        Ok(())
    }
}
