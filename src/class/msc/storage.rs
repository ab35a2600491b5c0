//! Mass-storage media backends
//!
//! The transport streams sector fragments, never whole sectors, so a
//! backend works the same whether the target can afford a full sector
//! buffer or only an endpoint packet. All calls are synchronous.

/// Errors a backend may report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Access beyond the last block
    OutOfRange,
    /// The medium failed the access
    Device,
}

/// Block media behind the mass-storage function
pub trait Storage {
    /// Read `buf.len()` bytes from `lba` starting at byte `offset`
    ///
    /// The transport never crosses a block boundary in one call.
    fn read_chunk(&mut self, lba: u32, offset: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` into `lba` starting at byte `offset`
    fn write_chunk(&mut self, lba: u32, offset: usize, data: &[u8]) -> Result<(), StorageError>;

    fn capacity_blocks(&self) -> u32;

    fn block_size(&self) -> usize;

    fn write_protected(&self) -> bool {
        false
    }

    fn media_present(&self) -> bool {
        true
    }
}

const SECTOR: usize = 512;

/// Sectors in the synthesized volume
const FAT_TOTAL_SECTORS: usize = 64;

static FILE_CONTENT: &[u8] =
    b"Hello, world!\r\n\r\nThis file lives on a FAT12 volume synthesized at build\r\ntime; nothing here is writable.\r\n";

const fn copy(mut sector: [u8; SECTOR], bytes: &[u8], at: usize) -> [u8; SECTOR] {
    let mut i = 0;
    while i < bytes.len() {
        sector[at + i] = bytes[i];
        i += 1;
    }
    sector
}

const fn boot_sector() -> [u8; SECTOR] {
    let mut s = [0u8; SECTOR];
    s = copy(s, &[0xEB, 0x3C, 0x90], 0); // jump stub
    s = copy(s, b"MSDOS5.0", 3);
    s = copy(s, &[0x00, 0x02], 11); // 512 bytes per sector
    s[13] = 0x01; // sectors per cluster
    s = copy(s, &[0x01, 0x00], 14); // one reserved sector
    s[16] = 0x01; // one FAT
    s = copy(s, &[0x10, 0x00], 17); // 16 root entries
    s = copy(s, &[FAT_TOTAL_SECTORS as u8, 0x00], 19);
    s[21] = 0xF8; // media descriptor
    s = copy(s, &[0x01, 0x00], 22); // sectors per FAT
    s = copy(s, &[0x10, 0x00], 24); // sectors per track
    s = copy(s, &[0x02, 0x00], 26); // heads
    s[38] = 0x29; // extended boot signature
    s = copy(s, &[0x78, 0x56, 0x34, 0x12], 39); // volume serial
    s = copy(s, b"KINETIS USB", 43);
    s = copy(s, b"FAT12   ", 54);
    s = copy(s, &[0x55, 0xAA], 510);
    s
}

const fn fat_sector() -> [u8; SECTOR] {
    // Entries 0 and 1 are reserved; entry 2, the file, ends the chain
    copy([0u8; SECTOR], &[0xF8, 0xFF, 0xFF, 0xFF, 0x0F], 0)
}

const fn root_directory() -> [u8; SECTOR] {
    let mut s = [0u8; SECTOR];
    // Volume label entry
    s = copy(s, b"KINETIS USB", 0);
    s[11] = 0x08;
    // HELLO.TXT, read-only, first cluster 2
    s = copy(s, b"HELLO   TXT", 32);
    s[32 + 11] = 0x21; // read-only | archive
    s = copy(s, &[0x02, 0x00], 32 + 26);
    s = copy(s, &(FILE_CONTENT.len() as u32).to_le_bytes(), 32 + 28);
    s
}

static BOOT_SECTOR: [u8; SECTOR] = boot_sector();
static FAT_SECTOR: [u8; SECTOR] = fat_sector();
static ROOT_DIRECTORY: [u8; SECTOR] = root_directory();

/// A read-only FAT12 volume synthesized from constants
///
/// Presents one file, `HELLO.TXT`. Layout: boot sector, one FAT
/// sector, one root directory sector, then data, with cluster 2
/// mapping to the first data sector.
pub struct RamFatDisk;

impl RamFatDisk {
    pub fn new() -> Self {
        RamFatDisk
    }

    fn sector_bytes(lba: u32, offset: usize, buf: &mut [u8]) {
        match lba {
            0 => buf.copy_from_slice(&BOOT_SECTOR[offset..offset + buf.len()]),
            1 => buf.copy_from_slice(&FAT_SECTOR[offset..offset + buf.len()]),
            2 => buf.copy_from_slice(&ROOT_DIRECTORY[offset..offset + buf.len()]),
            3 => {
                for (i, byte) in buf.iter_mut().enumerate() {
                    *byte = FILE_CONTENT.get(offset + i).copied().unwrap_or(0);
                }
            }
            _ => buf.fill(0),
        }
    }
}

impl Default for RamFatDisk {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for RamFatDisk {
    fn read_chunk(&mut self, lba: u32, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        if lba >= self.capacity_blocks() || offset + buf.len() > SECTOR {
            return Err(StorageError::OutOfRange);
        }
        Self::sector_bytes(lba, offset, buf);
        Ok(())
    }

    fn write_chunk(
        &mut self,
        _lba: u32,
        _offset: usize,
        _data: &[u8],
    ) -> Result<(), StorageError> {
        Err(StorageError::Device)
    }

    fn capacity_blocks(&self) -> u32 {
        FAT_TOTAL_SECTORS as u32
    }

    fn block_size(&self) -> usize {
        SECTOR
    }

    fn write_protected(&self) -> bool {
        true
    }
}

/// Volatile block storage, mainly for tests and scratch volumes
pub struct RamDisk<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> RamDisk<N> {
    pub fn new() -> Self {
        RamDisk { data: [0; N] }
    }
}

impl<const N: usize> Default for RamDisk<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Storage for RamDisk<N> {
    fn read_chunk(&mut self, lba: u32, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let start = lba as usize * SECTOR + offset;
        if offset + buf.len() > SECTOR || start + buf.len() > N {
            return Err(StorageError::OutOfRange);
        }
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    fn write_chunk(&mut self, lba: u32, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        let start = lba as usize * SECTOR + offset;
        if offset + data.len() > SECTOR || start + data.len() > N {
            return Err(StorageError::OutOfRange);
        }
        self.data[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn capacity_blocks(&self) -> u32 {
        (N / SECTOR) as u32
    }

    fn block_size(&self) -> usize {
        SECTOR
    }
}
