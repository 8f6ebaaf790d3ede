use std::io::Write;
use std::path::Path;
use crc32fast::Hasher;
use tempfile::NamedTempFile;
use tracing::debug;
use crate::core::error::{Error, Result};
use crate::core::types::Generation;
use crate::mmap::mmap_file::MmapFile;
use crate::mmap::table::{align, TableEncoder};

pub const MAGIC: &[u8; 4] = b"DTGX";
pub const VERSION: u32 = 1;

const HEADER_SIZE: usize = 28;      // magic, version, generation, table count
const DIR_ENTRY_SIZE: usize = 12;   // offset, length, crc32

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

fn read_u32(buf: &[u8], pos: usize) -> Option<u32> {
    let bytes = buf.get(pos..pos.checked_add(4)?)?;
    Some(u32::from_ne_bytes(bytes.try_into().ok()?))
}

/// Collects encoded sub-tables and publishes them as one file
#[derive(Default)]
pub struct MasterIndexWriter {
    tables: Vec<Vec<u8>>,
}

impl MasterIndexWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a sub-table, returning its table number
    pub fn append(&mut self, encoder: &dyn TableEncoder) -> usize {
        let mut buf = vec![0u8; align(encoder.encoded_size())];
        encoder.encode(&mut buf);
        self.tables.push(buf);
        self.tables.len() - 1
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    fn encode(&self, generation: Generation) -> Vec<u8> {
        let dir_end = HEADER_SIZE + self.tables.len() * DIR_ENTRY_SIZE;
        let total = dir_end + self.tables.iter().map(Vec::len).sum::<usize>();

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_ne_bytes());
        out.extend_from_slice(generation.as_bytes());
        out.extend_from_slice(&(self.tables.len() as u32).to_ne_bytes());

        let mut offset = dir_end;
        for table in &self.tables {
            out.extend_from_slice(&(offset as u32).to_ne_bytes());
            out.extend_from_slice(&(table.len() as u32).to_ne_bytes());
            out.extend_from_slice(&checksum(table).to_ne_bytes());
            offset += table.len();
        }

        for table in &self.tables {
            out.extend_from_slice(table);
        }
        out
    }

    /// Atomically replace `path` with the collected tables under a new generation
    pub fn commit<P: AsRef<Path>>(&self, path: P) -> Result<Generation> {
        let path = path.as_ref();
        let generation = Generation::new();
        let data = self.encode(generation);

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        tmp.write_all(&data).map_err(|e| Error::io(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(path)?;

        debug!(path = %path.display(), tables = self.tables.len(), bytes = data.len(), %generation, "committed master index");
        Ok(generation)
    }
}

#[derive(Debug, Clone, Copy)]
struct TableEntry {
    offset: usize,
    len: usize,
}

/// A mapped, validated master index file
pub struct MasterIndex {
    file: MmapFile,
    generation: Generation,
    directory: Vec<TableEntry>,
}

impl MasterIndex {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = MmapFile::open_read_only(&path)?;
        let data = file.data();
        let path = path.as_ref();

        if data.len() < HEADER_SIZE || &data[..4] != MAGIC {
            return Err(Error::format(path, "not a debtags index (bad magic)"));
        }
        let version = read_u32(data, 4).unwrap_or(0);
        if version != VERSION {
            return Err(Error::format(path, format!("unsupported index version {}", version)));
        }

        let mut generation = [0u8; 16];
        generation.copy_from_slice(&data[8..24]);
        let generation = Generation::from_bytes(generation);

        let count = read_u32(data, 24).unwrap_or(0) as usize;
        let dir_end = count
            .checked_mul(DIR_ENTRY_SIZE)
            .and_then(|size| size.checked_add(HEADER_SIZE))
            .filter(|&end| end <= data.len())
            .ok_or_else(|| Error::format(path, "table directory is truncated"))?;

        let mut directory = Vec::with_capacity(count);
        for n in 0..count {
            let pos = HEADER_SIZE + n * DIR_ENTRY_SIZE;
            let (Some(offset), Some(len), Some(crc)) = (
                read_u32(data, pos),
                read_u32(data, pos + 4),
                read_u32(data, pos + 8),
            ) else {
                return Err(Error::format(path, "table directory is truncated"));
            };

            let (offset, len) = (offset as usize, len as usize);
            let table = offset
                .checked_add(len)
                .filter(|_| offset >= dir_end)
                .and_then(|end| data.get(offset..end))
                .ok_or_else(|| Error::format(path, format!("table {} points outside the file", n)))?;
            if checksum(table) != crc {
                return Err(Error::format(path, format!("table {} checksum mismatch", n)));
            }
            directory.push(TableEntry { offset, len });
        }

        debug!(path = %path.display(), tables = count, %generation, "opened master index");
        Ok(MasterIndex { file, generation, directory })
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn table_count(&self) -> usize {
        self.directory.len()
    }

    pub fn table(&self, n: usize) -> Option<&[u8]> {
        let entry = self.directory.get(n)?;
        self.file.slice(entry.offset, entry.len)
    }

    /// Table `n`, or a format error naming the file when it is missing
    pub fn require_table(&self, n: usize) -> Result<&[u8]> {
        self.table(n)
            .ok_or_else(|| Error::format(self.path(), format!("missing table {}", n)))
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    pub fn len(&self) -> usize {
        self.file.len
    }

    pub fn is_empty(&self) -> bool {
        self.file.len == 0
    }
}
