//! Synthetic compound file writer (version 3, 512-byte sectors).

pub const SECTOR: usize = 512;
pub const MINI_SECTOR: usize = 64;
pub const MINI_CUTOFF: u32 = 4096;
pub const DIR_ENTRY: usize = 128;

pub const FREESECT: u32 = 0xFFFF_FFFF;
pub const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
pub const FATSECT: u32 = 0xFFFF_FFFD;
pub const NOSTREAM: u32 = 0xFFFF_FFFF;

const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ENTRIES_PER_SECTOR: usize = SECTOR / 4;

/// Where the builder put each stream.
#[derive(Debug, Clone)]
pub struct StreamLayout {
    pub name: String,
    /// Directory entry index
    pub entry: u32,
    /// Sector chain (or mini-sector chain for mini streams)
    pub chain: Vec<u32>,
    pub mini: bool,
}

/// A built file plus the layout needed to corrupt it deliberately.
#[derive(Debug, Clone)]
pub struct CbffImage {
    pub data: Vec<u8>,
    pub fat_sectors: Vec<u32>,
    pub dir_sectors: Vec<u32>,
    pub minifat_sectors: Vec<u32>,
    pub mini_stream_sectors: Vec<u32>,
    pub streams: Vec<StreamLayout>,
}

impl CbffImage {
    pub fn sector_offset(sector: u32) -> usize {
        (sector as usize + 1) * SECTOR
    }

    pub fn layout(&self, name: &str) -> &StreamLayout {
        self.streams.iter().find(|s| s.name == name).unwrap()
    }

    /// Overwrite FAT entry `index`.
    pub fn set_fat(&mut self, index: u32, value: u32) {
        let per = ENTRIES_PER_SECTOR as u32;
        let sector = self.fat_sectors[(index / per) as usize];
        let at = Self::sector_offset(sector) + (index % per) as usize * 4;
        self.data[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// File offset of directory entry `index`.
    pub fn dir_entry_offset(&self, index: u32) -> usize {
        let per = (SECTOR / DIR_ENTRY) as u32;
        Self::sector_offset(self.dir_sectors[(index / per) as usize])
            + (index % per) as usize * DIR_ENTRY
    }

    /// Overwrite the left, right or child field of a directory entry.
    pub fn set_dir_link(&mut self, index: u32, field: DirLink, value: u32) {
        let at = self.dir_entry_offset(index) + field as usize;
        self.data[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn set_header_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn set_header_u16(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }
}

#[derive(Debug, Clone, Copy)]
pub enum DirLink {
    Left = 0x44,
    Right = 0x48,
    Child = 0x4C,
}

/// Builds a compound file whose streams all hang off the root storage.
#[derive(Debug, Clone, Default)]
pub struct CbffBuilder {
    streams: Vec<(String, Vec<u8>)>,
    scatter: bool,
}

impl CbffBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream(mut self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.streams.push((name.to_string(), data.into()));
        self
    }

    /// Leave a free sector between consecutive sectors of regular streams.
    pub fn scatter(mut self) -> Self {
        self.scatter = true;
        self
    }

    pub fn build(self) -> CbffImage {
        let dir_entries = self.streams.len() + 1;
        let dir_count = dir_entries.div_ceil(SECTOR / DIR_ENTRY);

        let mut mini_chains = Vec::new();
        let mut mini_total = 0usize;
        let mut big_sectors = 0usize;
        for (_, data) in &self.streams {
            if data.is_empty() {
                mini_chains.push(None);
            } else if (data.len() as u32) < MINI_CUTOFF {
                let n = data.len().div_ceil(MINI_SECTOR);
                mini_chains.push(Some((mini_total as u32..(mini_total + n) as u32).collect::<Vec<_>>()));
                mini_total += n;
            } else {
                mini_chains.push(None);
                let n = data.len().div_ceil(SECTOR);
                big_sectors += if self.scatter { 2 * n - 1 } else { n };
            }
        }
        let minifat_count = mini_total.div_ceil(ENTRIES_PER_SECTOR);
        let mini_stream_count = (mini_total * MINI_SECTOR).div_ceil(SECTOR);

        let body = dir_count + big_sectors + minifat_count + mini_stream_count;
        let mut fat_count = 1;
        while fat_count * ENTRIES_PER_SECTOR < body + fat_count {
            fat_count += 1;
        }
        assert!(fat_count <= 109, "builder only writes in-header FAT slots");
        let total = fat_count + body;

        let mut fat = vec![FREESECT; fat_count * ENTRIES_PER_SECTOR];
        let mut sectors = vec![vec![0u8; SECTOR]; total];
        let mut next = fat_count as u32;
        let mut alloc = |n: usize, gap: bool, fat: &mut Vec<u32>| -> Vec<u32> {
            let mut chain = Vec::with_capacity(n);
            for i in 0..n {
                if gap && i > 0 {
                    next += 1;
                }
                chain.push(next);
                next += 1;
            }
            for w in chain.windows(2) {
                fat[w[0] as usize] = w[1];
            }
            if let Some(&last) = chain.last() {
                fat[last as usize] = ENDOFCHAIN;
            }
            chain
        };

        let fat_sectors: Vec<u32> = (0..fat_count as u32).collect();
        for &s in &fat_sectors {
            fat[s as usize] = FATSECT;
        }
        let dir_sectors = alloc(dir_count, false, &mut fat);

        let mut layouts = Vec::new();
        let mut mini_stream = Vec::new();
        let mut minifat = vec![FREESECT; minifat_count * ENTRIES_PER_SECTOR];
        for (i, ((name, data), mini_chain)) in self.streams.iter().zip(&mini_chains).enumerate() {
            let entry = i as u32 + 1;
            match mini_chain {
                Some(chain) => {
                    for w in chain.windows(2) {
                        minifat[w[0] as usize] = w[1];
                    }
                    if let Some(&last) = chain.last() {
                        minifat[last as usize] = ENDOFCHAIN;
                    }
                    let start = chain[0] as usize * MINI_SECTOR;
                    if mini_stream.len() < start + chain.len() * MINI_SECTOR {
                        mini_stream.resize(start + chain.len() * MINI_SECTOR, 0);
                    }
                    mini_stream[start..start + data.len()].copy_from_slice(data);
                    layouts.push(StreamLayout {
                        name: name.clone(),
                        entry,
                        chain: chain.clone(),
                        mini: true,
                    });
                }
                None if data.is_empty() => layouts.push(StreamLayout {
                    name: name.clone(),
                    entry,
                    chain: Vec::new(),
                    mini: false,
                }),
                None => {
                    let chain = alloc(data.len().div_ceil(SECTOR), self.scatter, &mut fat);
                    for (k, &s) in chain.iter().enumerate() {
                        let part = &data[k * SECTOR..((k + 1) * SECTOR).min(data.len())];
                        sectors[s as usize][..part.len()].copy_from_slice(part);
                    }
                    layouts.push(StreamLayout {
                        name: name.clone(),
                        entry,
                        chain,
                        mini: false,
                    });
                }
            }
        }

        let minifat_sectors = alloc(minifat_count, false, &mut fat);
        for (k, &s) in minifat_sectors.iter().enumerate() {
            for (j, v) in minifat[k * ENTRIES_PER_SECTOR..(k + 1) * ENTRIES_PER_SECTOR]
                .iter()
                .enumerate()
            {
                sectors[s as usize][j * 4..j * 4 + 4].copy_from_slice(&v.to_le_bytes());
            }
        }
        let mini_stream_sectors = alloc(mini_stream_count, false, &mut fat);
        for (k, &s) in mini_stream_sectors.iter().enumerate() {
            let part = &mini_stream[k * SECTOR..((k + 1) * SECTOR).min(mini_stream.len())];
            sectors[s as usize][..part.len()].copy_from_slice(part);
        }

        // directory: root, then every stream chained through right siblings
        let mut dir = Vec::new();
        let root_child = if self.streams.is_empty() { NOSTREAM } else { 1 };
        dir.extend(dir_entry(
            "Root Entry",
            5,
            NOSTREAM,
            NOSTREAM,
            root_child,
            mini_stream_sectors.first().copied().unwrap_or(ENDOFCHAIN),
            (mini_total * MINI_SECTOR) as u32,
        ));
        for (i, ((name, data), layout)) in self.streams.iter().zip(&layouts).enumerate() {
            let right = if i + 1 < self.streams.len() {
                i as u32 + 2
            } else {
                NOSTREAM
            };
            let start = layout.chain.first().copied().unwrap_or(ENDOFCHAIN);
            dir.extend(dir_entry(name, 2, NOSTREAM, right, NOSTREAM, start, data.len() as u32));
        }
        while dir.len() < dir_count * SECTOR {
            dir.extend(dir_entry("", 0, NOSTREAM, NOSTREAM, NOSTREAM, 0, 0));
        }
        for (k, &s) in dir_sectors.iter().enumerate() {
            sectors[s as usize].copy_from_slice(&dir[k * SECTOR..(k + 1) * SECTOR]);
        }

        for (k, &s) in fat_sectors.iter().enumerate() {
            for (j, v) in fat[k * ENTRIES_PER_SECTOR..(k + 1) * ENTRIES_PER_SECTOR]
                .iter()
                .enumerate()
            {
                sectors[s as usize][j * 4..j * 4 + 4].copy_from_slice(&v.to_le_bytes());
            }
        }

        let mut data = header(
            &fat_sectors,
            dir_sectors[0],
            minifat_sectors.first().copied().unwrap_or(ENDOFCHAIN),
            minifat_count as u32,
        );
        for s in &sectors {
            data.extend_from_slice(s);
        }

        CbffImage {
            data,
            fat_sectors,
            dir_sectors,
            minifat_sectors,
            mini_stream_sectors,
            streams: layouts,
        }
    }
}

fn header(fat_sectors: &[u32], dir_start: u32, minifat_start: u32, minifat_count: u32) -> Vec<u8> {
    let mut h = vec![0u8; SECTOR];
    h[0..8].copy_from_slice(&SIGNATURE);
    h[0x18..0x1A].copy_from_slice(&0x003Eu16.to_le_bytes());
    h[0x1A..0x1C].copy_from_slice(&3u16.to_le_bytes());
    h[0x1C..0x1E].copy_from_slice(&0xFFFEu16.to_le_bytes());
    h[0x1E..0x20].copy_from_slice(&9u16.to_le_bytes());
    h[0x20..0x22].copy_from_slice(&6u16.to_le_bytes());
    h[0x2C..0x30].copy_from_slice(&(fat_sectors.len() as u32).to_le_bytes());
    h[0x30..0x34].copy_from_slice(&dir_start.to_le_bytes());
    h[0x38..0x3C].copy_from_slice(&MINI_CUTOFF.to_le_bytes());
    h[0x3C..0x40].copy_from_slice(&minifat_start.to_le_bytes());
    h[0x40..0x44].copy_from_slice(&minifat_count.to_le_bytes());
    h[0x44..0x48].copy_from_slice(&ENDOFCHAIN.to_le_bytes());
    for i in 0..109 {
        let v = fat_sectors.get(i).copied().unwrap_or(FREESECT);
        h[0x4C + i * 4..0x50 + i * 4].copy_from_slice(&v.to_le_bytes());
    }
    h
}

fn dir_entry(name: &str, ty: u8, left: u32, right: u32, child: u32, start: u32, size: u32) -> Vec<u8> {
    let mut e = vec![0u8; DIR_ENTRY];
    let units: Vec<u16> = name.encode_utf16().collect();
    for (i, u) in units.iter().take(31).enumerate() {
        e[i * 2..i * 2 + 2].copy_from_slice(&u.to_le_bytes());
    }
    let name_len = if name.is_empty() {
        0
    } else {
        ((units.len().min(31) + 1) * 2) as u16
    };
    e[0x40..0x42].copy_from_slice(&name_len.to_le_bytes());
    e[0x42] = ty;
    e[0x43] = 1;
    e[0x44..0x48].copy_from_slice(&left.to_le_bytes());
    e[0x48..0x4C].copy_from_slice(&right.to_le_bytes());
    e[0x4C..0x50].copy_from_slice(&child.to_le_bytes());
    e[0x74..0x78].copy_from_slice(&start.to_le_bytes());
    e[0x78..0x7C].copy_from_slice(&size.to_le_bytes());
    e
}

/// BIFF record: `{type, length}` header then body.
pub fn biff_record(rtype: u16, body: &[u8]) -> Vec<u8> {
    let mut out = rtype.to_le_bytes().to_vec();
    out.extend((body.len() as u16).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// BIFF8 BOF record of substream type `dt`.
pub fn biff_bof(dt: u16) -> Vec<u8> {
    let mut body = vec![0u8; 16];
    body[0..2].copy_from_slice(&0x0600u16.to_le_bytes());
    body[2..4].copy_from_slice(&dt.to_le_bytes());
    biff_record(0x0809, &body)
}

pub fn biff_eof() -> Vec<u8> {
    biff_record(0x000A, &[])
}

/// A minimal workbook globals substream: BOF, CODEPAGE, EOF.
pub fn minimal_workbook() -> Vec<u8> {
    let mut out = biff_bof(0x0005);
    out.extend(biff_record(0x0042, &1252u16.to_le_bytes()));
    out.extend(biff_eof());
    out
}

pub const SUMMARY_STREAM: &str = "\u{5}SummaryInformation";

/// Property set header declaring `count` sections, without section bodies.
pub fn property_set_header(count: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(0xFFFEu16.to_le_bytes());
    out.extend(0u16.to_le_bytes());
    out.extend(0x0a04u16.to_le_bytes());
    out.extend(2u16.to_le_bytes());
    out.extend([0u8; 16]);
    out.extend(count.to_le_bytes());
    out
}

/// Summary information stream with one section holding a code page and a title.
pub fn summary_information(title: &str) -> Vec<u8> {
    // F29F85E0-4FF9-1068-AB91-08002B27B3D9, little-endian GUID layout
    const FMTID: [u8; 16] = [
        0xE0, 0x85, 0x9F, 0xF2, 0xF9, 0x4F, 0x68, 0x10, 0xAB, 0x91, 0x08, 0x00, 0x2B, 0x27, 0xB3,
        0xD9,
    ];
    let mut out = property_set_header(1);
    out.extend(FMTID);
    out.extend(48u32.to_le_bytes());

    let mut title_value = 0x1Eu32.to_le_bytes().to_vec();
    title_value.extend(((title.len() + 1) as u32).to_le_bytes());
    title_value.extend(title.as_bytes());
    title_value.push(0);
    while title_value.len() % 4 != 0 {
        title_value.push(0);
    }
    let mut codepage = 0x02u32.to_le_bytes().to_vec();
    codepage.extend(1252u16.to_le_bytes());
    codepage.extend([0, 0]);

    let decls_len = 8 + 2 * 8;
    let mut section = Vec::new();
    section.extend(((decls_len + codepage.len() + title_value.len()) as u32).to_le_bytes());
    section.extend(2u32.to_le_bytes());
    section.extend(1u32.to_le_bytes());
    section.extend((decls_len as u32).to_le_bytes());
    section.extend(2u32.to_le_bytes());
    section.extend(((decls_len + codepage.len()) as u32).to_le_bytes());
    section.extend(codepage);
    section.extend(title_value);
    out.extend(section);
    out
}
