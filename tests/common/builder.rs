use crate::common::SparseImage;

pub const SECTOR: u64 = 2048;
pub const XGD2_OFFSET: u64 = 0xFD90000;
pub const XGD3_OFFSET: u64 = 0x2080000;
const HEADER_OFFSET: u64 = 0x10000;
const FIRST_FREE_SECTOR: u32 = 33; // 32 = volume descriptor

pub enum Node {
    File(String, Vec<u8>),
    Dir(String, Vec<Node>),
}

pub fn file(name: &str, content: &[u8]) -> Node {
    Node::File(name.to_string(), content.to_vec())
}

pub fn dir(name: &str, children: Vec<Node>) -> Node {
    Node::Dir(name.to_string(), children)
}

struct Record {
    name: String,
    sector: u32,
    size: u32,
    attributes: u8,
}

pub struct XisoBuilder {
    root_offset: u64,
    root: Vec<Node>,
}

impl XisoBuilder {
    pub fn xgd2() -> Self {
        Self::at(XGD2_OFFSET)
    }

    pub fn xgd3() -> Self {
        Self::at(XGD3_OFFSET)
    }

    /// Original Xbox layout, volume at the start of the image.
    pub fn original_xbox() -> Self {
        Self::at(0)
    }

    pub fn at(root_offset: u64) -> Self {
        Self {
            root_offset,
            root: Vec::new(),
        }
    }

    pub fn add(mut self, node: Node) -> Self {
        self.root.push(node);
        self
    }

    pub fn build(&self) -> SparseImage {
        let mut image = SparseImage::new();
        let mut next_sector = FIRST_FREE_SECTOR;
        let (root_sector, root_size) = self.write_dir(&mut image, &self.root, &mut next_sector);

        let mut descriptor = Vec::new();
        descriptor.extend_from_slice(b"MICROSOFT*XBOX*MEDIA");
        descriptor.extend_from_slice(&root_sector.to_le_bytes());
        descriptor.extend_from_slice(&root_size.to_le_bytes());
        image.write_at(self.root_offset + HEADER_OFFSET, &descriptor);

        image.set_len(self.sector_position(next_sector));
        image
    }

    fn sector_position(&self, sector: u32) -> u64 {
        self.root_offset + sector as u64 * SECTOR
    }

    fn write_dir(&self, image: &mut SparseImage, nodes: &[Node], next: &mut u32) -> (u32, u32) {
        if nodes.is_empty() {
            return (0, 0);
        }

        let table_size: usize = nodes.iter().map(|n| record_len(node_name(n))).sum();
        let reserved = (table_size as u64).div_ceil(SECTOR).max(1) as u32;
        let sector = *next;
        *next += reserved;

        let mut records = Vec::new();
        for node in nodes {
            match node {
                Node::File(name, content) => {
                    let file_sector = *next;
                    *next += (content.len() as u64).div_ceil(SECTOR) as u32;
                    image.write_at(self.sector_position(file_sector), content);
                    records.push(Record {
                        name: name.clone(),
                        sector: file_sector,
                        size: content.len() as u32,
                        attributes: 0x80,
                    });
                }
                Node::Dir(name, children) => {
                    let (dir_sector, dir_size) = self.write_dir(image, children, next);
                    records.push(Record {
                        name: name.clone(),
                        sector: dir_sector,
                        size: dir_size,
                        attributes: 0x10,
                    });
                }
            }
        }
        records.sort_by_key(|r| r.name.to_uppercase());

        let mut table = Vec::new();
        write_tree(&mut table, &records);
        table.resize((reserved as u64 * SECTOR) as usize, 0xff);
        image.write_at(self.sector_position(sector), &table);

        (sector, reserved * SECTOR as u32)
    }
}

/// Image whose root directory is `table` verbatim, declared `root_size` bytes long.
pub fn raw_root(root_offset: u64, root_size: u32, table: &[u8]) -> SparseImage {
    let mut image = SparseImage::new();
    let mut descriptor = Vec::new();
    descriptor.extend_from_slice(b"MICROSOFT*XBOX*MEDIA");
    descriptor.extend_from_slice(&FIRST_FREE_SECTOR.to_le_bytes());
    descriptor.extend_from_slice(&root_size.to_le_bytes());
    image.write_at(root_offset + HEADER_OFFSET, &descriptor);

    let root_position = root_offset + FIRST_FREE_SECTOR as u64 * SECTOR;
    image.write_at(root_position, table);
    image.set_len(root_position + (root_size as u64).div_ceil(SECTOR).max(1) * SECTOR);
    image
}

fn node_name(node: &Node) -> &str {
    match node {
        Node::File(name, _) | Node::Dir(name, _) => name,
    }
}

fn record_len(name: &str) -> usize {
    (14 + name.len() + 3) & !3
}

/// Writes `records` as a balanced binary tree, root first. Returns the root offset in dwords.
fn write_tree(table: &mut Vec<u8>, records: &[Record]) -> u16 {
    let mid = records.len() / 2;
    let record = &records[mid];
    let pos = table.len();

    table.extend_from_slice(&[0; 4]);
    table.extend_from_slice(&record.sector.to_le_bytes());
    table.extend_from_slice(&record.size.to_le_bytes());
    table.push(record.attributes);
    table.push(record.name.len() as u8);
    table.extend_from_slice(record.name.as_bytes());
    while table.len() % 4 != 0 {
        table.push(0xff);
    }

    let left = if mid > 0 {
        write_tree(table, &records[..mid])
    } else {
        0
    };
    let right = if mid + 1 < records.len() {
        write_tree(table, &records[mid + 1..])
    } else {
        0
    };
    table[pos..pos + 2].copy_from_slice(&left.to_le_bytes());
    table[pos + 2..pos + 4].copy_from_slice(&right.to_le_bytes());

    (pos / 4) as u16
}

pub struct XexBuilder {
    pub module_flags: u32,
    pub media_id: u32,
    pub version: u32,
    pub base_version: u32,
    pub title_id: u32,
    pub platform: u8,
    pub executable_type: u8,
    pub disc_number: u8,
    pub disc_count: u8,
    pub original_name: Option<String>,
    pub entry_point: Option<u32>,
    pub with_execution_info: bool,
    pub pe_data_offset: Option<u32>,
    pub security_info_offset: Option<u32>,
    pub header_count: Option<u32>,
}

impl Default for XexBuilder {
    fn default() -> Self {
        Self {
            module_flags: 0x01,
            media_id: 0x1A2B3C4D,
            version: 0x2000_1100,
            base_version: 0x2000_0000,
            title_id: 0x4D5307E6,
            platform: 0,
            executable_type: 0,
            disc_number: 1,
            disc_count: 1,
            original_name: None,
            entry_point: None,
            with_execution_info: true,
            pe_data_offset: None,
            security_info_offset: None,
            header_count: None,
        }
    }
}

impl XexBuilder {
    pub fn build(&self) -> Vec<u8> {
        let mut headers: Vec<(u32, u32)> = Vec::new();
        let mut data_area = Vec::new();

        let header_count = self.with_execution_info as usize
            + self.original_name.is_some() as usize
            + self.entry_point.is_some() as usize;
        let data_start = (0x18 + header_count * 8) as u32;

        if let Some(entry_point) = self.entry_point {
            headers.push((0x0001_0100, entry_point));
        }
        if self.with_execution_info {
            headers.push((0x0004_0006, data_start + data_area.len() as u32));
            data_area.extend_from_slice(&self.media_id.to_be_bytes());
            data_area.extend_from_slice(&self.version.to_be_bytes());
            data_area.extend_from_slice(&self.base_version.to_be_bytes());
            data_area.extend_from_slice(&self.title_id.to_be_bytes());
            data_area.extend_from_slice(&[
                self.platform,
                self.executable_type,
                self.disc_number,
                self.disc_count,
            ]);
        }
        if let Some(name) = &self.original_name {
            headers.push((0x0001_83FF, data_start + data_area.len() as u32));
            let padded = (name.len() + 1 + 3) & !3;
            data_area.extend_from_slice(&((padded + 4) as u32).to_be_bytes());
            data_area.extend_from_slice(name.as_bytes());
            data_area.resize(data_area.len() + padded - name.len(), 0);
        }

        let security_info_offset = data_start + data_area.len() as u32;
        let pe_data_offset = security_info_offset + 0x180;

        let mut out = Vec::new();
        out.extend_from_slice(b"XEX2");
        out.extend_from_slice(&self.module_flags.to_be_bytes());
        out.extend_from_slice(&self.pe_data_offset.unwrap_or(pe_data_offset).to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(
            &self
                .security_info_offset
                .unwrap_or(security_info_offset)
                .to_be_bytes(),
        );
        out.extend_from_slice(&self.header_count.unwrap_or(headers.len() as u32).to_be_bytes());
        for (key, value) in &headers {
            out.extend_from_slice(&key.to_be_bytes());
            out.extend_from_slice(&value.to_be_bytes());
        }
        out.extend_from_slice(&data_area);
        out.resize(pe_data_offset as usize + 0x200, 0);
        out
    }
}
