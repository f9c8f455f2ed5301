// crates/cf_io/src/checkpoint.rs

//! 检查点保存/恢复系统
//!
//! 以二进制格式保存按名称索引的场快照，只写出 `Persisted` 与 `Checkpointed`
//! 两类场；加载时要求所有 `Persisted` 场都在文件中。
//!
//! # 文件格式 (v1)
//!
//! ```text
//! [魔数: 4 bytes] "CFCK"
//! [版本: u32]
//! [时间: f64]
//! [步数: u64]
//! [配置哈希: u64]
//! [创建时间: u64]
//! [单元数: u64]
//! [场数: u32]
//! 每个场:
//!   [名称长度: u16][名称: UTF-8]
//!   [类别: u8][类型: u8]
//!   [数据: n_cells * f64 或 n_cells * 3 * f64]
//! [网格哈希: u64]
//! [CRC32: u32]
//! ```
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use cf_io::checkpoint::Checkpoint;
//!
//! let checkpoint = Checkpoint::new(1e-4, 1000, snapshot).with_mesh_hash(hash);
//! checkpoint.save(Path::new("run/checkpoint_00001000.cfck"))?;
//! let loaded = Checkpoint::load(Path::new("run/checkpoint_00001000.cfck"))?;
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{IoError, IoResult};
use crate::fields::{FieldClass, FieldData, FieldSnapshot, field_class};

// ============================================================
// 常量
// ============================================================

/// 检查点文件格式版本
const CHECKPOINT_VERSION: u32 = 1;

/// 检查点魔数
const CHECKPOINT_MAGIC: &[u8; 4] = b"CFCK";

/// 文件扩展名
const CHECKPOINT_EXT: &str = "cfck";

/// 检查点文件名前缀
const CHECKPOINT_PREFIX: &str = "checkpoint";

/// 头部长度（魔数到单元数）
const HEADER_LEN: usize = 4 + 4 + 8 + 8 + 8 + 8 + 8;

// ============================================================
// 检查点数据
// ============================================================

/// 检查点头部信息
#[derive(Debug, Clone)]
pub struct CheckpointHeader {
    /// 版本号
    pub version: u32,
    /// 模拟时间 [s]
    pub time: f64,
    /// 时间步数
    pub step: usize,
    /// 配置摘要哈希
    pub config_hash: Option<u64>,
    /// 创建时间戳
    pub created_at: u64,
    /// 单元数
    pub n_cells: usize,
}

/// 检查点数据
#[derive(Debug, Clone)]
pub struct Checkpoint {
    /// 版本号
    pub version: u32,
    /// 模拟时间 [s]
    pub time: f64,
    /// 时间步数
    pub step: usize,
    /// 场快照
    pub fields: FieldSnapshot,
    /// 配置摘要哈希
    pub config_hash: Option<u64>,
    /// 创建时间戳
    pub created_at: u64,
    /// 网格哈希
    pub mesh_hash: u64,
}

impl Checkpoint {
    /// 创建新检查点，`Ephemeral` 场被丢弃
    pub fn new(time: f64, step: usize, fields: FieldSnapshot) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            time,
            step,
            fields: fields.written_only(),
            config_hash: None,
            created_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            mesh_hash: 0,
        }
    }

    /// 设置配置哈希
    pub fn with_config_hash(mut self, hash: u64) -> Self {
        self.config_hash = Some(hash);
        self
    }

    /// 设置网格哈希
    pub fn with_mesh_hash(mut self, hash: u64) -> Self {
        self.mesh_hash = hash;
        self
    }

    /// 单元数
    pub fn n_cells(&self) -> usize {
        self.fields.n_cells()
    }

    /// 编码为字节（不含 CRC）
    fn encode(&self) -> IoResult<Vec<u8>> {
        let mut data = Vec::new();

        data.extend_from_slice(CHECKPOINT_MAGIC);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(&self.time.to_le_bytes());
        data.extend_from_slice(&(self.step as u64).to_le_bytes());
        data.extend_from_slice(&self.config_hash.unwrap_or(0).to_le_bytes());
        data.extend_from_slice(&self.created_at.to_le_bytes());
        data.extend_from_slice(&(self.fields.n_cells() as u64).to_le_bytes());
        data.extend_from_slice(&(self.fields.len() as u32).to_le_bytes());

        for (name, field) in self.fields.iter() {
            let name_bytes = name.as_bytes();
            let name_len = u16::try_from(name_bytes.len())
                .map_err(|_| IoError::Format(format!("场名过长: {name}")))?;
            data.extend_from_slice(&name_len.to_le_bytes());
            data.extend_from_slice(name_bytes);
            data.push(field_class(name).code());

            match field {
                FieldData::Scalar(values) => {
                    data.push(0);
                    for &v in values {
                        data.extend_from_slice(&v.to_le_bytes());
                    }
                }
                FieldData::Vector(values) => {
                    data.push(1);
                    for v in values {
                        for &c in v {
                            data.extend_from_slice(&c.to_le_bytes());
                        }
                    }
                }
            }
        }

        data.extend_from_slice(&self.mesh_hash.to_le_bytes());
        Ok(data)
    }

    /// 保存到文件（二进制格式）
    pub fn save(&self, path: &Path) -> IoResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = self.encode()?;
        let crc = compute_crc32(&data);

        // 先写临时文件，成功后重命名
        let temp_path = path.with_extension("cfck.tmp");
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&data)?;
            writer.write_all(&crc.to_le_bytes())?;
            writer.flush()?;
        }
        std::fs::rename(&temp_path, path)?;

        log::info!(
            "检查点已保存: {} (t={:.6e}, step={}, {} 个场)",
            path.display(),
            self.time,
            self.step,
            self.fields.len()
        );
        Ok(())
    }

    /// 从文件加载，并校验必读场
    pub fn load(path: &Path) -> IoResult<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut all_data = Vec::new();
        reader.read_to_end(&mut all_data)?;

        if all_data.len() < HEADER_LEN + 4 + 8 + 4 {
            return Err(IoError::Format("文件太小".into()));
        }

        let crc_offset = all_data.len() - 4;
        let data = &all_data[..crc_offset];
        let mut crc_bytes = ByteCursor::new(&all_data[crc_offset..]);
        let stored_crc = crc_bytes.u32()?;
        let computed_crc = compute_crc32(data);
        if stored_crc != computed_crc {
            return Err(IoError::Checksum {
                expected: stored_crc,
                found: computed_crc,
            });
        }

        let mut cur = ByteCursor::new(data);
        let header = read_header_from(&mut cur)?;
        let n_fields = cur.u32()? as usize;

        let mut fields = FieldSnapshot::new(header.n_cells);
        for _ in 0..n_fields {
            let name_len = cur.u16()? as usize;
            let name = std::str::from_utf8(cur.take(name_len)?)
                .map_err(|e| IoError::Format(format!("场名不是 UTF-8: {e}")))?
                .to_string();
            let class = FieldClass::from_code(cur.u8()?)
                .ok_or_else(|| IoError::Format(format!("场 '{name}' 类别编码无效")))?;
            if class != field_class(&name) {
                log::warn!("场 '{}' 的存储类别 {:?} 与当前目录不一致", name, class);
            }

            let data = match cur.u8()? {
                0 => {
                    let mut values = Vec::with_capacity(header.n_cells);
                    for _ in 0..header.n_cells {
                        values.push(cur.f64()?);
                    }
                    FieldData::Scalar(values)
                }
                1 => {
                    let mut values = Vec::with_capacity(header.n_cells);
                    for _ in 0..header.n_cells {
                        values.push([cur.f64()?, cur.f64()?, cur.f64()?]);
                    }
                    FieldData::Vector(values)
                }
                other => {
                    return Err(IoError::Format(format!("场 '{name}' 类型编码无效: {other}")));
                }
            };
            fields.insert(name, data)?;
        }

        let mesh_hash = cur.u64()?;
        fields.verify_persisted()?;

        Ok(Self {
            version: header.version,
            time: header.time,
            step: header.step,
            fields,
            config_hash: header.config_hash,
            created_at: header.created_at,
            mesh_hash,
        })
    }

    /// 仅读取头部信息
    pub fn read_header(path: &Path) -> IoResult<CheckpointHeader> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut buf = [0u8; HEADER_LEN];
        reader.read_exact(&mut buf)?;
        read_header_from(&mut ByteCursor::new(&buf))
    }

    /// 验证网格兼容性
    pub fn verify_mesh_compatibility(&self, expected_cells: usize, mesh_hash: u64) -> IoResult<()> {
        let found = self.fields.n_cells();
        if found != expected_cells {
            return Err(IoError::MeshMismatch {
                expected: expected_cells,
                found,
            });
        }
        if self.mesh_hash != 0 && mesh_hash != 0 && self.mesh_hash != mesh_hash {
            return Err(IoError::Format(format!(
                "网格哈希不一致: 文件 {:016x}, 当前 {:016x}",
                self.mesh_hash, mesh_hash
            )));
        }
        Ok(())
    }

    /// 验证配置兼容性
    pub fn verify_config_compatibility(&self, expected_hash: u64) -> bool {
        self.config_hash.map_or(true, |hash| hash == expected_hash)
    }
}

fn read_header_from(cur: &mut ByteCursor<'_>) -> IoResult<CheckpointHeader> {
    if cur.take(4)? != CHECKPOINT_MAGIC {
        return Err(IoError::Format("无效的检查点文件格式".into()));
    }
    let version = cur.u32()?;
    if version > CHECKPOINT_VERSION {
        return Err(IoError::Version {
            file: version,
            current: CHECKPOINT_VERSION,
        });
    }
    let time = cur.f64()?;
    let step = cur.u64()? as usize;
    let config_hash = cur.u64()?;
    let created_at = cur.u64()?;
    let n_cells = cur.u64()? as usize;

    Ok(CheckpointHeader {
        version,
        time,
        step,
        config_hash: (config_hash != 0).then_some(config_hash),
        created_at,
        n_cells,
    })
}

// ============================================================
// 字节读取
// ============================================================

/// 带越界检查的小端字节读取器
struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, n: usize) -> IoResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| IoError::Format(format!("数据在偏移 {} 处截断", self.offset)))?;
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> IoResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> IoResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> IoResult<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> IoResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> IoResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> IoResult<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }
}

// ============================================================
// 校验与哈希
// ============================================================

/// 计算 CRC32 校验和（IEEE 多项式）
pub fn compute_crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        let index = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = CRC32_TABLE[index] ^ (crc >> 8);
    }
    !crc
}

const fn generate_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = 0xEDB8_8320 ^ (crc >> 1);
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC32 查找表（编译期生成）
const CRC32_TABLE: [u32; 256] = generate_crc32_table();

/// FNV-1a 64 位哈希，用于配置与网格指纹
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

// ============================================================
// 检查点管理器
// ============================================================

/// 检查点管理器
///
/// 管理目录中的多个检查点文件，保存后自动删除超出数量的旧文件。
pub struct CheckpointManager {
    directory: PathBuf,
    max_checkpoints: usize,
}

impl CheckpointManager {
    /// 创建新的管理器
    pub fn new(directory: impl Into<PathBuf>, max_checkpoints: usize) -> Self {
        Self {
            directory: directory.into(),
            max_checkpoints: max_checkpoints.max(1),
        }
    }

    /// 检查点目录
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// 保存检查点并清理旧文件
    pub fn save(&self, checkpoint: &Checkpoint) -> IoResult<PathBuf> {
        std::fs::create_dir_all(&self.directory)?;
        let filename = format!("{}_{:08}.{}", CHECKPOINT_PREFIX, checkpoint.step, CHECKPOINT_EXT);
        let path = self.directory.join(filename);
        checkpoint.save(&path)?;
        self.cleanup()?;
        Ok(path)
    }

    /// 加载最新的检查点
    pub fn load_latest(&self) -> IoResult<Option<Checkpoint>> {
        let latest = self
            .list_checkpoints()?
            .into_iter()
            .max_by_key(|(_, header)| header.step);
        match latest {
            Some((path, _)) => Ok(Some(Checkpoint::load(&path)?)),
            None => Ok(None),
        }
    }

    /// 列出目录中的检查点
    pub fn list_checkpoints(&self) -> IoResult<Vec<(PathBuf, CheckpointHeader)>> {
        let mut results = Vec::new();
        if !self.directory.exists() {
            return Ok(results);
        }

        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            let matches_prefix = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(CHECKPOINT_PREFIX));
            if matches_prefix && path.extension().is_some_and(|ext| ext == CHECKPOINT_EXT) {
                match Checkpoint::read_header(&path) {
                    Ok(header) => results.push((path, header)),
                    Err(e) => log::warn!("跳过无法读取的检查点 {}: {}", path.display(), e),
                }
            }
        }
        Ok(results)
    }

    fn cleanup(&self) -> IoResult<()> {
        let mut entries = self.list_checkpoints()?;
        if entries.len() <= self.max_checkpoints {
            return Ok(());
        }
        entries.sort_by_key(|(_, header)| header.step);
        let to_remove = entries.len() - self.max_checkpoints;
        for (path, _) in entries.into_iter().take(to_remove) {
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("删除旧检查点失败 {}: {}", path.display(), e);
            }
        }
        Ok(())
    }
}

// ============================================================
// 测试
// ============================================================
