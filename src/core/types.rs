//! Shared storage vocabulary.
//!
//! These types are owned by the storage layer; the maintenance scheduler only
//! passes them between collaborators (compaction, sweeping, monitoring) and
//! never mutates them.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type TabletId = i64;
pub type SchemaHash = i32;
pub type VersionHash = i64;

/// Contiguous range of committed increments `[start, end]` of a tablet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub start: i64,
    pub end: i64,
}

impl Version {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// A version produced by a single load rather than by a merge.
    pub fn is_singleton(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, other: &Version) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}]", self.start, self.end)
    }
}

/// Identity of a tablet replica. Ordered by tablet id, then schema hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TabletInfo {
    pub tablet_id: TabletId,
    pub schema_hash: SchemaHash,
}

impl TabletInfo {
    pub fn new(tablet_id: TabletId, schema_hash: SchemaHash) -> Self {
        Self {
            tablet_id,
            schema_hash,
        }
    }
}

impl fmt::Display for TabletInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}.{}", self.tablet_id, self.schema_hash)
    }
}

/// Min/max key of one column inside a rowset, rendered by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    pub min: String,
    pub max: String,
}

/// Physical summary of one rowset of a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSetEntity {
    pub rowset_id: i32,
    pub num_segments: i32,
    pub num_rows: i64,
    pub data_size: u64,
    pub index_size: u64,
    pub empty: bool,
    pub key_ranges: Vec<KeyRange>,
}

/// A version together with the rowsets that materialise it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntity {
    pub version: Version,
    pub version_hash: VersionHash,
    pub rowsets: Vec<RowSetEntity>,
}

impl VersionEntity {
    pub fn new(version: Version, version_hash: VersionHash) -> Self {
        Self {
            version,
            version_hash,
            rowsets: Vec::new(),
        }
    }

    pub fn add_rowset(&mut self, rowset: RowSetEntity) {
        self.rowsets.push(rowset);
    }

    pub fn num_rows(&self) -> i64 {
        self.rowsets.iter().map(|r| r.num_rows).sum()
    }

    pub fn data_size(&self) -> u64 {
        self.rowsets.iter().map(|r| r.data_size).sum()
    }
}

/// Compaction tier served by a worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompactionTier {
    Base,
    Cumulative,
}

impl CompactionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Cumulative => "cumulative",
        }
    }

    pub fn reader_type(&self) -> ReaderType {
        match self {
            Self::Base => ReaderType::BaseCompaction,
            Self::Cumulative => ReaderType::CumulativeCompaction,
        }
    }
}

impl fmt::Display for CompactionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declares a storage enum with fixed wire codes and a checked conversion
/// back from the code.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(i32)]
        pub enum $name {
            $($variant = $code),+
        }

        impl $name {
            pub fn code(self) -> i32 {
                self as i32
            }
        }

        impl TryFrom<i32> for $name {
            type Error = i32;

            fn try_from(code: i32) -> std::result::Result<Self, i32> {
                match code {
                    $(c if c == $code => Ok(Self::$variant),)+
                    other => Err(other),
                }
            }
        }
    };
}

wire_enum!(
    /// Comparison used by delete predicates and key-range scans.
    RangeCondition {
        Gt = 0,
        Ge = 1,
        Lt = 2,
        Le = 3,
    }
);

wire_enum!(
    DelCondSatisfied {
        Satisfied = 0,
        NotSatisfied = 1,
        PartialSatisfied = 2,
    }
);

wire_enum!(
    /// Column storage types.
    FieldType {
        TinyInt = 1,
        UnsignedTinyInt = 2,
        SmallInt = 3,
        UnsignedSmallInt = 4,
        Int = 5,
        UnsignedInt = 6,
        BigInt = 7,
        UnsignedBigInt = 8,
        LargeInt = 9,
        Float = 10,
        Double = 11,
        DiscreteDouble = 12,
        Char = 13,
        Date = 14,
        DateTime = 15,
        Decimal = 16,
        Varchar = 17,
        Struct = 18,
        List = 19,
        Map = 20,
        Unknown = 21,
        None = 22,
        Hll = 23,
    }
);

wire_enum!(
    /// Aggregation applied to value columns when rows with equal keys merge.
    /// Not every method makes sense for every field type; that is checked at
    /// table creation, not here.
    FieldAggregationMethod {
        None = 0,
        Sum = 1,
        Min = 2,
        Max = 3,
        Replace = 4,
        HllUnion = 5,
        Unknown = 6,
    }
);

wire_enum!(
    CompressionKind {
        Transport = 1,
        Storage = 2,
        Lz4 = 3,
    }
);

wire_enum!(
    HllDataType {
        Empty = 0,
        Explicit = 1,
        Sparse = 2,
        Full = 3,
        None = 4,
    }
);

wire_enum!(
    AlterTabletType {
        SchemaChange = 1,
        CreateRollupTable = 2,
    }
);

wire_enum!(
    AlterTableStatus {
        Waiting = 0,
        Running = 1,
        Finished = 2,
        Failed = 3,
    }
);

wire_enum!(
    PushType {
        Normal = 1,
        ForDelete = 2,
        ForLoadDelete = 3,
    }
);

wire_enum!(
    /// Purpose of a tablet reader; compaction readers are opened by the
    /// compaction collaborators the scheduler drives.
    ReaderType {
        Query = 0,
        AlterTable = 1,
        BaseCompaction = 2,
        CumulativeCompaction = 3,
        Checksum = 4,
    }
);

/// Counters collected while scanning storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderStatistics {
    pub io_ns: i64,
    pub compressed_bytes_read: i64,
    pub decompress_ns: i64,
    pub uncompressed_bytes_read: i64,
    pub bytes_read: i64,
    pub block_load_ns: i64,
    pub blocks_load: i64,
    pub block_fetch_ns: i64,
    pub raw_rows_read: i64,
    pub rows_vec_cond_filtered: i64,
    pub vec_cond_ns: i64,
    pub rows_stats_filtered: i64,
    pub rows_del_filtered: i64,
    pub index_load_ns: i64,
}

impl ReaderStatistics {
    pub fn merge(&mut self, other: &ReaderStatistics) {
        self.io_ns += other.io_ns;
        self.compressed_bytes_read += other.compressed_bytes_read;
        self.decompress_ns += other.decompress_ns;
        self.uncompressed_bytes_read += other.uncompressed_bytes_read;
        self.bytes_read += other.bytes_read;
        self.block_load_ns += other.block_load_ns;
        self.blocks_load += other.blocks_load;
        self.block_fetch_ns += other.block_fetch_ns;
        self.raw_rows_read += other.raw_rows_read;
        self.rows_vec_cond_filtered += other.rows_vec_cond_filtered;
        self.vec_cond_ns += other.vec_cond_ns;
        self.rows_stats_filtered += other.rows_stats_filtered;
        self.rows_del_filtered += other.rows_del_filtered;
        self.index_load_ns += other.index_load_ns;
    }
}
