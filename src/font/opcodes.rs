//! # TrueType Opcode Metadata
//!
//! A 256-entry table describing every instruction byte: its mnemonic, how
//! many inline bytes follow it, how it moves the interpreter stack, and
//! whether it touches the CVT, the storage area or the function table.
//!
//! The table is immutable once built. [`OpcodeTableCell`] is the
//! compute-once cell that builds it: the first caller does the work, every
//! later (or concurrent) caller gets the finished table. Tests construct
//! their own cells; the subsetter uses the process-wide one from
//! [`global`].

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// What an instruction does, as far as the static scanner cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Fixed pops/pushes, no CVT/storage/function access.
    Plain,
    /// `PUSHB[n]`: `n` inline bytes.
    PushBytes(u8),
    /// `PUSHW[n]`: `n` inline words.
    PushWords(u8),
    /// `NPUSHB`: count byte, then bytes.
    NPushBytes,
    /// `NPUSHW`: count byte, then words.
    NPushWords,
    /// `RCVT`: pops a CVT index, pushes its value.
    ReadCvt,
    /// `WCVTP`/`WCVTF`: pops a value, then a CVT index.
    WriteCvt,
    /// `MIAP`/`MIRP`: pops a CVT index, then a point.
    CvtOperand,
    /// `RS`: pops a storage index, pushes its value.
    ReadStorage,
    /// `WS`: pops a value, then a storage index.
    WriteStorage,
    Call,
    LoopCall,
    FunctionDef,
    EndFunction,
    InstructionDef,
    If,
    Else,
    EndIf,
    /// `JMPR`/`JROT`/`JROF`.
    Jump,
    Dup,
    Pop,
    Clear,
    Swap,
    Depth,
    CIndex,
    MIndex,
    Roll,
    /// `SLOOP`: sets the repeat count for loop consumers.
    SetLoop,
    /// Pops `loop` points plus `pops` fixed operands.
    LoopConsumer,
    /// `DELTAP1..3`: pops n, then n (point, arg) pairs.
    DeltaPoint,
    /// `DELTAC1..3`: pops n, then n (cvt, arg) pairs.
    DeltaCvt,
    /// Stack effect not statically known (`GETVARIATION`).
    Opaque,
    /// Not a defined instruction; may be claimed by an `IDEF`.
    Undefined,
}

/// Metadata for one instruction byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub name: &'static str,
    pub kind: OpKind,
    pub pops: u8,
    pub pushes: u8,
}

impl OpcodeInfo {
    const UNDEFINED: OpcodeInfo = OpcodeInfo {
        name: "UNDEF",
        kind: OpKind::Undefined,
        pops: 0,
        pushes: 0,
    };

    /// Number of inline bytes following the opcode, given the byte after it
    /// (the count byte for `NPUSHB`/`NPUSHW`). Includes the count byte.
    pub fn inline_len(&self, next: Option<u8>) -> Option<usize> {
        match self.kind {
            OpKind::PushBytes(n) => Some(n as usize),
            OpKind::PushWords(n) => Some(n as usize * 2),
            OpKind::NPushBytes => next.map(|n| 1 + n as usize),
            OpKind::NPushWords => next.map(|n| 1 + n as usize * 2),
            _ => Some(0),
        }
    }
}

/// Immutable metadata for all 256 instruction bytes.
pub struct OpcodeTable {
    entries: [OpcodeInfo; 256],
}

impl fmt::Debug for OpcodeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpcodeTable")
            .field("defined", &self.defined_count())
            .finish_non_exhaustive()
    }
}

impl OpcodeTable {
    pub fn get(&self, opcode: u8) -> &OpcodeInfo {
        &self.entries[opcode as usize]
    }

    /// Number of defined instructions.
    pub fn defined_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind != OpKind::Undefined)
            .count()
    }

    fn build() -> Self {
        use OpKind::*;

        let mut entries = [OpcodeInfo::UNDEFINED; 256];
        let mut set = |range: std::ops::RangeInclusive<u8>,
                       name: &'static str,
                       kind: OpKind,
                       pops: u8,
                       pushes: u8| {
            for op in range {
                entries[op as usize] = OpcodeInfo {
                    name,
                    kind,
                    pops,
                    pushes,
                };
            }
        };

        set(0x00..=0x01, "SVTCA", Plain, 0, 0);
        set(0x02..=0x03, "SPVTCA", Plain, 0, 0);
        set(0x04..=0x05, "SFVTCA", Plain, 0, 0);
        set(0x06..=0x07, "SPVTL", Plain, 2, 0);
        set(0x08..=0x09, "SFVTL", Plain, 2, 0);
        set(0x0A..=0x0A, "SPVFS", Plain, 2, 0);
        set(0x0B..=0x0B, "SFVFS", Plain, 2, 0);
        set(0x0C..=0x0C, "GPV", Plain, 0, 2);
        set(0x0D..=0x0D, "GFV", Plain, 0, 2);
        set(0x0E..=0x0E, "SFVTPV", Plain, 0, 0);
        set(0x0F..=0x0F, "ISECT", Plain, 5, 0);
        set(0x10..=0x10, "SRP0", Plain, 1, 0);
        set(0x11..=0x11, "SRP1", Plain, 1, 0);
        set(0x12..=0x12, "SRP2", Plain, 1, 0);
        set(0x13..=0x13, "SZP0", Plain, 1, 0);
        set(0x14..=0x14, "SZP1", Plain, 1, 0);
        set(0x15..=0x15, "SZP2", Plain, 1, 0);
        set(0x16..=0x16, "SZPS", Plain, 1, 0);
        set(0x17..=0x17, "SLOOP", SetLoop, 1, 0);
        set(0x18..=0x18, "RTG", Plain, 0, 0);
        set(0x19..=0x19, "RTHG", Plain, 0, 0);
        set(0x1A..=0x1A, "SMD", Plain, 1, 0);
        set(0x1B..=0x1B, "ELSE", Else, 0, 0);
        set(0x1C..=0x1C, "JMPR", Jump, 1, 0);
        set(0x1D..=0x1D, "SCVTCI", Plain, 1, 0);
        set(0x1E..=0x1E, "SSWCI", Plain, 1, 0);
        set(0x1F..=0x1F, "SSW", Plain, 1, 0);
        set(0x20..=0x20, "DUP", Dup, 1, 2);
        set(0x21..=0x21, "POP", Pop, 1, 0);
        set(0x22..=0x22, "CLEAR", Clear, 0, 0);
        set(0x23..=0x23, "SWAP", Swap, 2, 2);
        set(0x24..=0x24, "DEPTH", Depth, 0, 1);
        set(0x25..=0x25, "CINDEX", CIndex, 1, 1);
        set(0x26..=0x26, "MINDEX", MIndex, 1, 1);
        set(0x27..=0x27, "ALIGNPTS", Plain, 2, 0);
        set(0x29..=0x29, "UTP", Plain, 1, 0);
        set(0x2A..=0x2A, "LOOPCALL", LoopCall, 2, 0);
        set(0x2B..=0x2B, "CALL", Call, 1, 0);
        set(0x2C..=0x2C, "FDEF", FunctionDef, 1, 0);
        set(0x2D..=0x2D, "ENDF", EndFunction, 0, 0);
        set(0x2E..=0x2F, "MDAP", Plain, 1, 0);
        set(0x30..=0x31, "IUP", Plain, 0, 0);
        set(0x32..=0x33, "SHP", LoopConsumer, 0, 0);
        set(0x34..=0x35, "SHC", Plain, 1, 0);
        set(0x36..=0x37, "SHZ", Plain, 1, 0);
        set(0x38..=0x38, "SHPIX", LoopConsumer, 1, 0);
        set(0x39..=0x39, "IP", LoopConsumer, 0, 0);
        set(0x3A..=0x3B, "MSIRP", Plain, 2, 0);
        set(0x3C..=0x3C, "ALIGNRP", LoopConsumer, 0, 0);
        set(0x3D..=0x3D, "RTDG", Plain, 0, 0);
        set(0x3E..=0x3F, "MIAP", CvtOperand, 2, 0);
        set(0x40..=0x40, "NPUSHB", NPushBytes, 0, 0);
        set(0x41..=0x41, "NPUSHW", NPushWords, 0, 0);
        set(0x42..=0x42, "WS", WriteStorage, 2, 0);
        set(0x43..=0x43, "RS", ReadStorage, 1, 1);
        set(0x44..=0x44, "WCVTP", WriteCvt, 2, 0);
        set(0x45..=0x45, "RCVT", ReadCvt, 1, 1);
        set(0x46..=0x47, "GC", Plain, 1, 1);
        set(0x48..=0x48, "SCFS", Plain, 2, 0);
        set(0x49..=0x4A, "MD", Plain, 2, 1);
        set(0x4B..=0x4B, "MPPEM", Plain, 0, 1);
        set(0x4C..=0x4C, "MPS", Plain, 0, 1);
        set(0x4D..=0x4D, "FLIPON", Plain, 0, 0);
        set(0x4E..=0x4E, "FLIPOFF", Plain, 0, 0);
        set(0x4F..=0x4F, "DEBUG", Plain, 1, 0);
        set(0x50..=0x50, "LT", Plain, 2, 1);
        set(0x51..=0x51, "LTEQ", Plain, 2, 1);
        set(0x52..=0x52, "GT", Plain, 2, 1);
        set(0x53..=0x53, "GTEQ", Plain, 2, 1);
        set(0x54..=0x54, "EQ", Plain, 2, 1);
        set(0x55..=0x55, "NEQ", Plain, 2, 1);
        set(0x56..=0x56, "ODD", Plain, 1, 1);
        set(0x57..=0x57, "EVEN", Plain, 1, 1);
        set(0x58..=0x58, "IF", If, 1, 0);
        set(0x59..=0x59, "EIF", EndIf, 0, 0);
        set(0x5A..=0x5A, "AND", Plain, 2, 1);
        set(0x5B..=0x5B, "OR", Plain, 2, 1);
        set(0x5C..=0x5C, "NOT", Plain, 1, 1);
        set(0x5D..=0x5D, "DELTAP1", DeltaPoint, 1, 0);
        set(0x5E..=0x5E, "SDB", Plain, 1, 0);
        set(0x5F..=0x5F, "SDS", Plain, 1, 0);
        set(0x60..=0x60, "ADD", Plain, 2, 1);
        set(0x61..=0x61, "SUB", Plain, 2, 1);
        set(0x62..=0x62, "DIV", Plain, 2, 1);
        set(0x63..=0x63, "MUL", Plain, 2, 1);
        set(0x64..=0x64, "ABS", Plain, 1, 1);
        set(0x65..=0x65, "NEG", Plain, 1, 1);
        set(0x66..=0x66, "FLOOR", Plain, 1, 1);
        set(0x67..=0x67, "CEILING", Plain, 1, 1);
        set(0x68..=0x6B, "ROUND", Plain, 1, 1);
        set(0x6C..=0x6F, "NROUND", Plain, 1, 1);
        set(0x70..=0x70, "WCVTF", WriteCvt, 2, 0);
        set(0x71..=0x71, "DELTAP2", DeltaPoint, 1, 0);
        set(0x72..=0x72, "DELTAP3", DeltaPoint, 1, 0);
        set(0x73..=0x73, "DELTAC1", DeltaCvt, 1, 0);
        set(0x74..=0x74, "DELTAC2", DeltaCvt, 1, 0);
        set(0x75..=0x75, "DELTAC3", DeltaCvt, 1, 0);
        set(0x76..=0x76, "SROUND", Plain, 1, 0);
        set(0x77..=0x77, "S45ROUND", Plain, 1, 0);
        set(0x78..=0x78, "JROT", Jump, 2, 0);
        set(0x79..=0x79, "JROF", Jump, 2, 0);
        set(0x7A..=0x7A, "ROFF", Plain, 0, 0);
        set(0x7C..=0x7C, "RUTG", Plain, 0, 0);
        set(0x7D..=0x7D, "RDTG", Plain, 0, 0);
        set(0x7E..=0x7E, "SANGW", Plain, 1, 0);
        set(0x7F..=0x7F, "AA", Plain, 1, 0);
        set(0x80..=0x80, "FLIPPT", LoopConsumer, 0, 0);
        set(0x81..=0x81, "FLIPRGON", Plain, 2, 0);
        set(0x82..=0x82, "FLIPRGOFF", Plain, 2, 0);
        set(0x85..=0x85, "SCANCTRL", Plain, 1, 0);
        set(0x86..=0x87, "SDPVTL", Plain, 2, 0);
        set(0x88..=0x88, "GETINFO", Plain, 1, 1);
        set(0x89..=0x89, "IDEF", InstructionDef, 1, 0);
        set(0x8A..=0x8A, "ROLL", Roll, 3, 3);
        set(0x8B..=0x8B, "MAX", Plain, 2, 1);
        set(0x8C..=0x8C, "MIN", Plain, 2, 1);
        set(0x8D..=0x8D, "SCANTYPE", Plain, 1, 0);
        set(0x8E..=0x8E, "INSTCTRL", Plain, 2, 0);
        set(0x91..=0x91, "GETVARIATION", Opaque, 0, 0);
        set(0x92..=0x92, "GETDATA", Plain, 0, 1);
        for n in 0..8u8 {
            set(0xB0 + n..=0xB0 + n, "PUSHB", PushBytes(n + 1), 0, n + 1);
            set(0xB8 + n..=0xB8 + n, "PUSHW", PushWords(n + 1), 0, n + 1);
        }
        set(0xC0..=0xDF, "MDRP", Plain, 1, 0);
        set(0xE0..=0xFF, "MIRP", CvtOperand, 2, 0);

        OpcodeTable { entries }
    }
}

/// A compute-once home for an [`OpcodeTable`].
///
/// Backed by `OnceLock`: racing first callers serialize inside
/// `get_or_init`, exactly one of them builds the table, and every caller
/// after that reads it without locking.
pub struct OpcodeTableCell {
    table: OnceLock<OpcodeTable>,
    builds: AtomicUsize,
}

impl Default for OpcodeTableCell {
    fn default() -> Self {
        Self::new()
    }
}

impl OpcodeTableCell {
    pub const fn new() -> Self {
        OpcodeTableCell {
            table: OnceLock::new(),
            builds: AtomicUsize::new(0),
        }
    }

    /// The table, building it on first use.
    pub fn get(&self) -> &OpcodeTable {
        self.table.get_or_init(|| {
            self.builds.fetch_add(1, Ordering::SeqCst);
            let table = OpcodeTable::build();
            log::debug!(
                "opcode metadata initialized ({} defined instructions)",
                table.defined_count()
            );
            table
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.table.get().is_some()
    }

    /// How many times the table has been built. Never exceeds 1.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

static GLOBAL_OPCODES: OpcodeTableCell = OpcodeTableCell::new();

/// The process-wide opcode table.
pub fn global() -> &'static OpcodeTable {
    GLOBAL_OPCODES.get()
}

/// The process-wide cell, for callers that want to check its state.
pub fn global_cell() -> &'static OpcodeTableCell {
    &GLOBAL_OPCODES
}
