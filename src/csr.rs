//! Directed CSR test generation.
//!
//! Reads a processor's CSR description and writes assembly programs that
//! exercise every CSR with each `csrr*` instruction, checking each result
//! against a reference model of the register's writable fields.

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use rand::{seq::index, Rng, RngCore};
use serde::Deserialize;

use crate::{
    config::load_yaml,
    errors::{RegressError, Result},
};

/// Instructions exercised on every CSR, in emission order.
pub const CSR_OPS: [CsrOp; 6] = [
    CsrOp::Csrrw,
    CsrOp::Csrrs,
    CsrOp::Csrrc,
    CsrOp::Csrrwi,
    CsrOp::Csrrsi,
    CsrOp::Csrrci,
];

/// Field type whose bits are reserved and never written.
const WPRI: &str = "WPRI";

/// Scratch registers available for the source/destination pair. Limited to
/// x5..x14 so the tests also run on RV32E.
const SCRATCH_REGS: std::ops::Range<usize> = 5..15;

// ============================================================================
// DESCRIPTION
// ============================================================================

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CsrField {
    #[serde(default)]
    pub field_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub reset_val: u128,
    pub msb: u32,
    pub lsb: u32,
}

/// One entry of the CSR description file. Field layouts are keyed by
/// `rv32`, `rv64`, ...
#[derive(Debug, Clone, Deserialize)]
pub struct CsrDescription {
    pub csr: String,
    #[serde(flatten)]
    pub layouts: std::collections::BTreeMap<String, serde_yaml::Value>,
}

pub fn load_descriptions(path: &Path) -> Result<Vec<CsrDescription>> {
    load_yaml(path)
}

// ============================================================================
// REFERENCE MODEL
// ============================================================================

/// Writable view of one CSR: its current value and the mask of bits that
/// software can read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsrModel {
    pub value: u128,
    pub mask: u128,
}

impl CsrModel {
    pub fn read(&self) -> u128 {
        self.value & self.mask
    }

    pub fn write(&mut self, new: u128) {
        self.value = (self.value & !self.mask) | (new & self.mask);
    }

    /// Executes `op` with source operand `rs1` (already reduced to the
    /// zero-extended immediate for the `*i` forms) and returns the value
    /// the destination register receives.
    pub fn apply(&mut self, op: CsrOp, rs1: u128, xlen: Xlen) -> u128 {
        let old = self.read();
        let new = match op {
            CsrOp::Csrrw | CsrOp::Csrrwi => rs1,
            CsrOp::Csrrs | CsrOp::Csrrsi => rs1 | old,
            CsrOp::Csrrc | CsrOp::Csrrci => !rs1 & old,
        };
        self.write(new & xlen.mask());
        old
    }
}

/// Supported register widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Xlen {
    Rv32,
    Rv64,
    Rv128,
}

impl Xlen {
    pub fn bits(&self) -> u32 {
        match self {
            Xlen::Rv32 => 32,
            Xlen::Rv64 => 64,
            Xlen::Rv128 => 128,
        }
    }

    pub fn mask(&self) -> u128 {
        match self {
            Xlen::Rv128 => u128::MAX,
            _ => (1u128 << self.bits()) - 1,
        }
    }

    /// Key of the field layout for this width in the description file.
    pub fn key(&self) -> String {
        format!("rv{}", self.bits())
    }

    fn hex(&self, value: u128) -> String {
        let digits = (self.bits() / 4) as usize;
        format!("0x{:0digits$x}", value & self.mask())
    }
}

impl TryFrom<u32> for Xlen {
    type Error = u32;

    fn try_from(bits: u32) -> std::result::Result<Self, u32> {
        match bits {
            32 => Ok(Xlen::Rv32),
            64 => Ok(Xlen::Rv64),
            128 => Ok(Xlen::Rv128),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrOp {
    Csrrw,
    Csrrs,
    Csrrc,
    Csrrwi,
    Csrrsi,
    Csrrci,
}

impl CsrOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            CsrOp::Csrrw => "csrrw",
            CsrOp::Csrrs => "csrrs",
            CsrOp::Csrrc => "csrrc",
            CsrOp::Csrrwi => "csrrwi",
            CsrOp::Csrrsi => "csrrsi",
            CsrOp::Csrrci => "csrrci",
        }
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self, CsrOp::Csrrwi | CsrOp::Csrrsi | CsrOp::Csrrci)
    }
}

/// Builds the reset-state model of every CSR for the given width.
pub fn build_models(descriptions: &[CsrDescription], xlen: Xlen) -> Result<Vec<(String, CsrModel)>> {
    let key = xlen.key();
    let mut models = Vec::with_capacity(descriptions.len());
    for desc in descriptions {
        let invalid = |reason: String| RegressError::InvalidCsrDescription {
            csr: desc.csr.clone(),
            reason,
        };
        let layout = desc
            .layouts
            .get(&key)
            .ok_or_else(|| invalid(format!("no `{key}` field layout")))?;
        let fields: Vec<CsrField> = serde_yaml::from_value(layout.clone())
            .map_err(|e| invalid(format!("malformed `{key}` fields: {e}")))?;

        let mut model = CsrModel { value: 0, mask: 0 };
        for field in &fields {
            if field.msb < field.lsb || field.msb >= xlen.bits() {
                return Err(invalid(format!(
                    "field `{}` has invalid bit range [{}:{}]",
                    field.field_name, field.msb, field.lsb
                )));
            }
            if field.kind == WPRI {
                continue;
            }
            let width = field.msb - field.lsb + 1;
            let field_mask = if width == 128 {
                u128::MAX
            } else {
                (1u128 << width) - 1
            };
            if field.reset_val & !field_mask != 0 {
                return Err(invalid(format!(
                    "reset value {:#x} does not fit field `{}`",
                    field.reset_val, field.field_name
                )));
            }
            model.value |= field.reset_val << field.lsb;
            model.mask |= field_mask << field.lsb;
        }
        models.push((desc.csr.clone(), model));
    }
    Ok(models)
}

// ============================================================================
// GENERATION
// ============================================================================

/// The three source operands each instruction is exercised with.
fn rs1_values(xlen: Xlen, rng: &mut impl RngCore) -> [u128; 3] {
    let bytes = (xlen.bits() / 8) as usize;
    let pattern = |byte: u8| (0..bytes).fold(0u128, |acc, _| (acc << 8) | u128::from(byte));
    let random = (u128::from(rng.next_u64()) << 64 | u128::from(rng.next_u64())) & xlen.mask();
    [pattern(0xa5), pattern(0x5a), random]
}

/// Renders one directed test program.
pub fn render_test(
    models: &[(String, CsrModel)],
    xlen: Xlen,
    rng: &mut impl RngCore,
) -> String {
    let regs = index::sample(rng, SCRATCH_REGS.len(), 2);
    let src = format!("x{}", SCRATCH_REGS.start + regs.index(0));
    let dst = format!("x{}", SCRATCH_REGS.start + regs.index(1));

    let mut out = String::from("csr_test:\n");
    let mut models = models.to_vec();
    let last = models.len().saturating_sub(1);
    for (n, (csr, model)) in models.iter_mut().enumerate() {
        for op in CSR_OPS {
            for rs1 in rs1_values(xlen, rng) {
                if op.is_immediate() {
                    let imm = rs1 & 0x1f;
                    let expected = model.apply(op, imm, xlen);
                    let _ = writeln!(out, "\t{} {dst}, {csr}, 0b{imm:05b}", op.mnemonic());
                    let _ = writeln!(out, "\tli {src}, {}", xlen.hex(expected));
                } else {
                    let expected = model.apply(op, rs1, xlen);
                    let _ = writeln!(out, "\tli {src}, {}", xlen.hex(rs1));
                    let _ = writeln!(out, "\t{} {dst}, {csr}, {src}", op.mnemonic());
                    let _ = writeln!(out, "\tli {src}, {}", xlen.hex(expected));
                }
                let _ = writeln!(out, "\tbne {src}, {dst}, csr_fail");
            }
        }
        if n == last {
            // The last write has not been read back yet.
            let _ = writeln!(out, "\tcsrr {dst}, {csr}");
            let _ = writeln!(out, "\tli {src}, {}", xlen.hex(model.read()));
            let _ = writeln!(out, "\tbne {src}, {dst}, csr_fail");
        }
    }
    out.push_str("csr_pass:\n\tli gp, 0\n\tj csr_pass\n");
    out.push_str("csr_fail:\n\tli gp, 1\n\tj csr_fail\n");
    out
}

/// Writes `<out>/riscv_csr_test.<i>.S` for `i` in `0..count`, each starting
/// from the reset state.
pub fn generate_tests(
    descriptions: &[CsrDescription],
    xlen: Xlen,
    count: u32,
    out_dir: &Path,
    rng: &mut impl Rng,
) -> Result<Vec<PathBuf>> {
    let models = build_models(descriptions, xlen)?;
    fs::create_dir_all(out_dir)
        .map_err(|e| RegressError::io(format!("failed to create {}", out_dir.display()), e))?;

    let mut written = Vec::with_capacity(count as usize);
    for i in 0..count {
        let path = out_dir.join(format!("riscv_csr_test.{i}.S"));
        let program = render_test(&models, xlen, rng);
        fs::write(&path, program)
            .map_err(|e| RegressError::io(format!("failed to write {}", path.display()), e))?;
        tracing::info!(file = %path.display(), "generated CSR test");
        written.push(path);
    }
    Ok(written)
}
