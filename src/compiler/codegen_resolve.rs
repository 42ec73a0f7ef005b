/// codegen_resolve.rs - Operand resolution ("address realization")
///
/// Turns a resolved symbol into a machine operand. Frame-relative symbols only
/// know their offset inside the activation record, so their address is built
/// at run time into a scratch cell and the operand reads through it.
///
/// Scratch cells come from a small fixed pool that is reset before every
/// semantic action; they never hold a value across actions.
use crate::compiler::codegen::CodeGenerator;
use crate::compiler::config::{CompilerConfig, WORD_SIZE};
use crate::compiler::error::CompilerError;
use crate::compiler::instruction::{Instruction, Operand};
use crate::compiler::semantic::{Symbol, SymbolType};

#[derive(Debug, Clone)]
pub struct ScratchPool {
    base: u32,
    slots: u32,
    next: u32,
}

impl ScratchPool {
    pub fn new(config: &CompilerConfig) -> Self {
        ScratchPool {
            base: config.scratch_base,
            slots: config.scratch_slots,
            next: 0,
        }
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }

    pub fn take(&mut self) -> Result<u32, CompilerError> {
        if self.next >= self.slots {
            return Err(CompilerError::internal(format!(
                "scratch pool exhausted ({} cells) within one action",
                self.slots
            )));
        }
        let addr = self.base + self.next * WORD_SIZE;
        self.next += 1;
        Ok(addr)
    }

    pub fn in_use(&self) -> u32 {
        self.next
    }
}

/// Operand plus the number of helper instructions emitted to build it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub operand: Operand,
    pub emitted: usize,
}

impl CodeGenerator {
    /// `@cell + offset`, i.e. the word at `offset` past the address held in
    /// `cell`. Emits one ADD unless the offset is zero.
    pub(crate) fn field_operand(&mut self, cell: u32, offset: u32) -> Result<Operand, CompilerError> {
        if offset == 0 {
            return Ok(Operand::Indirect(cell));
        }
        let scratch = self.scratch.take()?;
        self.store.emit(Instruction::add(
            Operand::Direct(cell),
            Operand::Immediate(offset as i32),
            Operand::Direct(scratch),
        ));
        Ok(Operand::Indirect(scratch))
    }

    /// Operand naming the storage cell of a non-constant symbol
    pub(crate) fn cell_operand(&mut self, symbol: &Symbol) -> Result<Operand, CompilerError> {
        if symbol.is_global {
            Ok(Operand::Direct(symbol.address()))
        } else {
            self.field_operand(self.config.frame_pointer, symbol.address())
        }
    }

    /// Resolve a scalar symbol. `Ok(None)` means the symbol cannot be used as
    /// an int value (array, function, void); the caller reports it.
    pub fn resolve_operand(&mut self, symbol: &Symbol) -> Result<Option<Resolved>, CompilerError> {
        let before = self.store.pc();
        if symbol.is_function || !symbol.symbol_type.is_scalar() {
            return Ok(None);
        }
        let operand = if symbol.is_constant {
            Operand::Immediate(symbol.value)
        } else if symbol.symbol_type == SymbolType::Indexed {
            // The cell holds the element's address: fetch it, then read through it
            match self.cell_operand(symbol)? {
                Operand::Indirect(scratch) => {
                    self.store.emit(Instruction::assign(
                        Operand::Indirect(scratch),
                        Operand::Direct(scratch),
                    ));
                    Operand::Indirect(scratch)
                }
                Operand::Direct(addr) => Operand::Indirect(addr),
                Operand::Immediate(_) => {
                    return Err(CompilerError::internal("indexed temporary without storage"))
                }
            }
        } else {
            self.cell_operand(symbol)?
        };
        let resolved = Resolved {
            operand,
            emitted: self.store.pc() - before,
        };
        log::trace!(
            "RESOLVE {} ({:?}) -> {} [{} instr]",
            symbol.name,
            symbol.symbol_type,
            resolved.operand,
            resolved.emitted
        );
        Ok(Some(resolved))
    }

    /// Operand whose value is the base address of an array or the address
    /// held by a by-reference parameter. `Ok(None)` for scalars and functions.
    pub fn resolve_reference(&mut self, symbol: &Symbol) -> Result<Option<Resolved>, CompilerError> {
        let before = self.store.pc();
        if symbol.is_function || !symbol.symbol_type.is_reference() {
            return Ok(None);
        }
        let operand = match symbol.symbol_type {
            SymbolType::ArrayInt | SymbolType::ArrayVoid => {
                if symbol.is_global {
                    Operand::Immediate(symbol.value)
                } else {
                    let scratch = self.scratch.take()?;
                    self.store.emit(Instruction::add(
                        Operand::Direct(self.config.frame_pointer),
                        Operand::Immediate(symbol.value),
                        Operand::Direct(scratch),
                    ));
                    Operand::Direct(scratch)
                }
            }
            // The parameter cell already holds the caller's base address
            _ => self.cell_operand(symbol)?,
        };
        let resolved = Resolved {
            operand,
            emitted: self.store.pc() - before,
        };
        log::trace!(
            "RESOLVE_REF {} ({:?}) -> {} [{} instr]",
            symbol.name,
            symbol.symbol_type,
            resolved.operand,
            resolved.emitted
        );
        Ok(Some(resolved))
    }

    /// Resolve an operand that has already been type checked, or whose
    /// failure has already been reported: anything unresolvable reads as `#0`.
    pub(crate) fn checked_operand(&mut self, symbol: &Symbol) -> Result<Operand, CompilerError> {
        Ok(self
            .resolve_operand(symbol)?
            .map_or(Operand::Immediate(0), |r| r.operand))
    }
}
