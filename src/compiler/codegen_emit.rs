/// codegen_emit.rs
/// Instruction store for single-pass code generation
///
/// Instructions live in absolutely addressed program-counter slots. A slot can
/// be reserved before its contents are known; the returned `Placeholder` is the
/// only way to fill it, and `patch` consumes it, so a slot is written at most
/// once. Slots still reserved when the listing is requested are reported as an
/// internal error.
use crate::compiler::error::CompilerError;
use crate::compiler::instruction::Instruction;
use indexmap::IndexSet;

/// Handle to a reserved, not yet written instruction slot
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reserved slot must be patched exactly once"]
pub struct Placeholder {
    pc: usize,
}

impl Placeholder {
    pub fn pc(&self) -> usize {
        self.pc
    }
}

#[derive(Debug, Default)]
pub struct InstructionStore {
    slots: Vec<Option<Instruction>>,
    pc: usize,
    pending: IndexSet<usize>,
}

impl InstructionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next free program counter
    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Write `instr` at the next free slot and return its program counter
    pub fn emit(&mut self, instr: Instruction) -> usize {
        let pc = self.pc;
        self.ensure_capacity(pc + 1);
        log::debug!("EMIT {:>4}\t{}", pc, instr);
        self.slots[pc] = Some(instr);
        self.pc += 1;
        pc
    }

    /// Skip one slot, to be filled later through the returned placeholder
    pub fn reserve(&mut self) -> Placeholder {
        let pc = self.pc;
        self.ensure_capacity(pc + 1);
        self.pc += 1;
        self.pending.insert(pc);
        log::debug!("RESERVE {:>4}", pc);
        Placeholder { pc }
    }

    pub fn patch(&mut self, placeholder: Placeholder, instr: Instruction) -> Result<(), CompilerError> {
        let pc = placeholder.pc;
        if !self.pending.shift_remove(&pc) {
            return Err(CompilerError::internal(format!(
                "slot {} patched but it was never reserved or was already patched",
                pc
            )));
        }
        log::debug!("PATCH {:>4}\t{}", pc, instr);
        self.slots[pc] = Some(instr);
        Ok(())
    }

    /// Slots reserved but not yet patched
    pub fn pending(&self) -> impl Iterator<Item = usize> + '_ {
        self.pending.iter().copied()
    }

    pub fn get(&self, pc: usize) -> Option<&Instruction> {
        self.slots.get(pc).and_then(|slot| slot.as_ref())
    }

    /// The finished program. Fails while any reserved slot is still empty.
    pub fn instructions(&self) -> Result<Vec<Instruction>, CompilerError> {
        if let Some(pc) = self.pending.first() {
            return Err(CompilerError::internal(format!(
                "slot {} was reserved but never patched",
                pc
            )));
        }
        self.slots
            .iter()
            .enumerate()
            .map(|(pc, slot)| {
                (*slot).ok_or_else(|| CompilerError::internal(format!("slot {} is empty", pc)))
            })
            .collect()
    }

    fn ensure_capacity(&mut self, len: usize) {
        if self.slots.len() < len {
            self.slots.resize(len, None);
        }
    }
}
