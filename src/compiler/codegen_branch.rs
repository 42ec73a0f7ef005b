// Control flow: if/else, repeat-until and break
//
// Forward jumps are emitted as reserved slots and patched once their target
// is known. The condition of a conditional jump is resolved when its slot is
// reserved, so any address arithmetic it needs sits right before the slot.

use crate::compiler::codegen::{CodeGenerator, SemanticValue};
use crate::compiler::error::CompilerError;
use crate::compiler::instruction::{Instruction, Operand};
use crate::compiler::lexer::Token;

impl CodeGenerator {
    /// Resolve a condition value, reporting non-int conditions
    fn condition_operand(&mut self, token: &Token) -> Result<Operand, CompilerError> {
        let cond = self.pop_symbol()?;
        if !self.check_int_operands(&[&cond], token.line) {
            return Ok(Operand::Immediate(0));
        }
        self.checked_operand(&cond)
    }

    /// `if (cond)`: reserve the slot of the jump over the then-branch
    pub(crate) fn reserve_jump_slot(&mut self, token: &Token) -> Result<(), CompilerError> {
        let cond = self.condition_operand(token)?;
        let slot = self.store.reserve();
        log::debug!("BRANCH: reserved slot {} for condition {}", slot.pc(), cond);
        self.push(SemanticValue::Branch { slot, cond });
        Ok(())
    }

    /// `else`: the then-branch ends with a jump over the else-branch, and a
    /// false condition lands right after that jump
    pub(crate) fn emit_cond_jump_and_reserve_next(&mut self) -> Result<(), CompilerError> {
        let (slot, cond) = self.pop_branch()?;
        let skip_else = self.store.reserve();
        let else_start = self.store.pc();
        self.store.patch(slot, Instruction::jpf(cond, else_start))?;
        self.push(SemanticValue::Slot(skip_else));
        Ok(())
    }

    pub(crate) fn patch_jump_to_here(&mut self) -> Result<(), CompilerError> {
        let slot = self.pop_slot()?;
        let here = self.store.pc();
        self.store.patch(slot, Instruction::jp(here))
    }

    /// `if` without `else`
    pub(crate) fn patch_cond_jump_to_here(&mut self) -> Result<(), CompilerError> {
        let (slot, cond) = self.pop_branch()?;
        let here = self.store.pc();
        self.store.patch(slot, Instruction::jpf(cond, here))
    }

    /// `until (cond)`: loop back to the label while the condition is false
    pub(crate) fn jump_back_if_false(&mut self, token: &Token) -> Result<(), CompilerError> {
        let cond = self.condition_operand(token)?;
        let label = self.pop_label()?;
        self.store.emit(Instruction::jpf(cond, label));
        Ok(())
    }

    pub(crate) fn register_break(&mut self, token: &Token) -> Result<(), CompilerError> {
        if self.break_scopes.is_empty() {
            self.record_error(token.line, "No 'repeat ... until' found for 'break'.");
            return Ok(());
        }
        let slot = self.store.reserve();
        if let Some(scope) = self.break_scopes.last_mut() {
            scope.push(slot);
        }
        Ok(())
    }

    /// End of a `repeat` loop: every `break` in it jumps here
    pub(crate) fn close_break_scope(&mut self) -> Result<(), CompilerError> {
        let breaks = self
            .break_scopes
            .pop()
            .ok_or_else(|| CompilerError::internal("close_break_scope without push_break_scope"))?;
        let here = self.store.pc();
        log::debug!("BRANCH: {} break(s) exit to {}", breaks.len(), here);
        for slot in breaks {
            self.store.patch(slot, Instruction::jp(here))?;
        }
        Ok(())
    }
}
