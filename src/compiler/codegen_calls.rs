// Functions: declaration, prologue/epilogue, return and call sites
//
// Calling convention (offsets from the callee's frame base):
//   caller  writes argument i to SP+16+4i, the return address to SP+4, jumps
//   callee  saves SP into PSP and CF into PCF, sets CF := SP, then advances
//           SP past its frame (patched once the frame size is final)
//   return  restores SP and CF from the header and jumps through RA
//   caller  copies a non-void result out of RV (@SP) into a temporary

use crate::compiler::activation::{HEADER_SIZE, PCF_OFFSET, PSP_OFFSET, RA_OFFSET, RV_OFFSET};
use crate::compiler::codegen::{CodeGenerator, FrameSummary, FunctionContext, SemanticValue};
use crate::compiler::config::WORD_SIZE;
use crate::compiler::error::CompilerError;
use crate::compiler::instruction::{Instruction, Operand};
use crate::compiler::lexer::Token;
use crate::compiler::semantic::{Symbol, SymbolType, OUTPUT_FUNCTION};

impl CodeGenerator {
    pub(crate) fn declare_function(&mut self, token: &Token) -> Result<(), CompilerError> {
        let name = self.pop_name()?;
        let return_type = self.pop_type()?;
        if self.function.is_some() {
            return Err(CompilerError::internal(format!(
                "function '{}' declared inside another function",
                name
            )));
        }
        let entry = self.store.pc();
        if let Err(err) = self.symbols.install_function(&name, return_type, entry) {
            self.record_symbol_error(err, token.line)?;
        }
        log::debug!("FUNCTION: {} {} at pc {}", return_type, name, entry);
        self.function = Some(FunctionContext {
            name,
            prologue_slot: None,
            returns: Vec::new(),
        });
        Ok(())
    }

    /// Prologue: save the caller's SP and CF in the new frame's header and
    /// make the frame current. The SP advance is reserved for `end_function`.
    pub(crate) fn begin_function(&mut self) -> Result<(), CompilerError> {
        if self.function.is_none() {
            return Err(CompilerError::internal("begin_function with no declared function"));
        }
        let sp = self.config.stack_pointer;
        let fp = self.config.frame_pointer;

        let saved_sp = self.field_operand(sp, PSP_OFFSET)?;
        self.store.emit(Instruction::assign(Operand::Direct(sp), saved_sp));
        let saved_fp = self.field_operand(sp, PCF_OFFSET)?;
        self.store.emit(Instruction::assign(Operand::Direct(fp), saved_fp));
        self.store
            .emit(Instruction::assign(Operand::Direct(sp), Operand::Direct(fp)));
        let slot = self.store.reserve();

        if let Some(context) = self.function.as_mut() {
            context.prologue_slot = Some(slot);
        }
        Ok(())
    }

    pub(crate) fn end_function(&mut self) -> Result<(), CompilerError> {
        let context = self
            .function
            .take()
            .ok_or_else(|| CompilerError::internal("end_function with no open function"))?;
        let closed = self.symbols.end_function()?;
        let prologue = context.prologue_slot.ok_or_else(|| {
            CompilerError::internal(format!("function '{}' has no prologue", context.name))
        })?;

        let sp = self.config.stack_pointer;
        let fp = self.config.frame_pointer;
        let len = closed.record.len();
        self.store.patch(
            prologue,
            Instruction::add(
                Operand::Direct(sp),
                Operand::Immediate(len as i32),
                Operand::Direct(sp),
            ),
        )?;

        let epilogue = self.store.pc();
        for slot in context.returns {
            self.store.patch(slot, Instruction::jp(epilogue))?;
        }

        let saved_sp = self.field_operand(fp, PSP_OFFSET)?;
        self.store.emit(Instruction::assign(saved_sp, Operand::Direct(sp)));
        let saved_fp = self.field_operand(fp, PCF_OFFSET)?;
        self.store.emit(Instruction::assign(saved_fp, Operand::Direct(fp)));
        // SP is the frame base again; fetch RA into the scratch cell and jump
        // through it
        let scratch = self.scratch.take()?;
        self.store.emit(Instruction::add(
            Operand::Direct(sp),
            Operand::Immediate(RA_OFFSET as i32),
            Operand::Direct(scratch),
        ));
        self.store.emit(Instruction::assign(
            Operand::Indirect(scratch),
            Operand::Direct(scratch),
        ));
        self.store
            .emit(Instruction::jp_indirect(Operand::Indirect(scratch)));

        let summary = FrameSummary {
            name: closed.name,
            entry: closed.entry,
            params: closed.params,
            frame_size: closed.record.frame_size(),
            len,
        };
        log::info!("Frame: {}", summary);
        self.frames.push(summary);
        Ok(())
    }

    /// `return expr;`: write the value into the frame's RV field
    pub(crate) fn store_return_value(&mut self, token: &Token) -> Result<(), CompilerError> {
        let value = self.pop_symbol()?;
        if !self.check_int_operands(&[&value], token.line) {
            return Ok(());
        }
        let source = self.checked_operand(&value)?;
        let rv = self.field_operand(self.config.frame_pointer, RV_OFFSET)?;
        self.store.emit(Instruction::assign(source, rv));
        Ok(())
    }

    pub(crate) fn mark_return(&mut self) -> Result<(), CompilerError> {
        let context = self
            .function
            .as_mut()
            .ok_or_else(|| CompilerError::internal("return outside of a function"))?;
        let slot = self.store.reserve();
        context.returns.push(slot);
        Ok(())
    }

    fn expected_kind(parameter: SymbolType) -> &'static str {
        if parameter.is_reference() {
            "array"
        } else {
            "int"
        }
    }

    fn argument_matches(parameter: SymbolType, argument: &Symbol) -> bool {
        if argument.is_placeholder {
            return true;
        }
        if argument.is_function {
            return false;
        }
        if parameter.is_reference() {
            argument.symbol_type.is_reference()
        } else {
            argument.symbol_type.is_scalar()
        }
    }

    /// Check a call against the callee's parameter list. Records at most one
    /// diagnostic; returns false if the call cannot be emitted.
    fn check_arguments(&mut self, callee: &Symbol, args: &[Symbol], line: usize) -> bool {
        let params = callee.args.clone().unwrap_or_default();
        if params.len() != args.len() {
            self.record_error(
                line,
                format!("Mismatch in numbers of arguments of '{}'.", callee.name),
            );
            return false;
        }
        for (index, (parameter, argument)) in params.iter().zip(args).enumerate() {
            if !Self::argument_matches(*parameter, argument) {
                self.record_error(
                    line,
                    format!(
                        "Mismatch in type of argument {} of '{}'. Expected {} but got {} instead.",
                        index + 1,
                        callee.name,
                        Self::expected_kind(*parameter),
                        argument.describe()
                    ),
                );
                return false;
            }
        }
        true
    }

    pub(crate) fn call(&mut self, token: &Token) -> Result<(), CompilerError> {
        let count = self
            .arg_counts
            .pop()
            .ok_or_else(|| CompilerError::internal("call without push_arg_count"))?;
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            args.push(self.pop_symbol()?);
        }
        args.reverse();
        let target = self.pop_symbol()?;

        if target.is_placeholder {
            self.push(SemanticValue::Symbol(Symbol::placeholder(&target.name)));
            return Ok(());
        }
        if !target.is_function {
            self.record_error(token.line, format!("'{}' is not a function.", target.name));
            self.push(SemanticValue::Symbol(Symbol::placeholder(&target.name)));
            return Ok(());
        }
        let callee = self
            .symbols
            .resolve_by_address(target.value)
            .unwrap_or(target);

        if !self.check_arguments(&callee, &args, token.line) {
            self.push(SemanticValue::Symbol(Symbol::placeholder(&callee.name)));
            return Ok(());
        }

        if callee.name == OUTPUT_FUNCTION {
            let value = self.checked_operand(&args[0])?;
            self.store.emit(Instruction::print(value));
            self.push(SemanticValue::Symbol(Symbol::void_result(&callee.name)));
            return Ok(());
        }

        let sp = self.config.stack_pointer;
        let params = callee.args.clone().unwrap_or_default();
        for (index, (parameter, argument)) in params.iter().zip(&args).enumerate() {
            self.scratch.reset();
            let value = if parameter.is_reference() && !argument.is_placeholder {
                self.resolve_reference(argument)?
                    .map_or(Operand::Immediate(0), |r| r.operand)
            } else {
                self.checked_operand(argument)?
            };
            let offset = HEADER_SIZE + index as u32 * WORD_SIZE;
            let slot = self.field_operand(sp, offset)?;
            self.store.emit(Instruction::assign(value, slot));
        }

        self.scratch.reset();
        let ra = self.field_operand(sp, RA_OFFSET)?;
        // The return address is the instruction after the jump
        let return_pc = self.store.pc() + 2;
        self.store
            .emit(Instruction::assign(Operand::Immediate(return_pc as i32), ra));
        self.store.emit(Instruction::jp(callee.address() as usize));
        log::debug!(
            "CALL: {} with {} argument(s), returns to {}",
            callee.name,
            args.len(),
            return_pc
        );

        if callee.symbol_type == SymbolType::Void {
            self.push(SemanticValue::Symbol(Symbol::void_result(&callee.name)));
            return Ok(());
        }
        self.scratch.reset();
        let result = self.symbols.new_temporary(false)?;
        let dst = self.checked_operand(&result)?;
        self.store
            .emit(Instruction::assign(Operand::Indirect(sp), dst));
        self.push(SemanticValue::Symbol(result));
        Ok(())
    }
}
