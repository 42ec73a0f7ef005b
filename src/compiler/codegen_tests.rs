// Code Generation Tests for the C-minus compiler

use crate::compiler::actions::Action;
use crate::compiler::codegen::{CodeGenerator, SemanticValue, NO_CODE_MESSAGE};
use crate::compiler::error::CompilerError;
use crate::compiler::instruction::{Instruction, Op, Operand};
use crate::compiler::lexer::{Lexer, Token, TokenKind};
use crate::compiler::parser::Parser;
use crate::compiler::semantic::SymbolType;
use test_log::test;

fn generate(source: &str) -> CodeGenerator {
    let tokens = Lexer::new(source).tokenize().unwrap();
    let mut gen = CodeGenerator::default();
    Parser::new(tokens, &mut gen).parse().unwrap();
    gen
}

fn at(gen: &CodeGenerator, pc: usize) -> Instruction {
    *gen.store.get(pc).unwrap()
}

fn token(lexeme: &str, kind: TokenKind) -> Token {
    Token::new(lexeme, kind, 1)
}

const GLOBAL_ASSIGNMENT: &str = "int x;\nvoid main(void) {\n  x = 2 + 3 * 4;\n}\n";

#[test]
fn test_global_assignment_listing() {
    let gen = generate(GLOBAL_ASSIGNMENT);
    assert!(!gen.has_errors());
    let expected = [
        "0\t(JP, 21, , )",
        // prologue of main
        "1\t(ADD, 204, #8, 208)",
        "2\t(ASSIGN, 204, @208, )",
        "3\t(ADD, 204, #12, 212)",
        "4\t(ASSIGN, 200, @212, )",
        "5\t(ASSIGN, 204, 200, )",
        "6\t(ADD, 204, #24, 204)",
        // t0 = 3 * 4
        "7\t(ADD, 200, #16, 208)",
        "8\t(MUL, #3, #4, @208)",
        // t1 = 2 + t0
        "9\t(ADD, 200, #16, 208)",
        "10\t(ADD, 200, #20, 212)",
        "11\t(ADD, #2, @208, @212)",
        // x = t1
        "12\t(ADD, 200, #20, 208)",
        "13\t(ASSIGN, @208, 224, )",
        // epilogue
        "14\t(ADD, 200, #8, 208)",
        "15\t(ASSIGN, @208, 204, )",
        "16\t(ADD, 200, #12, 212)",
        "17\t(ASSIGN, @212, 200, )",
        "18\t(ADD, 204, #4, 216)",
        "19\t(ASSIGN, @216, 216, )",
        "20\t(JP, @216, , )",
        // start-up stub
        "21\t(ASSIGN, #228, 204, )",
        "22\t(ASSIGN, #228, 200, )",
        "23\t(ADD, 204, #4, 208)",
        "24\t(ASSIGN, #26, @208, )",
        "25\t(JP, 1, , )",
    ];
    let listing = gen.listing().unwrap();
    assert_eq!(listing.lines().collect::<Vec<_>>(), expected);
    assert_eq!(gen.stack_depth(), 0);
}

#[test]
fn test_global_resolves_identically_everywhere() {
    let gen = generate("int g;\nvoid main(void) { g = 1; g = 2; }\n");
    let stores: Vec<Instruction> = gen
        .instructions()
        .unwrap()
        .into_iter()
        .filter(|i| i.op == Op::Assign && i.b == Some(Operand::Direct(224)))
        .collect();
    assert_eq!(stores.len(), 2);
    assert_eq!(stores[0].a, Some(Operand::Immediate(1)));
    assert_eq!(stores[1].a, Some(Operand::Immediate(2)));
}

#[test]
fn test_if_else_backpatching() {
    let gen = generate("void main(void) {\n int a;\n if (a) a = 1; else a = 2;\n}\n");
    // condition address computed right before the reserved slot
    assert_eq!(
        at(&gen, 7),
        Instruction::add(Operand::Direct(200), Operand::Immediate(16), Operand::Direct(208))
    );
    assert_eq!(at(&gen, 8), Instruction::jpf(Operand::Indirect(208), 12));
    assert_eq!(
        at(&gen, 10),
        Instruction::assign(Operand::Immediate(1), Operand::Indirect(208))
    );
    assert_eq!(at(&gen, 11), Instruction::jp(14));
    assert_eq!(
        at(&gen, 13),
        Instruction::assign(Operand::Immediate(2), Operand::Indirect(208))
    );
}

#[test]
fn test_if_without_else() {
    let gen = generate("int g;\nvoid main(void) { if (g) g = 5; g = 6; }\n");
    // JPF slot sits right after the prologue, condition is the global itself
    assert_eq!(at(&gen, 7), Instruction::jpf(Operand::Direct(224), 9));
    assert_eq!(
        at(&gen, 8),
        Instruction::assign(Operand::Immediate(5), Operand::Direct(224))
    );
    assert_eq!(
        at(&gen, 9),
        Instruction::assign(Operand::Immediate(6), Operand::Direct(224))
    );
}

#[test]
fn test_repeat_until_with_break() {
    let gen = generate(
        "void main(void) {\n int i;\n repeat {\n  i = i + 1;\n  if (i == 3) break;\n } until (i == 5)\n}\n",
    );
    assert!(!gen.has_errors());
    // loop body starts at the label
    assert_eq!(
        at(&gen, 7),
        Instruction::add(Operand::Direct(200), Operand::Immediate(16), Operand::Direct(208))
    );
    assert_eq!(at(&gen, 15).op, Op::Eq);
    assert_eq!(at(&gen, 17), Instruction::jpf(Operand::Indirect(208), 19));
    // break leaves the loop
    assert_eq!(at(&gen, 18), Instruction::jp(24));
    assert_eq!(at(&gen, 21).op, Op::Eq);
    // until: back to the label while false
    assert_eq!(at(&gen, 23), Instruction::jpf(Operand::Indirect(208), 7));
}

#[test]
fn test_call_sequence_and_frames() {
    let gen = generate(
        "int f(int a, int b) {\n return a;\n}\nvoid main(void) {\n int r;\n r = f(1, 2);\n}\n",
    );
    assert!(!gen.has_errors());

    // return a: RV is at offset 0, so the frame pointer cell is used directly
    assert_eq!(
        at(&gen, 8),
        Instruction::assign(Operand::Indirect(208), Operand::Indirect(200))
    );
    assert_eq!(at(&gen, 9), Instruction::jp(10));
    assert_eq!(at(&gen, 16), Instruction::jp_indirect(Operand::Indirect(216)));

    // arguments at SP+16 and SP+20
    assert_eq!(
        at(&gen, 23),
        Instruction::add(Operand::Direct(204), Operand::Immediate(16), Operand::Direct(208))
    );
    assert_eq!(
        at(&gen, 24),
        Instruction::assign(Operand::Immediate(1), Operand::Indirect(208))
    );
    assert_eq!(
        at(&gen, 25),
        Instruction::add(Operand::Direct(204), Operand::Immediate(20), Operand::Direct(208))
    );
    assert_eq!(
        at(&gen, 26),
        Instruction::assign(Operand::Immediate(2), Operand::Indirect(208))
    );
    // return address is the instruction after the jump
    assert_eq!(
        at(&gen, 28),
        Instruction::assign(Operand::Immediate(30), Operand::Indirect(208))
    );
    assert_eq!(at(&gen, 29), Instruction::jp(1));
    // result copied out of the callee's RV
    assert_eq!(
        at(&gen, 31),
        Instruction::assign(Operand::Indirect(204), Operand::Indirect(208))
    );

    let frames = gen.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].name, "f");
    assert_eq!(frames[0].entry, 1);
    assert_eq!(frames[0].params, vec![SymbolType::Int, SymbolType::Int]);
    assert_eq!((frames[0].frame_size, frames[0].len), (8, 24));
    assert_eq!(frames[1].name, "main");
    assert_eq!(frames[1].entry, 17);
    assert_eq!((frames[1].frame_size, frames[1].len), (8, 24));
    assert_eq!(at(&gen, 6), Instruction::add(Operand::Direct(204), Operand::Immediate(24), Operand::Direct(204)));
}

#[test]
fn test_output_is_a_single_print() {
    let gen = generate("void main(void) { output(7); }\n");
    assert_eq!(at(&gen, 7), Instruction::print(Operand::Immediate(7)));
    assert_eq!(at(&gen, 8).op, Op::Add); // epilogue starts
}

#[test]
fn test_local_array_indexing() {
    let gen = generate("void main(void) {\n int v[3];\n v[2] = 9;\n}\n");
    // t = 2 * 4 into the temporary after the array (offset 28)
    assert_eq!(
        at(&gen, 7),
        Instruction::add(Operand::Direct(200), Operand::Immediate(28), Operand::Direct(208))
    );
    assert_eq!(
        at(&gen, 8),
        Instruction::mul(Operand::Immediate(2), Operand::Immediate(4), Operand::Indirect(208))
    );
    // base = CF + 16
    assert_eq!(
        at(&gen, 9),
        Instruction::add(Operand::Direct(200), Operand::Immediate(16), Operand::Direct(212))
    );
    assert_eq!(
        at(&gen, 10),
        Instruction::add(Operand::Indirect(208), Operand::Direct(212), Operand::Indirect(208))
    );
    // store through the element address
    assert_eq!(
        at(&gen, 12),
        Instruction::assign(Operand::Indirect(208), Operand::Direct(208))
    );
    assert_eq!(
        at(&gen, 13),
        Instruction::assign(Operand::Immediate(9), Operand::Indirect(208))
    );
}

#[test]
fn test_global_array_base_is_constant() {
    let gen = generate("int v[3];\nvoid main(void) { v[1] = 4; }\n");
    assert_eq!(
        at(&gen, 9),
        Instruction::add(Operand::Indirect(208), Operand::Immediate(224), Operand::Indirect(208))
    );
}

#[test]
fn test_jump_targets_stay_in_bounds() {
    let programs = [
        GLOBAL_ASSIGNMENT,
        "int f(int n) { if (n < 2) return 1; return n * f(n - 1); }\nvoid main(void) { output(f(4)); }\n",
        "void main(void) { int i; repeat { i = i + 1; if (i == 2) break; else ; } until (i == 9) }\n",
    ];
    for source in programs {
        let gen = generate(source);
        let code = gen.instructions().unwrap();
        assert!(!code.is_empty());
        for (pc, instr) in code.iter().enumerate() {
            if let Some(target) = instr.jump_target() {
                assert!(target < code.len(), "jump at {} to {} out of range", pc, target);
            }
        }
    }
}

#[test]
fn test_break_outside_loop_emits_nothing() {
    let with_break = generate("void main(void) {\n\n break;\n}\n");
    let without = generate("void main(void) {\n\n ;\n}\n");
    assert_eq!(with_break.pc(), without.pc());
    assert_eq!(
        with_break.diagnostics(),
        "#3: Semantic Error! No 'repeat ... until' found for 'break'.\n"
    );
    assert_eq!(with_break.listing().unwrap(), NO_CODE_MESSAGE);
}

#[test]
fn test_placeholders_do_not_cascade() {
    let gen = generate("void main(void) {\n int a;\n a = b + c;\n}\n");
    let messages: Vec<&str> = gen.errors().iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["'b' is not defined.", "'c' is not defined."]);
    assert_eq!(gen.stack_depth(), 0);
}

#[test]
fn test_missing_main() {
    let gen = generate("int x;\n");
    assert_eq!(gen.errors().len(), 1);
    assert_eq!(gen.errors()[0].message, "main function not found.");
    // slot 0 is still filled
    assert_eq!(at(&gen, 0), Instruction::jp(1));
}

#[test]
fn test_unknown_action_name_is_fatal() {
    let mut gen = CodeGenerator::default();
    let err = gen
        .apply_named("#save_jump", &token("x", TokenKind::Id))
        .unwrap_err();
    assert_eq!(err, CompilerError::UnknownAction("save_jump".to_string()));
}

#[test]
fn test_action_names_dispatch() {
    let mut gen = CodeGenerator::default();
    gen.apply_named("#begin_program", &token("int", TokenKind::Keyword))
        .unwrap();
    gen.apply_named("push_number", &token("12", TokenKind::Num))
        .unwrap();
    assert_eq!(gen.stack.last(), Some(&SemanticValue::Literal(12)));
}

#[test]
fn test_contract_violations_are_fatal() {
    let mut gen = CodeGenerator::default();
    let semi = token(";", TokenKind::Symbol);
    // empty semantic stack
    assert!(matches!(
        gen.apply(Action::ComputeBinary, &semi),
        Err(CompilerError::Internal(_))
    ));
    // scope_down with no function open
    assert!(gen.apply(Action::ScopeDown, &semi).is_err());
    // wrong value shape on the stack
    gen.apply(Action::PushNumber, &token("1", TokenKind::Num))
        .unwrap();
    assert!(gen.apply(Action::PatchJumpToHere, &semi).is_err());
    // closing a loop that was never opened
    assert!(gen.apply(Action::CloseBreakScope, &semi).is_err());
}

#[test]
fn test_integer_literal_out_of_range() {
    let gen = generate("void main(void) {\n output(99999999999);\n}\n");
    assert_eq!(
        gen.errors()[0].to_string(),
        "#2: Semantic Error! Integer literal '99999999999' is out of range."
    );
}
