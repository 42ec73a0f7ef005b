// Semantic action vocabulary shared by the grammar and the code generator

use crate::compiler::error::CompilerError;
use std::fmt;
use std::str::FromStr;

macro_rules! actions {
    ($($variant:ident => $name:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Action {
            $($variant,)*
        }

        impl Action {
            pub const ALL: &'static [Action] = &[$(Action::$variant,)*];

            pub fn name(&self) -> &'static str {
                match self {
                    $(Action::$variant => $name,)*
                }
            }
        }

        impl FromStr for Action {
            type Err = CompilerError;

            /// Accepts grammar-table spellings with or without the leading `#`.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.strip_prefix('#').unwrap_or(s) {
                    $($name => Ok(Action::$variant),)*
                    other => Err(CompilerError::UnknownAction(other.to_string())),
                }
            }
        }
    };
}

actions! {
    // Program
    BeginProgram => "begin_program",
    EndProgram => "end_program",

    // Declarations
    PushType => "push_type",
    PushName => "push_name",
    DeclareVariable => "declare_variable",
    DeclareArray => "declare_array",
    DeclareFunction => "declare_function",
    AddParameter => "add_parameter",
    AddArrayParameter => "add_array_parameter",
    ScopeUp => "scope_up",
    ScopeDown => "scope_down",

    // Expressions
    PushIdentifier => "push_identifier",
    PushNumber => "push_number",
    PushOperator => "push_operator",
    ComputeBinary => "compute_binary",
    Assign => "assign",
    IndexArray => "index_array",
    PopExpression => "pop_expression",

    // Control flow
    ReserveJumpSlot => "reserve_jump_slot",
    EmitCondJumpAndReserveNext => "emit_cond_jump_and_reserve_next",
    PatchJumpToHere => "patch_jump_to_here",
    PatchCondJumpToHere => "patch_cond_jump_to_here",
    LabelHere => "label_here",
    JumpBackIfFalse => "jump_back_if_false",

    // Loops
    PushBreakScope => "push_break_scope",
    RegisterBreak => "register_break",
    CloseBreakScope => "close_break_scope",

    // Functions
    BeginFunction => "begin_function",
    EndFunction => "end_function",
    StoreReturnValue => "store_return_value",
    MarkReturn => "mark_return",
    PushArgCount => "push_arg_count",
    IncrementArgCount => "increment_arg_count",
    Call => "call",
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_every_name_parses_back() {
        for action in Action::ALL {
            assert_eq!(action.name().parse::<Action>().unwrap(), *action);
            assert_eq!(action.to_string().parse::<Action>().unwrap(), *action);
        }
    }

    #[test]
    fn test_unknown_action_is_fatal() {
        let err = "jpf_save".parse::<Action>().unwrap_err();
        assert_eq!(err, CompilerError::UnknownAction("jpf_save".to_string()));
    }
}
