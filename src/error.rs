use thiserror::Error;

/// The primary error type for the `mathjit` crate.
///
/// Parse and compile errors carry the character offset into the original
/// expression text at which the problem was detected. A failed
/// [`assign_expression`](crate::Evaluator::assign_expression) never disturbs
/// the previously installed callable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The expression contained no tokens after trimming whitespace.
    #[error("empty expression")]
    EmptyExpression,
    /// A character that is not permitted in the current parse state.
    #[error("unexpected character at offset {position}")]
    UnexpectedChar { position: usize },
    /// The input ended while an expression or an argument list was incomplete.
    #[error("unexpected end of expression at offset {position}")]
    UnexpectedEnd { position: usize },
    /// A closing parenthesis without a matching opener, or vice versa.
    #[error("unbalanced parenthesis at offset {position}")]
    UnbalancedParen { position: usize },
    /// A function was applied to the wrong number of arguments.
    #[error("{name} expects {expected} argument(s), got {got} (offset {position})")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
        position: usize,
    },
    /// An identifier that resolves to no constant, variable or function.
    #[error("{name} is not a known constant, variable or function name (offset {position})")]
    UnknownName { name: String, position: usize },
    /// The name passed to `bind` is already taken by a variable, a named
    /// constant or a catalog operation.
    #[error("\"{name}\" is already bound or names a built-in")]
    BindNameConflict { name: String },
    /// The name passed to `unbind` is not a bound variable.
    #[error("no variable named \"{name}\" is bound")]
    UnbindUnknown { name: String },
    /// Emitting the expression would exceed the 8-slot FPU register stack.
    #[error("expression exceeds the FPU stack limit")]
    StackOverflow,
    /// Acquiring or protection-switching executable memory failed.
    #[error("executable memory allocation failed")]
    AllocationFailed,
}

impl EvalError {
    /// The character offset associated with this error, where one exists.
    pub fn position(&self) -> Option<usize> {
        match self {
            EvalError::UnexpectedChar { position }
            | EvalError::UnexpectedEnd { position }
            | EvalError::UnbalancedParen { position }
            | EvalError::ArityMismatch { position, .. }
            | EvalError::UnknownName { position, .. } => Some(*position),
            _ => None,
        }
    }
}
