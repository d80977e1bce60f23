//! Linearizes an optimized postfix stream into executable x86-64 machine code.
//!
//! The emitted function is nullary and returns a `double`. Arithmetic runs
//! entirely on the x87 FPU; the epilogue spills `st(0)` through a
//! per-callable cell and reloads it into `xmm0`, the SysV return register.
//! `rax` is the only general register used (for value addresses) and is
//! preserved around the body.
//!
//! While appending code the emitter simulates the FPU stack and rejects any
//! program whose live depth would exceed the architectural 8 slots.

use std::cell::UnsafeCell;

use log::trace;

use crate::error::EvalError;
use crate::exec::CodeBuffer;
use crate::ir::{Node, NumericType};

/// The x87 register stack holds at most 8 values.
const FPU_STACK_SLOTS: usize = 8;

/// A compiled callable: the locked page, plus the return-marshal cell the
/// emitted epilogue stores through.
pub(crate) struct CompiledBlock {
    entry: unsafe extern "C" fn() -> f64,
    _page: crate::exec::ExecPage,
    _ret_cell: Box<UnsafeCell<f64>>,
}

// The callable reads only the addresses baked into it; those stay valid for
// the block's lifetime, so invocation itself is not unsafe to expose.
impl CompiledBlock {
    pub(crate) fn invoke(&self) -> f64 {
        unsafe { (self.entry)() }
    }
}

/// Appends `mov rax, imm64` with the given absolute address.
pub(crate) fn push_address_load(code: &mut Vec<u8>, addr: usize) {
    code.extend_from_slice(&[0x48, 0xb8]);
    code.extend_from_slice(&(addr as u64).to_le_bytes());
}

/// Appends the x87 load for a value of the given storage type at `[rax]`.
fn push_value_load(code: &mut Vec<u8>, addr: usize, ty: NumericType) {
    push_address_load(code, addr);
    code.extend_from_slice(match ty {
        NumericType::F32 => &[0xd9, 0x00], // fld  dword ptr [rax]
        NumericType::F64 => &[0xdd, 0x00], // fld  qword ptr [rax]
        NumericType::I16 => &[0xdf, 0x00], // fild word ptr [rax]
        NumericType::I32 => &[0xdb, 0x00], // fild dword ptr [rax]
        NumericType::I64 => &[0xdf, 0x28], // fild qword ptr [rax]
    });
}

/// Compiles a postfix stream into an executable block.
pub(crate) fn emit(stream: &[Node]) -> Result<CompiledBlock, EvalError> {
    let ret_cell: Box<UnsafeCell<f64>> = Box::new(UnsafeCell::new(0.0));

    let mut code: Vec<u8> = Vec::with_capacity(32 + stream.len() * 12);
    code.push(0x50); // push rax

    let mut depth: usize = 0;
    for node in stream {
        match node {
            Node::Const(c) => {
                depth += 1;
                if depth > FPU_STACK_SLOTS {
                    return Err(EvalError::StackOverflow);
                }
                push_value_load(&mut code, c.address(), NumericType::F64);
            }
            Node::Var(v) => {
                depth += 1;
                if depth > FPU_STACK_SLOTS {
                    return Err(EvalError::StackOverflow);
                }
                push_value_load(&mut code, v.addr as usize, v.ty);
            }
            Node::Op(op) => {
                debug_assert!(depth >= op.arity, "operand underflow in emitter");
                if depth + op.stack_req > FPU_STACK_SLOTS {
                    return Err(EvalError::StackOverflow);
                }
                code.extend_from_slice(op.code.bytes());
                depth = depth - op.arity + 1;
            }
        }
    }
    assert!(depth == 1, "postfix stream did not reduce to a single value");

    // Epilogue: spill st(0) through the return cell into xmm0.
    push_address_load(&mut code, ret_cell.get() as usize);
    code.extend_from_slice(&[
        0xdd, 0x18, // fstp qword ptr [rax]
        0xf3, 0x0f, 0x7e, 0x00, // movq xmm0, qword ptr [rax]
        0x58, // pop rax
        0xc3, // ret
    ]);

    trace!("emitting {} code bytes", code.len());

    let mut buffer = CodeBuffer::acquire(code.len())?;
    buffer.fill(&code);
    let page = buffer.lock()?;
    let entry = unsafe {
        std::mem::transmute::<*const u8, unsafe extern "C" fn() -> f64>(page.entry())
    };
    Ok(CompiledBlock {
        entry,
        _page: page,
        _ret_cell: ret_cell,
    })
}

/// Compiles a (constant) subtree and runs it once; used by the optimizer's
/// folding pass. The temporary page is released on return.
pub(crate) fn execute_once(stream: &[Node]) -> Result<f64, EvalError> {
    let block = emit(stream)?;
    Ok(block.invoke())
}
