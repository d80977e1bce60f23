//! Peephole and constant-folding passes over the linked postfix stream.
//!
//! Pass A ("operand folding") rewrites a binary arithmetic operation one of
//! whose operands is a plain memory value (constant or variable) into a
//! single load-and-compute node, freeing one FPU slot. It also expands `pow`
//! with a small integral constant exponent into straight-line
//! multiplications. Pass B ("constant folding") compiles and executes every
//! operation whose operands have all collapsed to constants, splicing the
//! result back into the stream as a folded intermediate.
//!
//! Both passes produce new vectors; stream positions are only mutated through
//! tombstones while a pass is in flight.

use std::rc::Rc;

use log::{debug, trace};

use crate::codegen;
use crate::error::EvalError;
use crate::ir::{Code, Constant, Node, NumericType, OpNode};

/// A pass-A rewrite hook, attached to catalog entries.
///
/// Receives the stream position of the operation node; may replace that node
/// and tombstone one of its operands.
pub(crate) type OptimizeFn = fn(usize, &mut Vec<Node>, &mut [bool]);

/// Runs both optimizer passes. The stream must already be argument-linked.
pub(crate) fn optimize(
    stream: Vec<Node>,
    intermediates: &mut Vec<Rc<Constant>>,
) -> Result<Vec<Node>, EvalError> {
    let stream = fold_operands(stream);
    let before = stream.len();
    let stream = fold_constants(stream, intermediates)?;
    if stream.len() != before {
        debug!(
            "constant folding reduced {} postfix nodes to {}",
            before,
            stream.len()
        );
    }
    trace!("optimized postfix: {:?}", stream);
    Ok(stream)
}

fn fold_operands(mut stream: Vec<Node>) -> Vec<Node> {
    let mut removed = vec![false; stream.len()];
    for pos in 0..stream.len() {
        let hook = match &stream[pos] {
            Node::Op(op) => op.optimizer,
            _ => None,
        };
        if let Some(hook) = hook {
            hook(pos, &mut stream, &mut removed);
        }
    }
    stream
        .into_iter()
        .zip(removed)
        .filter(|(_, gone)| !*gone)
        .map(|(node, _)| node)
        .collect()
}

/// A value node usable as a direct x87 memory operand: its address, storage
/// type, and whether it is a live variable reference. 64-bit integers have no
/// x87 memory-arithmetic form and are never folded.
fn memory_operand(node: &Node) -> Option<(usize, NumericType, bool)> {
    match node {
        Node::Const(c) => Some((c.address(), NumericType::F64, false)),
        Node::Var(v) => match v.ty {
            NumericType::I64 => None,
            ty => Some((v.addr as usize, ty, true)),
        },
        Node::Op(_) => None,
    }
}

pub(crate) fn fold_add_operand(pos: usize, stream: &mut Vec<Node>, removed: &mut [bool]) {
    fold_operand(pos, stream, removed, 0x00, 0x00);
}

pub(crate) fn fold_sub_operand(pos: usize, stream: &mut Vec<Node>, removed: &mut [bool]) {
    fold_operand(pos, stream, removed, 0x20, 0x28);
}

pub(crate) fn fold_mul_operand(pos: usize, stream: &mut Vec<Node>, removed: &mut [bool]) {
    fold_operand(pos, stream, removed, 0x08, 0x08);
}

pub(crate) fn fold_div_operand(pos: usize, stream: &mut Vec<Node>, removed: &mut [bool]) {
    fold_operand(pos, stream, removed, 0x30, 0x38);
}

/// Folds one memory operand of a two-argument arithmetic node into the
/// instruction itself. `direct` is the ModRM byte applied when the folded
/// operand is the *second* argument (`st(0)` holds the first), `reverse` when
/// it is the first; for `sub` and `div` these select the reversed forms.
fn fold_operand(pos: usize, stream: &mut Vec<Node>, removed: &mut [bool], direct: u8, reverse: u8) {
    let (name, args) = match &stream[pos] {
        Node::Op(op) => (op.name, op.args),
        _ => return,
    };
    for i in 0..2 {
        let apos = args[i];
        if removed[apos] {
            continue;
        }
        let Some((addr, ty, is_var)) = memory_operand(&stream[apos]) else {
            continue;
        };
        let modrm = if i == 0 { direct } else { reverse };
        let mut code = Vec::with_capacity(12);
        codegen::push_address_load(&mut code, addr);
        code.push(match ty {
            NumericType::I16 => 0xde,
            NumericType::I32 => 0xda,
            NumericType::F32 => 0xd8,
            NumericType::F64 => 0xdc,
            NumericType::I64 => unreachable!("i64 operands are never folded"),
        });
        code.push(modrm);
        stream[pos] = Node::Op(OpNode {
            name,
            arity: 1,
            stack_req: 0,
            code: Code::Inline(code),
            optimizer: None,
            var_ref: is_var,
            args: [args[1 - i], 0],
        });
        removed[apos] = true;
        return;
    }
}

const FMUL_SELF: [u8; 2] = [0xdc, 0xc8]; // fmul st(0), st(0)

/// Replaces `pow` with a constant integral exponent in
/// {0, ±1, ±2, ±3, ±4, ±5, ±6, ±7, ±8, ±16, ±32} by a hard-coded
/// multiplication sequence, with a trailing reciprocal for negative
/// exponents. An exponent of 0 yields 1 for every base.
pub(crate) fn fold_pow_exponent(pos: usize, stream: &mut Vec<Node>, removed: &mut [bool]) {
    let args = match &stream[pos] {
        Node::Op(op) => op.args,
        _ => return,
    };
    // args[0] is the operand pushed last: the exponent.
    let apos = args[0];
    if removed[apos] {
        return;
    }
    let Node::Const(c) = &stream[apos] else {
        return;
    };
    let v = c.value;
    if v.round() != v || v.abs() > 32.0 {
        return;
    }
    let (seq, duplicates): (&[u8], bool) = match v.abs() as u32 {
        0 => (
            &[
                0xdd, 0xd8, // fstp st(0)
                0xd9, 0xe8, // fld1
            ],
            false,
        ),
        1 => (&[], false),
        2 => (&FMUL_SELF, false),
        3 => (
            &[
                0xd9, 0xc0, // fld  st(0)
                0xdc, 0xc8, // fmul st(0), st(0)
                0xde, 0xc9, // fmulp st(1), st
            ],
            true,
        ),
        4 => (&[0xdc, 0xc8, 0xdc, 0xc8], false),
        5 => (
            &[
                0xd9, 0xc0, 0xdc, 0xc8, 0xdc, 0xc8, 0xde, 0xc9,
            ],
            true,
        ),
        6 => (
            &[
                0xd9, 0xc0, // fld  st(0)
                0xdc, 0xc8, 0xdc, 0xc8, // x^4
                0xd8, 0xc9, // fmul st(0), st(1)
                0xde, 0xc9, // fmulp st(1), st
            ],
            true,
        ),
        7 => (
            &[
                0xd9, 0xc0, 0xdc, 0xc8, 0xdc, 0xc8, 0xd8, 0xc9, 0xd8, 0xc9, 0xde, 0xc9,
            ],
            true,
        ),
        8 => (&[0xdc, 0xc8, 0xdc, 0xc8, 0xdc, 0xc8], false),
        16 => (&[0xdc, 0xc8, 0xdc, 0xc8, 0xdc, 0xc8, 0xdc, 0xc8], false),
        32 => (
            &[
                0xdc, 0xc8, 0xdc, 0xc8, 0xdc, 0xc8, 0xdc, 0xc8, 0xdc, 0xc8,
            ],
            false,
        ),
        _ => return,
    };
    let mut code = seq.to_vec();
    let mut stack_req = usize::from(duplicates);
    if v < 0.0 {
        code.extend_from_slice(&[
            0xd9, 0xe8, // fld1
            0xde, 0xf1, // fdivrp st(1), st
        ]);
        stack_req = 1;
    }
    stream[pos] = Node::Op(OpNode {
        name: "pow",
        arity: 1,
        stack_req,
        code: Code::Inline(code),
        optimizer: None,
        var_ref: false,
        args: [args[1], 0],
    });
    removed[apos] = true;
}

/// Left-to-right constant folding. Whenever an operation's operands have all
/// collapsed to constants (and its code does not reference a variable
/// directly), the subtree is compiled, executed once, and replaced by the
/// captured result.
fn fold_constants(
    stream: Vec<Node>,
    intermediates: &mut Vec<Rc<Constant>>,
) -> Result<Vec<Node>, EvalError> {
    let mut out: Vec<Node> = Vec::with_capacity(stream.len());
    for node in stream {
        let op = match node {
            Node::Op(op) if !op.var_ref => op,
            other => {
                out.push(other);
                continue;
            }
        };
        let n = op.arity;
        let all_const = out.len() >= n
            && out[out.len() - n..]
                .iter()
                .all(|e| matches!(e, Node::Const(_)));
        if !all_const {
            out.push(Node::Op(op));
            continue;
        }
        let mut subtree = out.split_off(out.len() - n);
        subtree.push(Node::Op(op));
        let value = codegen::execute_once(&subtree)?;
        let folded = Constant::new(value);
        intermediates.push(folded.clone());
        out.push(Node::Const(folded));
    }
    Ok(out)
}
