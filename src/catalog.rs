//! The operation catalog.
//!
//! A process-wide, immutable registry of every named operation and operator
//! the expression language knows. Each entry carries its x87 code template,
//! its arity, the extra FPU slots the template needs beyond its operands, and
//! optionally a peephole rewrite hook consumed by the optimizer.
//!
//! Operands arrive on the FPU stack in postfix order: for a binary operation
//! `f(a, b)`, `st(0)` holds `b` and `st(1)` holds `a`. Every template pops its
//! operands and leaves exactly one result in `st(0)`.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::optimizer::{self, OptimizeFn};

/// Upper bound on catalog function arity.
pub(crate) const MAX_FUNCTION_ARGS: usize = 2;

/// Broad classification of a catalog entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum OpKind {
    Arithmetic,
    Transcendental,
    Rounding,
    Comparison,
    Shape,
}

/// Template variant selected by [`Options::high_accuracy_trig`](crate::Options).
#[derive(Copy, Clone)]
pub(crate) struct AccurateCode {
    pub code: &'static [u8],
    pub stack_req: usize,
}

/// One catalog entry.
#[derive(Copy, Clone)]
pub(crate) struct Operation {
    pub name: &'static str,
    pub kind: OpKind,
    pub arity: usize,
    /// Maximum FPU slots the template occupies beyond its operands.
    pub stack_req: usize,
    pub code: &'static [u8],
    pub accurate: Option<AccurateCode>,
    pub optimizer: Option<OptimizeFn>,
}

const SIN: &[u8] = &[
    0xd9, 0xfe, // fsin
];

const COS: &[u8] = &[
    0xd9, 0xff, // fcos
];

const TAN: &[u8] = &[
    0xd9, 0xf2, // fptan
    0xdd, 0xd8, // fstp    st(0)
];

// Range reduction by 2*pi ahead of the trig instruction. fprem is exact, so
// the only reduction error is the 80-bit representation of 2*pi itself.
const SIN_ACCURATE: &[u8] = &[
    0xd9, 0xeb, // fldpi
    0xd8, 0xc0, // fadd    st(0), st(0)
    0xd9, 0xc9, // fxch    st(1)
    0xd9, 0xf8, // fprem
    0xdd, 0xd9, // fstp    st(1)
    0xd9, 0xfe, // fsin
];

const COS_ACCURATE: &[u8] = &[
    0xd9, 0xeb, // fldpi
    0xd8, 0xc0, // fadd    st(0), st(0)
    0xd9, 0xc9, // fxch    st(1)
    0xd9, 0xf8, // fprem
    0xdd, 0xd9, // fstp    st(1)
    0xd9, 0xff, // fcos
];

const TAN_ACCURATE: &[u8] = &[
    0xd9, 0xeb, // fldpi
    0xd8, 0xc0, // fadd    st(0), st(0)
    0xd9, 0xc9, // fxch    st(1)
    0xd9, 0xf8, // fprem
    0xdd, 0xd9, // fstp    st(1)
    0xd9, 0xf2, // fptan
    0xdd, 0xd8, // fstp    st(0)
];

const ABS: &[u8] = &[
    0xd9, 0xe1, // fabs
];

const SQRT: &[u8] = &[
    0xd9, 0xfa, // fsqrt
];

// Significand of x, in [1,2) (negated for negative x).
const SFC: &[u8] = &[
    0xd9, 0xf4, // fxtract
    0xdd, 0xd9, // fstp    st(1)
];

// Unbiased exponent of x, as a double.
const EXPN: &[u8] = &[
    0xd9, 0xf4, // fxtract
    0xdd, 0xd8, // fstp    st(0)
];

// -1 for x < 0, +1 otherwise (including zeroes, +inf and NaN).
const SIGN: &[u8] = &[
    0xd9, 0xee, // fldz
    0xdf, 0xf1, // fcomip  st, st(1)
    0xdd, 0xd8, // fstp    st(0)
    0xd9, 0xe8, // fld1
    0xd9, 0xe0, // fchs
    0xd9, 0xe8, // fld1
    0xdb, 0xd1, // fcmovnbe st, st(1)
    0xdd, 0xd9, // fstp    st(1)
];

// 1 for x > 0, 0 otherwise.
const SIGNP: &[u8] = &[
    0xd9, 0xe8, // fld1
    0xd9, 0xee, // fldz
    0xdb, 0xf2, // fcomi   st, st(2)
    0xdd, 0xda, // fstp    st(2)
    0xdb, 0xc1, // fcmovnb st, st(1)
    0xdd, 0xd9, // fstp    st(1)
];

// pow(b, e), b in st(1), e in st(0).
//
// Integral exponents with |e| <= 32 take a repeated-multiplication loop (with
// a reciprocal for negative e); e == 0 yields 1 for every base. The generic
// path computes 2^(e*log2|b|) and picks the result sign from the base sign
// and the parity of e rounded to integer. A zero base with nonzero exponent
// yields 0.
const POW: &[u8] = &[
    0xd9, 0xc0, //            fld     st(0)
    0xd9, 0xfc, //            frndint
    0xd8, 0xd1, //            fcom    st(1)
    0xdf, 0xe0, //            fnstsw  ax
    0x9e, //                  sahf
    0x75, 0x49, //            jne     pop_generic
    0xd9, 0xe1, //            fabs
    0x66, 0xc7, 0x44, 0x24, 0xfe, 0xff, 0xff, // mov word ptr [rsp-2], 0ffffh
    0xdf, 0x5c, 0x24, 0xfe, //fistp   word ptr [rsp-2]
    0x66, 0x8b, 0x44, 0x24, 0xfe, // mov ax, word ptr [rsp-2]
    0x66, 0x85, 0xc0, //      test    ax, ax
    0x74, 0x2a, //            je      one_exit
    0x66, 0x83, 0xe8, 0x01, //sub     ax, 1
    0x66, 0x83, 0xf8, 0x1f, //cmp     ax, 1fh
    0x77, 0x2a, //            ja      generic
    0xd9, 0xc1, //            fld     st(1)
    // loop_start:
    0x66, 0x85, 0xc0, //      test    ax, ax
    0x74, 0x08, //            je      loop_end
    0xdc, 0xca, //            fmul    st(2), st
    0x66, 0x83, 0xe8, 0x01, //sub     ax, 1
    0xeb, 0xf3, //            jmp     loop_start
    // loop_end:
    0xdd, 0xd8, //            fstp    st(0)
    0xd9, 0xe4, //            ftst
    0xdf, 0xe0, //            fnstsw  ax
    0x9e, //                  sahf
    0xdd, 0xd8, //            fstp    st(0)
    0x77, 0x53, //            ja      exit
    0xd9, 0xe8, //            fld1
    0xde, 0xf1, //            fdivrp  st(1), st
    0xeb, 0x4d, //            jmp     exit
    // one_exit:
    0xdd, 0xd8, //            fstp    st(0)
    0xdd, 0xd8, //            fstp    st(0)
    0xd9, 0xe8, //            fld1
    0xeb, 0x45, //            jmp     exit
    // pop_generic:
    0xdd, 0xd8, //            fstp    st(0)
    // generic:
    0xd9, 0xc9, //            fxch    st(1)
    0xd9, 0xe4, //            ftst
    0x9b, //                  wait
    0xdf, 0xe0, //            fnstsw  ax
    0x9e, //                  sahf
    0x74, 0x37, //            je      zero_exit
    0xd9, 0xe8, //            fld1
    0x77, 0x19, //            ja      sign_done
    0xd9, 0xc2, //            fld     st(2)
    0xd9, 0xfc, //            frndint
    0xd9, 0xe8, //            fld1
    0xd8, 0xc0, //            fadd    st(0), st(0)
    0xd9, 0xc9, //            fxch    st(1)
    0xd9, 0xf8, //            fprem
    0xd9, 0xe4, //            ftst
    0xdf, 0xe0, //            fnstsw  ax
    0xdd, 0xd8, //            fstp    st(0)
    0xdd, 0xd8, //            fstp    st(0)
    0x9e, //                  sahf
    0x74, 0x02, //            je      sign_done
    0xd9, 0xe0, //            fchs
    // sign_done:
    0xd9, 0xca, //            fxch    st(2)
    0xd9, 0xc9, //            fxch    st(1)
    0xd9, 0xe1, //            fabs
    0xd9, 0xf1, //            fyl2x
    0xd9, 0xe8, //            fld1
    0xd9, 0xc1, //            fld     st(1)
    0xd9, 0xf8, //            fprem
    0xd9, 0xf0, //            f2xm1
    0xde, 0xc1, //            faddp   st(1), st
    0xd9, 0xfd, //            fscale
    0xdd, 0xd9, //            fstp    st(1)
    0xde, 0xc9, //            fmulp   st(1), st
    0xeb, 0x02, //            jmp     exit
    // zero_exit:
    0xdd, 0xd9, //            fstp    st(1)
    // exit:
];

// exp(x) = 2^(x*log2(e))
const EXP: &[u8] = &[
    0xd9, 0xea, // fldl2e
    0xde, 0xc9, // fmulp   st(1), st
    0xd9, 0xe8, // fld1
    0xd9, 0xc1, // fld     st(1)
    0xd9, 0xf8, // fprem
    0xd9, 0xf0, // f2xm1
    0xde, 0xc1, // faddp   st(1), st
    0xd9, 0xfd, // fscale
    0xdd, 0xd9, // fstp    st(1)
];

// ln(x) = log2(x)/log2(e)
const LN: &[u8] = &[
    0xd9, 0xe8, // fld1
    0xd9, 0xc9, // fxch    st(1)
    0xd9, 0xf1, // fyl2x
    0xd9, 0xea, // fldl2e
    0xde, 0xf9, // fdivp   st(1), st
];

const LOG10: &[u8] = &[
    0xd9, 0xe8, // fld1
    0xd9, 0xc9, // fxch    st(1)
    0xd9, 0xf1, // fyl2x
    0xd9, 0xe9, // fldl2t
    0xde, 0xf9, // fdivp   st(1), st
];

const LOG2: &[u8] = &[
    0xd9, 0xe8, // fld1
    0xd9, 0xc9, // fxch    st(1)
    0xd9, 0xf1, // fyl2x
];

// ylog2(y, x) = y*log2(x)
const YLOG2: &[u8] = &[
    0xd9, 0xf1, // fyl2x
];

// logb(b, v) = log2(v)/log2(b)
const LOGB: &[u8] = &[
    0xd9, 0xe8, // fld1
    0xd9, 0xc9, // fxch    st(1)
    0xd9, 0xf1, // fyl2x
    0xd9, 0xc9, // fxch    st(1)
    0xd9, 0xe8, // fld1
    0xd9, 0xc9, // fxch    st(1)
    0xd9, 0xf1, // fyl2x
    0xde, 0xf9, // fdivp   st(1), st
];

const MAX: &[u8] = &[
    0xdb, 0xf1, // fcomi   st, st(1)
    0xda, 0xc1, // fcmovb  st, st(1)
    0xdd, 0xd9, // fstp    st(1)
];

const MIN: &[u8] = &[
    0xdb, 0xf1, // fcomi   st, st(1)
    0xd9, 0xc9, // fxch    st(1)
    0xda, 0xc1, // fcmovb  st, st(1)
    0xdd, 0xd9, // fstp    st(1)
];

// The rounding group swaps the FPU rounding-control bits around frndint:
// 0x067f rounds down, 0x0a7f rounds up, 0x027f rounds to nearest and 0x0e7f
// truncates toward zero.
const FLOOR: &[u8] = &[
    0x66, 0xc7, 0x44, 0x24, 0xfc, 0x7f, 0x06, // mov word ptr [rsp-4], 67fh
    0xd9, 0x7c, 0x24, 0xfe, //                   fnstcw word ptr [rsp-2]
    0xd9, 0x6c, 0x24, 0xfc, //                   fldcw  word ptr [rsp-4]
    0xd9, 0xfc, //                               frndint
    0xd9, 0x6c, 0x24, 0xfe, //                   fldcw  word ptr [rsp-2]
];

const CEIL: &[u8] = &[
    0x66, 0xc7, 0x44, 0x24, 0xfc, 0x7f, 0x0a, // mov word ptr [rsp-4], 0a7fh
    0xd9, 0x7c, 0x24, 0xfe, //                   fnstcw word ptr [rsp-2]
    0xd9, 0x6c, 0x24, 0xfc, //                   fldcw  word ptr [rsp-4]
    0xd9, 0xfc, //                               frndint
    0xd9, 0x6c, 0x24, 0xfe, //                   fldcw  word ptr [rsp-2]
];

const ROUND: &[u8] = &[
    0x66, 0xc7, 0x44, 0x24, 0xfc, 0x7f, 0x02, // mov word ptr [rsp-4], 27fh
    0xd9, 0x7c, 0x24, 0xfe, //                   fnstcw word ptr [rsp-2]
    0xd9, 0x6c, 0x24, 0xfc, //                   fldcw  word ptr [rsp-4]
    0xd9, 0xfc, //                               frndint
    0xd9, 0x6c, 0x24, 0xfe, //                   fldcw  word ptr [rsp-2]
];

const INT: &[u8] = &[
    0x66, 0xc7, 0x44, 0x24, 0xfc, 0x7f, 0x0e, // mov word ptr [rsp-4], 0e7fh
    0xd9, 0x7c, 0x24, 0xfe, //                   fnstcw word ptr [rsp-2]
    0xd9, 0x6c, 0x24, 0xfc, //                   fldcw  word ptr [rsp-4]
    0xd9, 0xfc, //                               frndint
    0xd9, 0x6c, 0x24, 0xfe, //                   fldcw  word ptr [rsp-2]
];

// mod(a, b): remainder with the sign of a.
const MOD: &[u8] = &[
    0xd9, 0xc9, // fxch    st(1)
    0xd9, 0xf8, // fprem
    0xdd, 0xd9, // fstp    st(1)
];

// less_than(a, b): 1 if a < b, else 0.
const LESS_THAN: &[u8] = &[
    0xdf, 0xf1, // fcomip  st, st(1)
    0xdd, 0xd8, // fstp    st(0)
    0xd9, 0xe8, // fld1
    0xd9, 0xee, // fldz
    0xdb, 0xd1, // fcmovnbe st, st(1)
    0xdd, 0xd9, // fstp    st(1)
];

// bnd(x, p): mod(x, p), plus p when the remainder is strictly negative.
const BND: &[u8] = &[
    0xd9, 0xc9, // fxch    st(1)
    0xd9, 0xf8, // fprem
    0xd9, 0xc0, // fld     st(0)
    0xdc, 0xc2, // fadd    st(2), st
    0xd9, 0xee, // fldz
    0xdf, 0xf1, // fcomip  st, st(1)
    0xdd, 0xd8, // fstp    st(0)
    0xdb, 0xd1, // fcmovnbe st, st(1)
    0xdd, 0xd9, // fstp    st(1)
];

const ADD: &[u8] = &[
    0xde, 0xc1, // faddp   st(1), st
];

const SUB: &[u8] = &[
    0xde, 0xe9, // fsubp   st(1), st
];

const MUL: &[u8] = &[
    0xde, 0xc9, // fmulp   st(1), st
];

const DIV: &[u8] = &[
    0xde, 0xf9, // fdivp   st(1), st
];

const NEG: &[u8] = &[
    0xd9, 0xe0, // fchs
];

// bias(x, a) = x / ((1/a - 2)(1 - x) + 1)   for x, a in [0, 1]
const BIAS: &[u8] = &[
    0xd9, 0xe8, // fld1
    0xdc, 0xf1, // fdivr   st(1), st
    0xdc, 0xe9, // fsub    st(1), st
    0xdc, 0xe9, // fsub    st(1), st
    0xd8, 0xe2, // fsub    st, st(2)
    0xde, 0xc9, // fmulp   st(1), st
    0xd9, 0xe8, // fld1
    0xde, 0xc1, // faddp   st(1), st
    0xde, 0xf9, // fdivp   st(1), st
];

// gain(x, a), with k = (2a-1)/a * (2x-1):
//   x / (k + 1)        if 2x < 1
//   (x - k) / (1 - k)  otherwise
const GAIN: &[u8] = &[
    0xd9, 0xc1, // fld     st(1)     ; x, a, x
    0xd8, 0xc2, // fadd    st, st(2) ; 2x, a, x
    0xd9, 0xe8, // fld1              ; 1, 2x, a, x
    0xdf, 0xf1, // fcomip  st, st(1) ; 2x, a, x
    0xdd, 0xd8, // fstp    st(0)     ; a, x
    0xd9, 0xc0, // fld     st(0)     ; a, a, x
    0xd8, 0xc1, // fadd    st, st(1) ; 2a, a, x
    0xd9, 0xe8, // fld1              ; 1, 2a, a, x
    0xde, 0xe9, // fsubp   st(1), st ; 2a-1, a, x
    0xde, 0xf1, // fdivrp  st(1), st ; (2a-1)/a, x
    0xd9, 0xc1, // fld     st(1)     ; x, (2a-1)/a, x
    0xdc, 0xc0, // fadd    st(0), st ; 2x, (2a-1)/a, x
    0xd9, 0xe8, // fld1              ; 1, 2x, (2a-1)/a, x
    0xde, 0xe9, // fsubp   st(1), st ; 2x-1, (2a-1)/a, x
    0xde, 0xc9, // fmulp   st(1), st ; k, x
    0xd9, 0xe8, // fld1              ; 1, k, x
    0x72, 0x06, // jb      upper_half
    0xde, 0xc1, // faddp   st(1), st ; k+1, x
    0xde, 0xf9, // fdivp   st(1), st ; x/(k+1)
    0xeb, 0x0a, // jmp     gain_exit
    // upper_half:
    0xd9, 0xc1, // fld     st(1)     ; k, 1, k, x
    0xde, 0xe9, // fsubp   st(1), st ; 1-k, k, x
    0xd9, 0xc9, // fxch    st(1)     ; k, 1-k, x
    0xde, 0xea, // fsubp   st(2), st ; 1-k, x-k
    0xde, 0xf9, // fdivp   st(1), st ; (x-k)/(1-k)
    // gain_exit:
];

fn build_catalog() -> HashMap<&'static str, Operation> {
    use OpKind::*;

    let defs = [
        op("sin", Transcendental, 1, 0, SIN)
            .with_accurate(SIN_ACCURATE, 1),
        op("cos", Transcendental, 1, 0, COS)
            .with_accurate(COS_ACCURATE, 1),
        op("tan", Transcendental, 1, 1, TAN)
            .with_accurate(TAN_ACCURATE, 1),
        op("abs", Arithmetic, 1, 0, ABS),
        op("sqrt", Arithmetic, 1, 0, SQRT),
        op("sfc", Arithmetic, 1, 1, SFC),
        op("expn", Arithmetic, 1, 1, EXPN),
        op("sign", Comparison, 1, 1, SIGN),
        op("signp", Comparison, 1, 2, SIGNP),
        op("pow", Arithmetic, 2, 3, POW).with_optimizer(optimizer::fold_pow_exponent),
        op("exp", Transcendental, 1, 2, EXP),
        op("ln", Transcendental, 1, 1, LN),
        op("log", Transcendental, 1, 1, LN),
        op("log2", Transcendental, 1, 1, LOG2),
        op("log10", Transcendental, 1, 1, LOG10),
        op("ylog2", Transcendental, 2, 0, YLOG2),
        op("logb", Transcendental, 2, 1, LOGB),
        op("max", Comparison, 2, 0, MAX),
        op("min", Comparison, 2, 0, MIN),
        op("floor", Rounding, 1, 0, FLOOR),
        op("ceil", Rounding, 1, 0, CEIL),
        op("round", Rounding, 1, 0, ROUND),
        op("int", Rounding, 1, 0, INT),
        op("mod", Arithmetic, 2, 0, MOD),
        op("less_than", Comparison, 2, 0, LESS_THAN),
        op("bnd", Shape, 2, 2, BND),
        op("bias", Shape, 2, 1, BIAS),
        op("gain", Shape, 2, 2, GAIN),
        op("add", Arithmetic, 2, 0, ADD).with_optimizer(optimizer::fold_add_operand),
        op("sub", Arithmetic, 2, 0, SUB).with_optimizer(optimizer::fold_sub_operand),
        op("mul", Arithmetic, 2, 0, MUL).with_optimizer(optimizer::fold_mul_operand),
        op("div", Arithmetic, 2, 0, DIV).with_optimizer(optimizer::fold_div_operand),
        op("neg", Arithmetic, 1, 0, NEG),
    ];

    let mut map = HashMap::with_capacity(defs.len());
    for def in defs {
        assert!(def.arity <= MAX_FUNCTION_ARGS);
        let prev = map.insert(def.name, def);
        assert!(prev.is_none(), "duplicate catalog entry");
    }
    map
}

fn op(
    name: &'static str,
    kind: OpKind,
    arity: usize,
    stack_req: usize,
    code: &'static [u8],
) -> Operation {
    Operation {
        name,
        kind,
        arity,
        stack_req,
        code,
        accurate: None,
        optimizer: None,
    }
}

impl Operation {
    fn with_optimizer(mut self, f: OptimizeFn) -> Self {
        self.optimizer = Some(f);
        self
    }

    fn with_accurate(mut self, code: &'static [u8], stack_req: usize) -> Self {
        self.accurate = Some(AccurateCode { code, stack_req });
        self
    }
}

/// The process-wide operation registry, built once on first use.
pub(crate) fn catalog() -> &'static HashMap<&'static str, Operation> {
    static CATALOG: OnceLock<HashMap<&'static str, Operation>> = OnceLock::new();
    CATALOG.get_or_init(build_catalog)
}

/// Maps operator punctuation to its catalog name.
pub(crate) fn operator_name(ch: u8, unary: bool) -> &'static str {
    if unary {
        debug_assert!(ch == b'-');
        return "neg";
    }
    match ch {
        b'+' => "add",
        b'-' => "sub",
        b'*' => "mul",
        b'/' => "div",
        b'^' => "pow",
        b'<' => "less_than",
        _ => unreachable!("not an operator: {}", ch as char),
    }
}
