//! The bytecode container (`Code`) and its instruction format.
//!
//! Instructions are logically `(opcode, r0, r1, r2, data)` records but are
//! also packable into a single 64-bit word (opcode in the low byte, three
//! register operands, a 32-bit immediate/offset in the high bits) — this is
//! the wire format a loader would persist, even though the VM here works
//! directly off the in-memory `Vec<Instruction>`.

use std::any::Any;
use std::fmt;

use super::{Object, Ptr, Str, Value};
use crate::scope::CaptureSource;

macro_rules! ops {
    ($($name:ident),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Op {
            $($name),*
        }

        impl Op {
            pub fn from_u8(b: u8) -> Op {
                const TABLE: &[Op] = &[$(Op::$name),*];
                TABLE[b as usize]
            }
        }
    };
}

ops! {
    Noop,
    /// `r0 = data` (sign-extended immediate integer).
    StoreInt,
    /// `r0 = strings[data]`.
    StoreStr,
    StoreNil,
    StoreTrue,
    StoreFalse,
    /// `r0 = r1`.
    CopyReg,
    /// Drop `r0..top` back to `r0`, used between statements in a block.
    Reset,
    /// `r0 = r1.call_sites[data](r2..r2+argc)`, argc encoded via a
    /// following `Reset`-adjacent top pointer; see `vm` for the exact
    /// calling convention.
    CallN,
    CallKW,
    Call0,
    /// `recv.^method(...)`: dispatch against `mirror_of(recv)` rather than
    /// `recv` directly. `a` = dest, `b` = register already holding the
    /// mirror (codegen emits `GetMirror` into it beforehand), `c` = argc,
    /// `data` = call site index. Mirror is computed fresh at each call site,
    /// never cached.
    UpCallN,
    /// Jump to `data` (absolute instruction index) if `r0` is falsy.
    GotoIfFalse,
    Goto,
    Return,
    /// `r0 = sub_code[data]` turned into a `Lambda`. The capture wiring
    /// (which of the enclosing frame's own-ref/capture slots feed the new
    /// lambda's capture array) is static and lives on the sub-`Code`
    /// itself (`Code::captures`), computed once by the scope analyzer.
    CreateLambda,
    /// Store `r1` into ref cell `b` (kind: 0 = own, 1 = capture).
    StoreRef,
    /// Load ref cell `b` (kind: c) into `r0`.
    LoadRef,
    /// Invoke a `Lambda` value in `r1`, arguments starting at `r2`, result
    /// into `r0`.
    Invoke,
    /// `r0 = mirror_of(r1)`.
    GetMirror,
    /// `r0 = scoped[strings[data]]`, dynamic scope lookup.
    GetScoped,
    SetScoped,
    LoadSelf,
    NewList,
    ListAppend,
    NewMap,
    SetMap,
    /// `r0 = self.ivars[self.class.ivar_index(strings[data])]`. Resolved by
    /// name at runtime, not a compile-time slot — ivars are declared
    /// dynamically while a class body executes (`has` -> `add_ivar`), so no
    /// fixed index exists when the referencing method is compiled.
    GetIvar,
    /// `self.ivars[self.class.ivar_index(strings[data])] = r1`.
    SetIvar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub op: Op,
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub data: i32,
}

impl Instruction {
    pub fn new(op: Op, a: u8, b: u8, c: u8, data: i32) -> Self {
        Instruction { op, a, b, c, data }
    }

    pub fn to_bits(self) -> u64 {
        (self.op as u64)
            | ((self.a as u64) << 8)
            | ((self.b as u64) << 16)
            | ((self.c as u64) << 24)
            | ((self.data as u32 as u64) << 32)
    }

    pub fn from_bits(bits: u64) -> Self {
        Instruction {
            op: Op::from_u8((bits & 0xff) as u8),
            a: ((bits >> 8) & 0xff) as u8,
            b: ((bits >> 16) & 0xff) as u8,
            c: ((bits >> 24) & 0xff) as u8,
            data: ((bits >> 32) & 0xffff_ffff) as u32 as i32,
        }
    }
}

/// A call site names the method (and, for keyword calls, the keyword
/// names) a `CallN`/`CallKW` instruction invokes. Interned per-`Code`, not
/// globally, since the same method name at two call sites may carry
/// different keyword tables.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub method: Ptr<Str>,
    pub kw_names: Option<Vec<Ptr<Str>>>,
}

impl CallSite {
    pub fn positional(method: Ptr<Str>) -> Self {
        CallSite {
            method,
            kw_names: None,
        }
    }

    pub fn keyword(method: Ptr<Str>, kw_names: Vec<Ptr<Str>>) -> Self {
        CallSite {
            method,
            kw_names: Some(kw_names),
        }
    }
}

/// A single required-argument count, or `-1` for "arity checking bypassed"
/// (the method itself is responsible for validating its arguments — used by
/// variadic natives like `List.new` and `IO.print`).
#[derive(Debug, Clone, Copy)]
pub struct Arity {
    pub required: i32,
}

impl Arity {
    pub const VARIADIC: Arity = Arity { required: -1 };

    pub fn fixed(n: u32) -> Self {
        Arity { required: n as i32 }
    }

    /// At least `required` arguments were supplied; `got > required` is
    /// fine; extra positional arguments are simply ignored (`Frame::new`
    /// only copies as many as there are parameter registers to receive
    /// them).
    pub fn matches(&self, got: usize) -> bool {
        self.required < 0 || got >= self.required as usize
    }
}

#[derive(Debug)]
pub struct Code {
    pub name: Ptr<Str>,
    pub num_params: u32,
    pub arity: Arity,
    pub num_regs: u32,
    pub num_own_refs: u32,
    pub instructions: Vec<Instruction>,
    pub strings: Vec<Ptr<Str>>,
    pub calls: Vec<CallSite>,
    pub sub_code: Vec<Ptr<Code>>,
    /// How this code's *captured*-ref array is populated when a `Lambda`
    /// wrapping it is created, in capture-slot order.
    pub captures: Vec<CaptureSource>,
    pub param_names: Vec<String>,
}

impl Object for Code {
    fn type_name(&self) -> &'static str {
        "Code"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<code {}>", self.name)
    }
}

/// Renders one instruction the way a disassembler would; used by tests and
/// the CLI's `--disassemble` flag.
pub fn disassemble(code: &Ptr<Code>) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    for (i, insn) in code.instructions.iter().enumerate() {
        let _ = writeln!(
            out,
            "{i:>4}  {:<14} a={:<3} b={:<3} c={:<3} data={}",
            format!("{:?}", insn.op),
            insn.a,
            insn.b,
            insn.c,
            insn.data
        );
    }
    out
}

pub fn value_not_code(v: &Value) -> bool {
    v.downcast::<Code>().is_none()
}
