//! The register-based virtual machine.
//!
//! A frame's register file, own-ref array and captured-ref array are all
//! plain `Vec`s sized exactly once at call time from the executing
//! `Code`'s metadata — there's no growable operand stack to manage, so the
//! `Reset` opcode (present for format-compatibility with a loader) is a
//! no-op here: the compile-time register allocator already guarantees two
//! live values never alias the same slot.

use crate::error::{Error, Result};
use crate::runtime::Interpreter;
use crate::scoped_env::ScopedEnv;
use crate::value::class::MethodImpl;
use crate::value::code::{CallSite, Op};
use crate::value::{Code, Lambda, List, Map, Native, Ptr, Ref, Value};

pub type NativeFn = fn(&crate::runtime::Interpreter, &[Value]) -> Result<Value>;

struct Frame {
    code: Ptr<Code>,
    regs: Vec<Value>,
    own_refs: Vec<Ptr<Ref>>,
    captures: Vec<Ptr<Ref>>,
    self_value: Value,
    scoped: ScopedEnv,
}

impl Frame {
    fn new(
        code: Ptr<Code>,
        self_value: Value,
        captures: Vec<Ptr<Ref>>,
        args: &[Value],
        scoped: ScopedEnv,
    ) -> Result<Self> {
        let mut regs = vec![Value::Nil; code.num_regs as usize];
        for (i, a) in args.iter().enumerate() {
            if i < regs.len() {
                regs[i] = a.clone();
            }
        }
        let own_refs = (0..code.num_own_refs).map(|_| Ref::new(Value::Nil)).collect();
        if captures.len() != code.captures.len() {
            return Err(Error::panic(format!(
                "capture arity mismatch for `{}`: expected {}, got {}",
                code.name,
                code.captures.len(),
                captures.len()
            )));
        }
        Ok(Frame {
            code,
            regs,
            own_refs,
            captures,
            self_value,
            scoped,
        })
    }

    fn reg(&self, idx: u8) -> Result<&Value> {
        self.regs
            .get(idx as usize)
            .ok_or_else(|| Error::panic(format!("register {idx} out of bounds")))
    }

    fn set_reg(&mut self, idx: u8, v: Value) -> Result<()> {
        if (idx as usize) >= self.regs.len() {
            return Err(Error::panic(format!("register {idx} out of bounds")));
        }
        self.regs[idx as usize] = v;
        Ok(())
    }
}

/// Executes `code` as a fresh call: `self_value` gives the `self`-expression
/// context, `captures` is the lambda's (or top-level's, empty) captured-ref
/// array, and `args` are the positional call arguments, receiver excluded.
pub fn call_code(
    interp: &Interpreter,
    code: &Ptr<Code>,
    self_value: Value,
    captures: Vec<Ptr<Ref>>,
    args: &[Value],
) -> Result<Value> {
    call_code_scoped(interp, code, self_value, captures, args, interp.scoped.borrow().clone())
}

fn call_code_scoped(
    interp: &Interpreter,
    code: &Ptr<Code>,
    self_value: Value,
    captures: Vec<Ptr<Ref>>,
    args: &[Value],
    scoped: ScopedEnv,
) -> Result<Value> {
    tracing::trace!(code = code.name.as_str(), argc = args.len(), "enter frame");
    let mut frame = Frame::new(code.clone(), self_value, captures, args, scoped)?;
    let mut pc: usize = 0;

    loop {
        let insn = *frame
            .code
            .instructions
            .get(pc)
            .ok_or_else(|| Error::panic("pc ran past end of instructions"))?;

        match insn.op {
            Op::Noop => {}
            Op::StoreInt => frame.set_reg(insn.a, Value::Int(insn.data as i64))?,
            Op::StoreStr => {
                let s = string_at(&frame.code, insn.data)?;
                frame.set_reg(insn.a, Value::Str(s))?;
            }
            Op::StoreNil => frame.set_reg(insn.a, Value::Nil)?,
            Op::StoreTrue => frame.set_reg(insn.a, Value::Bool(true))?,
            Op::StoreFalse => frame.set_reg(insn.a, Value::Bool(false))?,
            Op::CopyReg => {
                let v = frame.reg(insn.b)?.clone();
                frame.set_reg(insn.a, v)?;
            }
            Op::Reset => {}
            Op::GotoIfFalse => {
                if !frame.reg(insn.a)?.is_truthy() {
                    pc = insn.data as usize;
                    continue;
                }
            }
            Op::Goto => {
                pc = insn.data as usize;
                continue;
            }
            Op::Return => {
                let v = frame.reg(insn.a)?.clone();
                tracing::trace!(code = frame.code.name.as_str(), "exit frame");
                return Ok(v);
            }
            Op::CreateLambda => {
                let sub = frame
                    .code
                    .sub_code
                    .get(insn.data as usize)
                    .cloned()
                    .ok_or_else(|| Error::panic("bad sub-code index"))?;
                let mut refs = Vec::with_capacity(sub.captures.len());
                for source in &sub.captures {
                    let r = match source {
                        crate::scope::CaptureSource::FromParentOwnRef(i) => frame
                            .own_refs
                            .get(*i as usize)
                            .cloned()
                            .ok_or_else(|| Error::panic("bad own-ref capture index"))?,
                        crate::scope::CaptureSource::FromParentCapture(i) => frame
                            .captures
                            .get(*i as usize)
                            .cloned()
                            .ok_or_else(|| Error::panic("bad parent-capture index"))?,
                    };
                    refs.push(r);
                }
                let lambda = Lambda {
                    code: sub,
                    refs,
                    receiver: Some(frame.self_value.clone()),
                };
                frame.set_reg(insn.a, Value::object(Ptr::new(lambda)))?;
            }
            Op::StoreRef => {
                let v = frame.reg(insn.b)?.clone();
                if insn.c == 0 {
                    frame
                        .own_refs
                        .get(insn.a as usize)
                        .ok_or_else(|| Error::panic("bad own-ref index"))?
                        .set(v);
                } else {
                    frame
                        .captures
                        .get(insn.a as usize)
                        .ok_or_else(|| Error::panic("bad capture index"))?
                        .set(v);
                }
            }
            Op::LoadRef => {
                let v = if insn.c == 0 {
                    frame
                        .own_refs
                        .get(insn.b as usize)
                        .ok_or_else(|| Error::panic("bad own-ref index"))?
                        .get()
                } else {
                    frame
                        .captures
                        .get(insn.b as usize)
                        .ok_or_else(|| Error::panic("bad capture index"))?
                        .get()
                };
                frame.set_reg(insn.a, v)?;
            }
            Op::Invoke => {
                let lambda_val = frame.reg(insn.b)?.clone();
                let lambda = lambda_val
                    .downcast::<Lambda>()
                    .ok_or_else(|| Error::type_error(format!("`{lambda_val}` is not a Lambda")))?;
                let argc = insn.c as usize;
                let args = collect_args(&frame, insn.b, argc)?;
                crate::value::class::arity_check("<lambda>", lambda.code.arity, args.len())?;
                let recv = lambda.receiver.clone().unwrap_or(Value::Nil);
                let result = call_code_scoped(interp, &lambda.code, recv, lambda.refs.clone(), &args, frame.scoped.clone())?;
                frame.set_reg(insn.a, result)?;
            }
            Op::GetMirror => {
                let v = frame.reg(insn.b)?.clone();
                frame.set_reg(insn.a, interp.rt.mirror_of(&v))?;
            }
            Op::GetScoped => {
                let name = string_at(&frame.code, insn.data)?;
                let v = interp.get_scoped(name.as_str())?;
                frame.set_reg(insn.a, v)?;
            }
            Op::SetScoped => {
                let name = string_at(&frame.code, insn.data)?;
                let v = frame.reg(insn.b)?.clone();
                interp.set_scoped(name.as_str(), v.clone());
                frame.set_reg(insn.a, v)?;
            }
            Op::LoadSelf => {
                let v = frame.self_value.clone();
                frame.set_reg(insn.a, v)?;
            }
            Op::NewList => frame.set_reg(insn.a, Value::object(Ptr::new(List::new())))?,
            Op::ListAppend => {
                let list = frame
                    .reg(insn.a)?
                    .downcast::<List>()
                    .ok_or_else(|| Error::panic("ListAppend target is not a List"))?;
                let v = frame.reg(insn.b)?.clone();
                list.push(v);
            }
            Op::NewMap => frame.set_reg(insn.a, Value::object(Ptr::new(Map::new())))?,
            Op::SetMap => {
                let map = frame
                    .reg(insn.a)?
                    .downcast::<Map>()
                    .ok_or_else(|| Error::panic("SetMap target is not a Map"))?;
                let key = frame.reg(insn.b)?.clone();
                let value = frame.reg(insn.c)?.clone();
                map.set(key, value);
            }
            Op::GetIvar => {
                let recv = frame.self_value.clone();
                let native = recv
                    .downcast::<Native>()
                    .ok_or_else(|| Error::type_error(format!("`{recv}` has no instance variables")))?;
                let name = string_at(&frame.code, insn.data)?;
                let idx = native
                    .ivar_index(name.as_str())
                    .ok_or_else(|| Error::type_error(format!("`{recv}` has no instance variable `{name}`")))?;
                frame.set_reg(insn.a, native.get_ivar(idx))?;
            }
            Op::SetIvar => {
                let recv = frame.self_value.clone();
                let native = recv
                    .downcast::<Native>()
                    .ok_or_else(|| Error::type_error(format!("`{recv}` has no instance variables")))?;
                let name = string_at(&frame.code, insn.data)?;
                let idx = native
                    .ivar_index(name.as_str())
                    .ok_or_else(|| Error::type_error(format!("`{recv}` has no instance variable `{name}`")))?;
                let v = frame.reg(insn.b)?.clone();
                native.set_ivar(idx, v);
            }
            Op::CallN | Op::Call0 | Op::UpCallN => {
                // `UpCallN`'s receiver register already holds `mirror_of(self)`
                // (the codegen emits `GetMirror` before this instruction), so
                // dispatch is identical to an ordinary call from here.
                let call_site = call_site_at(&frame.code, insn.data)?;
                let recv = frame.reg(insn.b)?.clone();
                let argc = if insn.op == Op::Call0 { 0 } else { insn.c as usize };
                let args = collect_args(&frame, insn.b, argc)?;
                let result = dispatch(interp, &recv, call_site.method.as_str(), &args)?;
                frame.set_reg(insn.a, result)?;
            }
            Op::CallKW => {
                let call_site = call_site_at(&frame.code, insn.data)?;
                let recv = frame.reg(insn.b)?.clone();
                let argc = insn.c as usize;
                let positional = collect_args(&frame, insn.b, argc)?;
                let kw_names = call_site
                    .kw_names
                    .as_ref()
                    .ok_or_else(|| Error::panic("CallKW site missing kw_names"))?;
                let kw_start = insn.b as usize + 1 + argc;
                let mut keywords = Vec::with_capacity(kw_names.len());
                for (i, name) in kw_names.iter().enumerate() {
                    let v = frame.reg((kw_start + i) as u8)?.clone();
                    keywords.push((name.as_str().to_string(), v));
                }
                let (_, method) = interp.rt.resolve_method(&recv, call_site.method.as_str()).ok_or_else(|| {
                    Error::unknown_method(interp.rt.class_of(&recv).name.clone(), call_site.method.to_string())
                })?;
                let args = bind_by_keyword(call_site.method.as_str(), &method, positional, keywords)?;
                let result = invoke_method(interp, &recv, &method, &args)?;
                frame.set_reg(insn.a, result)?;
            }
        }

        pc += 1;
    }
}

/// Collects `argc` args starting right after the receiver register.
fn collect_args(frame: &Frame, receiver_reg: u8, argc: usize) -> Result<Vec<Value>> {
    (0..argc)
        .map(|i| frame.reg(receiver_reg + 1 + i as u8).cloned())
        .collect()
}

fn string_at(code: &Ptr<Code>, idx: i32) -> Result<Ptr<crate::value::Str>> {
    code.strings
        .get(idx as usize)
        .cloned()
        .ok_or_else(|| Error::panic("bad string constant index"))
}

fn call_site_at(code: &Ptr<Code>, idx: i32) -> Result<CallSite> {
    code.calls
        .get(idx as usize)
        .cloned()
        .ok_or_else(|| Error::panic("bad call site index"))
}

/// Binds a `CallKW` site's positional and keyword arguments against a
/// method's declared parameter names. Native methods never accept
/// keywords; a keyword name that doesn't match any declared parameter is
/// explicitly an error rather than silently dropped (Open Question:
/// under-specified keyword calls must fail loudly).
fn bind_by_keyword(
    method_name: &str,
    method: &Ptr<crate::value::class::Method>,
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
) -> Result<Vec<Value>> {
    let params = match &method.imp {
        MethodImpl::Bytecode(lambda) => &lambda.code.param_names,
        MethodImpl::Native(_) => {
            return Err(Error::UnderspecifiedCall {
                method: method_name.to_string(),
                missing: keywords.into_iter().map(|(k, _)| k).collect::<Vec<_>>().join(", "),
            })
        }
    };

    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    for (i, v) in positional.into_iter().enumerate() {
        if i >= slots.len() {
            return Err(Error::arity(method_name, params.len().to_string(), i + 1));
        }
        slots[i] = Some(v);
    }
    for (name, v) in keywords {
        let idx = params.iter().position(|p| *p == name).ok_or_else(|| Error::UnderspecifiedCall {
            method: method_name.to_string(),
            missing: name.clone(),
        })?;
        slots[idx] = Some(v);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| Error::UnderspecifiedCall {
                method: method_name.to_string(),
                missing: params[i].clone(),
            })
        })
        .collect()
}

fn dispatch(interp: &Interpreter, recv: &Value, method_name: &str, args: &[Value]) -> Result<Value> {
    let (class, method) = interp
        .rt
        .resolve_method(recv, method_name)
        .ok_or_else(|| Error::unknown_method(interp.rt.class_of(recv).name.clone(), method_name.to_string()))?;
    let _ = class;
    invoke_method(interp, recv, &method, args)
}

fn invoke_method(
    interp: &Interpreter,
    recv: &Value,
    method: &Ptr<crate::value::class::Method>,
    args: &[Value],
) -> Result<Value> {
    match &method.imp {
        MethodImpl::Native(f) => {
            crate::value::class::arity_check(method.name.as_str(), method.arity, args.len())?;
            let mut full_args = Vec::with_capacity(args.len() + 1);
            full_args.push(recv.clone());
            full_args.extend_from_slice(args);
            f(interp, &full_args)
        }
        MethodImpl::Bytecode(lambda) => {
            crate::value::class::arity_check(method.name.as_str(), method.arity, args.len())?;
            call_code(interp, &lambda.code, recv.clone(), lambda.refs.clone(), args)
        }
    }
}
