//! Parallel task emission.
//!
//! A parallel loop is split into two functions sharing one closure record:
//!
//! - the *task*, `i32 task(user_context, idx, closure)`, which unpacks the
//!   record and runs the loop body for one index
//! - the *spawn site*, which packs the record on its stack and hands it to
//!   `halide_do_par_for` together with the task's address
//!
//! Both sides derive field offsets from the same [`RecordType`], which is the
//! only contract between them.

use cranelift_codegen::ir::{
    AbiParam, FuncRef, InstBuilder, Signature, StackSlotData, StackSlotKind, Value, types,
};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_module::{FuncId, Linkage, Module};
use tessera_core::{Closure, TargetInfo};
use tracing::debug;

use crate::codegen::ClosureCodegen;
use crate::env::Environment;
use crate::layout::{RecordType, zip_slots};
use crate::runtime::RuntimeFunctions;
use crate::types::pointer_type;
use crate::{CompilationError, CompilationResult};

/// Name under which the caller's context pointer is bound.
pub const USER_CONTEXT: &str = "user_context";

/// A function defined in a module, with its CLIF for inspection.
#[derive(Debug, Clone)]
pub struct DefinedFunction {
    pub id: FuncId,
    pub clif: String,
}

/// Signature of a task: `i32 (user_context: ptr, idx: i32, closure: ptr)`.
pub fn task_signature<M: Module>(module: &M, target: &TargetInfo) -> Signature {
    let pointer = pointer_type(target);
    let mut sig = module.make_signature();
    sig.params.push(AbiParam::new(pointer));
    sig.params.push(AbiParam::new(types::I32));
    sig.params.push(AbiParam::new(pointer));
    sig.returns.push(AbiParam::new(types::I32));
    sig
}

/// Define a task function that unpacks `closure` from its record argument.
///
/// `body` runs with the unpacked environment (which also binds
/// [`USER_CONTEXT`]) and the loop index, and must leave the builder in an
/// open block. The task then returns 0.
pub fn define_task_function<M, F>(
    module: &mut M,
    name: &str,
    closure: &Closure,
    record: &RecordType,
    target: &TargetInfo,
    body: F,
) -> CompilationResult<DefinedFunction>
where
    M: Module,
    F: FnOnce(&mut FunctionBuilder<'_>, &Environment, Value) -> CompilationResult<()>,
{
    let sig = task_signature(module, target);
    let id = module.declare_function(name, Linkage::Local, &sig)?;

    let mut ctx = module.make_context();
    ctx.func.signature = sig;
    let mut func_ctx = FunctionBuilderContext::new();
    {
        let mut builder = FunctionBuilder::new(&mut ctx.func, &mut func_ctx);
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);
        builder.seal_block(entry);

        let params = builder.block_params(entry).to_vec();
        let [user_context, idx, closure_ptr] = params[..] else {
            return Err(CompilationError::codegen(format!(
                "task `{name}` expects 3 parameters, found {}",
                params.len()
            )));
        };

        let mut env = Environment::new();
        env.bind(USER_CONTEXT, user_context)?;
        ClosureCodegen::new(&mut builder, target).unpack_into(
            closure,
            record,
            closure_ptr,
            &mut env,
        )?;

        body(&mut builder, &env, idx)?;

        let zero = builder.ins().iconst(types::I32, 0);
        builder.ins().return_(&[zero]);
        builder.seal_all_blocks();
        builder.finalize();
    }

    debug!(name, record = record.name(), "defined task function");
    let clif = ctx.func.display().to_string();
    module.define_function(id, &mut ctx)?;
    module.clear_context(&mut ctx);
    Ok(DefinedFunction { id, clif })
}

/// Callees and arguments of one parallel dispatch.
#[derive(Debug, Clone, Copy)]
pub struct SpawnSite {
    pub task: FuncRef,
    pub do_par_for: FuncRef,
    pub user_context: Value,
    pub min: Value,
    pub extent: Value,
}

/// Pack `closure` into a stack record and dispatch `site.task` over
/// `[min, min + extent)`. Returns the status from `halide_do_par_for`.
pub fn emit_parallel_for(
    builder: &mut FunctionBuilder<'_>,
    target: &TargetInfo,
    closure: &Closure,
    record: &RecordType,
    env: &Environment,
    site: SpawnSite,
) -> CompilationResult<Value> {
    let pointer = pointer_type(target);
    let slot = builder.create_sized_stack_slot(StackSlotData::new(
        StackSlotKind::ExplicitSlot,
        record.size().max(1),
        record.align().trailing_zeros() as u8,
    ));
    let closure_ptr = builder.ins().stack_addr(pointer, slot, 0);

    ClosureCodegen::new(builder, target).pack(record, closure_ptr, closure, env)?;

    let task_ptr = builder.ins().func_addr(pointer, site.task);
    let call = builder.ins().call(
        site.do_par_for,
        &[site.user_context, task_ptr, site.min, site.extent, closure_ptr],
    );
    Ok(builder.inst_results(call)[0])
}

/// Define a function that takes every slot of `closure` as a parameter and
/// dispatches `task` through `halide_do_par_for`.
///
/// Signature: `i32 (user_context: ptr, min: i32, extent: i32, slots...)`,
/// with the slots in canonical order.
#[allow(clippy::too_many_arguments)]
pub fn define_spawn_function<M: Module>(
    module: &mut M,
    name: &str,
    linkage: Linkage,
    closure: &Closure,
    record: &RecordType,
    target: &TargetInfo,
    task: FuncId,
    runtime: &RuntimeFunctions,
) -> CompilationResult<DefinedFunction> {
    let pointer = pointer_type(target);
    let slots = zip_slots(closure, record)?;

    let mut sig = module.make_signature();
    sig.params.push(AbiParam::new(pointer));
    sig.params.push(AbiParam::new(types::I32));
    sig.params.push(AbiParam::new(types::I32));
    for (_, field) in &slots {
        let ty = field
            .ty
            .register_type(target)
            .ok_or_else(|| CompilationError::unsupported_type(&field.ty))?;
        sig.params.push(AbiParam::new(ty));
    }
    sig.returns.push(AbiParam::new(types::I32));
    let id = module.declare_function(name, linkage, &sig)?;

    let mut ctx = module.make_context();
    ctx.func.signature = sig;
    let mut func_ctx = FunctionBuilderContext::new();
    {
        let mut builder = FunctionBuilder::new(&mut ctx.func, &mut func_ctx);
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);
        builder.seal_block(entry);

        let params = builder.block_params(entry).to_vec();
        let mut env = Environment::new();
        for ((slot, _), value) in slots.iter().zip(&params[3..]) {
            env.bind(slot.name.as_str(), *value)?;
        }

        let site = SpawnSite {
            task: module.declare_func_in_func(task, builder.func),
            do_par_for: module.declare_func_in_func(runtime.do_par_for, builder.func),
            user_context: params[0],
            min: params[1],
            extent: params[2],
        };
        let status = emit_parallel_for(&mut builder, target, closure, record, &env, site)?;
        builder.ins().return_(&[status]);
        builder.finalize();
    }

    debug!(name, record = record.name(), "defined spawn function");
    let clif = ctx.func.display().to_string();
    module.define_function(id, &mut ctx)?;
    module.clear_context(&mut ctx);
    Ok(DefinedFunction { id, clif })
}
