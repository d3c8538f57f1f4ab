//! Runtime function classification and declarations
//!
//! Some runtime entry points take the caller's `user_context` pointer as an
//! implicit first argument. [`takes_implicit_context`] tells which ones, and
//! [`declare_runtime_function`] adds that parameter when declaring them.

use std::collections::HashSet;
use std::sync::LazyLock;

use cranelift_codegen::ir::{AbiParam, Type, types};
use cranelift_module::{FuncId, Linkage, Module};
use tessera_core::TargetInfo;

use crate::CompilationResult;
use crate::types::pointer_type;

/// Prefix shared by all runtime error reporters.
pub const ERROR_PREFIX: &str = "halide_error_";

/// Runtime entry points that take `user_context` as their first argument.
static USER_CONTEXT_RUNTIME_FUNCS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        "halide_copy_to_host",
        "halide_copy_to_device",
        "halide_current_time_ns",
        "halide_debug_to_file",
        "halide_device_free",
        "halide_device_malloc",
        "halide_device_sync",
        "halide_do_par_for",
        "halide_do_task",
        "halide_error",
        "halide_free",
        "halide_malloc",
        "halide_print",
        "halide_profiler_pipeline_start",
        "halide_profiler_pipeline_end",
        "halide_spawn_thread",
        "halide_device_release",
        "halide_start_clock",
        "halide_trace",
        "halide_memoization_cache_lookup",
        "halide_memoization_cache_store",
        "halide_memoization_cache_release",
        "halide_cuda_run",
        "halide_opencl_run",
        "halide_opengl_run",
        "halide_openglcompute_run",
        "halide_renderscript_run",
        "halide_metal_run",
        "halide_cuda_initialize_kernels",
        "halide_opencl_initialize_kernels",
        "halide_opengl_initialize_kernels",
        "halide_openglcompute_initialize_kernels",
        "halide_renderscript_initialize_kernels",
        "halide_metal_initialize_kernels",
        "halide_get_gpu_device",
    ])
});

/// Whether runtime function `name` takes `user_context` as an implicit
/// first argument.
pub fn takes_implicit_context(name: &str) -> bool {
    USER_CONTEXT_RUNTIME_FUNCS.contains(name) || name.starts_with(ERROR_PREFIX)
}

/// Declare an imported runtime function.
///
/// `params` are the explicit parameters; a leading `user_context` pointer is
/// added for functions that take one.
pub fn declare_runtime_function<M: Module>(
    module: &mut M,
    name: &str,
    params: &[Type],
    returns: &[Type],
    target: &TargetInfo,
) -> CompilationResult<FuncId> {
    let mut sig = module.make_signature();
    if takes_implicit_context(name) {
        sig.params.push(AbiParam::new(pointer_type(target)));
    }
    sig.params.extend(params.iter().copied().map(AbiParam::new));
    sig.returns.extend(returns.iter().copied().map(AbiParam::new));

    Ok(module.declare_function(name, Linkage::Import, &sig)?)
}

/// Runtime functions used by closure dispatch
pub struct RuntimeFunctions {
    /// `halide_do_par_for(user_context, task, min, extent, closure) -> i32`
    pub do_par_for: FuncId,
}

impl RuntimeFunctions {
    /// Declare all runtime functions in the module
    pub fn declare_all<M: Module>(module: &mut M, target: &TargetInfo) -> CompilationResult<Self> {
        let pointer = pointer_type(target);

        let do_par_for = declare_runtime_function(
            module,
            "halide_do_par_for",
            &[pointer, types::I32, types::I32, pointer],
            &[types::I32],
            target,
        )?;

        Ok(RuntimeFunctions { do_par_for })
    }
}
