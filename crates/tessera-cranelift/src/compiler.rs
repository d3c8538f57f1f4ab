//! Main compiler interface
//!
//! This module provides the high-level interface for compiling closure
//! task/spawn pairs to native object files using Cranelift.

use cranelift_codegen::settings::{self, Configurable};
use cranelift_module::Linkage;
use cranelift_object::{ObjectBuilder, ObjectModule};
use target_lexicon::Triple;
use tessera_core::{Closure, TargetInfo};

use crate::CompilationResult;
use crate::layout::RecordTypes;
use crate::runtime::RuntimeFunctions;
use crate::task::{define_spawn_function, define_task_function};
use crate::types::MachineType;

/// CLIF text of one compiled task/spawn pair.
#[derive(Debug, Clone)]
pub struct ClosurePair {
    pub task_clif: String,
    pub spawn_clif: String,
}

/// Closure compiler using Cranelift
pub struct TesseraCompiler {
    module: ObjectModule,
    runtime: RuntimeFunctions,
    records: RecordTypes,
}

impl TesseraCompiler {
    /// Create a new compiler for the given target
    pub fn new(target: Option<Triple>) -> CompilationResult<Self> {
        // Use native target if not specified
        let triple = target.unwrap_or_else(Triple::host);
        let target = TargetInfo::from_triple(triple.clone());

        let mut flag_builder = settings::builder();
        flag_builder.set("use_colocated_libcalls", "false")?;
        flag_builder.set("is_pic", "false")?;

        let isa_builder = cranelift_codegen::isa::lookup(triple)?;
        let isa = isa_builder.finish(settings::Flags::new(flag_builder))?;

        let object_builder = ObjectBuilder::new(
            isa,
            format!("tessera_{}", std::process::id()),
            cranelift_module::default_libcall_names(),
        )?;
        let mut module = ObjectModule::new(object_builder);

        let runtime = RuntimeFunctions::declare_all(&mut module, &target)?;
        let records = RecordTypes::new(target, MachineType::buffer_metadata());

        Ok(TesseraCompiler {
            module,
            runtime,
            records,
        })
    }

    pub fn target(&self) -> &TargetInfo {
        self.records.target()
    }

    /// Define `<name>_task` and the exported `<name>_spawn` for `closure`.
    ///
    /// The task only unpacks its record; the spawn function takes the
    /// closure's slots as parameters and dispatches the task.
    pub fn compile_closure_pair(
        &mut self,
        name: &str,
        closure: &Closure,
    ) -> CompilationResult<ClosurePair> {
        let record = self.records.intern(closure)?;
        let target = self.records.target().clone();

        let task = define_task_function(
            &mut self.module,
            &format!("{name}_task"),
            closure,
            &record,
            &target,
            |_, _, _| Ok(()),
        )?;
        let spawn = define_spawn_function(
            &mut self.module,
            &format!("{name}_spawn"),
            Linkage::Export,
            closure,
            &record,
            &target,
            task.id,
            &self.runtime,
        )?;

        Ok(ClosurePair {
            task_clif: task.clif,
            spawn_clif: spawn.clif,
        })
    }

    /// Finalize the module and emit the object file
    pub fn finish(self) -> CompilationResult<Vec<u8>> {
        let object = self.module.finish();
        Ok(object.emit()?)
    }
}
