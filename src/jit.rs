// Copyright 2025 the Upscale Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime compilation of generated kernels with TinyCC.
//!
//! The contract with the compiler is narrow: hand it one self-contained
//! source string, get back a resolved entry point or diagnostics. TCC keeps
//! process-wide state, so builds are serialized through its guard; the
//! relocated code stays owned by [`CompiledKernel`] for as long as the
//! kernel may be invoked.

use std::ffi::{c_void, CStr, CString};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use libtcc::{Context, Guard, OutputType, RelocatedCtx};
use log::{debug, warn};

use crate::codegen::{self, KERNEL_SYMBOL};
use crate::pixmap::Pixmap;
use crate::scaler::ScaleSpec;
use crate::Error;

/// Search paths handed through to TinyCC so it can locate its own runtime
/// support files.
///
/// These mirror `tcc`'s `-B`, `-I` and `-L` flags. Which of them a
/// deployment needs depends on how the TCC runtime is installed on the
/// host, not on the engine; an empty set means TCC's compiled-in defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JitPaths {
    /// The TCC runtime directory (`-B`).
    pub runtime: Option<PathBuf>,
    /// Additional include directories (`-I`).
    pub include: Vec<PathBuf>,
    /// Additional library directories (`-L`).
    pub library: Vec<PathBuf>,
}

type KernelFn = unsafe extern "C" fn(*const u8, *mut u8);

/// A compiled kernel bound to one [`ScaleSpec`].
///
/// Owns the relocated TCC context backing the entry point, and the guard on
/// TCC's process-wide state for as long as the context lives. Field order
/// pins the drop order: the executable pages go away before the state guard
/// is released.
pub(crate) struct CompiledKernel {
    entry: KernelFn,
    _relocated: RelocatedCtx<'static, 'static>,
    _guard: Box<Guard>,
    spec: ScaleSpec,
}

// SAFETY: after relocation the context is executable memory that is never
// written again, and the guard is only touched on drop.
unsafe impl Send for CompiledKernel {}
unsafe impl Sync for CompiledKernel {}

impl core::fmt::Debug for CompiledKernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompiledKernel")
            .field("spec", &self.spec)
            .field("entry", &(self.entry as *const ()))
            .finish_non_exhaustive()
    }
}

impl CompiledKernel {
    /// Generate, compile and resolve the nearest-neighbor kernel for `spec`.
    pub(crate) fn build(spec: ScaleSpec, paths: &JitPaths) -> Result<Self, Error> {
        let source = codegen::nearest_kernel_source(&spec);
        let source = CString::new(source)
            .map_err(|_| Error::Compile("generated source contains a NUL byte".into()))?;

        let mut guard = Box::new(
            Guard::new().map_err(|err| Error::Compile(format!("TCC state unavailable: {err:?}")))?,
        );
        // The guard is boxed, so its address stays stable while the context
        // borrows it; the context never outlives it, which the field order
        // in `Self` upholds.
        let guard_ref: &'static mut Guard = unsafe { &mut *std::ptr::from_mut(guard.as_mut()) };
        let mut ctx = Context::new(guard_ref)
            .map_err(|err| Error::Compile(format!("failed to create a TCC context: {err:?}")))?;

        let diagnostics = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&diagnostics);
        ctx.set_call_back(move |msg: &CStr| {
            if let Ok(mut collected) = sink.lock() {
                collected.push_str(&msg.to_string_lossy());
                collected.push('\n');
            }
        });

        if let Some(runtime) = &paths.runtime {
            ctx.set_lib_path(runtime);
        }
        for dir in &paths.include {
            let _ = ctx.add_include_path(dir);
        }
        for dir in &paths.library {
            let _ = ctx.add_library_path(dir);
        }
        ctx.set_output_type(OutputType::Memory);

        ctx.compile_string(&source)
            .map_err(|_| Error::Compile(take_diagnostics(&diagnostics)))?;
        let mut relocated = ctx
            .relocate()
            .map_err(|_| Error::Compile(take_diagnostics(&diagnostics)))?;

        // SAFETY: the symbol name matches the function the generator emits.
        let Some(addr) = (unsafe { relocated.get_symbol(c"scale_kernel") }) else {
            // Compilation succeeded, so the generator and the compiler
            // disagree about the entry point. Logged apart from compile
            // errors since no amount of source fixing explains it.
            warn!("compiled kernel does not export `{KERNEL_SYMBOL}`");
            return Err(Error::MissingSymbol(KERNEL_SYMBOL.into()));
        };
        // SAFETY: the generated function has exactly this signature.
        let entry = unsafe { std::mem::transmute::<*mut c_void, KernelFn>(addr) };

        debug!(
            "compiled nearest kernel for {}x{} -> {}x{}",
            spec.src_width, spec.src_height, spec.dst_width, spec.dst_height
        );
        Ok(Self {
            entry,
            _relocated: relocated,
            _guard: guard,
            spec,
        })
    }

    /// Run the kernel over one source/destination pair.
    ///
    /// # Panics
    ///
    /// Panics if the buffers do not match the spec the kernel was compiled
    /// for. The generated code has the dimensions baked in; invoking it on
    /// any other size pair would read and write out of bounds.
    pub(crate) fn invoke(&self, src: &Pixmap, dst: &mut Pixmap) {
        assert!(
            src.width() == self.spec.src_width
                && src.height() == self.spec.src_height
                && src.channels() == self.spec.channels
                && dst.width() == self.spec.dst_width
                && dst.height() == self.spec.dst_height
                && dst.channels() == self.spec.channels,
            "kernel compiled for {:?} invoked with {}x{} -> {}x{}",
            self.spec,
            src.width(),
            src.height(),
            dst.width(),
            dst.height(),
        );
        debug_assert!(src.is_packed() && dst.is_packed());
        // SAFETY: the checks above are exactly the contract the source was
        // generated against, and both buffers live for the duration of the
        // call.
        unsafe { (self.entry)(src.data().as_ptr(), dst.data_mut().as_mut_ptr()) }
    }
}

fn take_diagnostics(diagnostics: &Mutex<String>) -> String {
    let text = diagnostics
        .lock()
        .map(|mut collected| std::mem::take(&mut *collected))
        .unwrap_or_default();
    if text.is_empty() {
        "no diagnostics reported".into()
    } else {
        text
    }
}
