//! Instruction set selection for the dense kernels.
use pulp::WithSimd;

/// Instruction set the dense kernels are compiled for, detected once and passed by value.
#[derive(Clone, Copy, Debug)]
pub enum Isa {
    /// x86_64 with AVX2 and FMA.
    #[cfg(target_arch = "x86_64")]
    Avx(pulp::x86::V3),

    /// aarch64 with NEON and complex FMA.
    #[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
    Neon(pulp::aarch64::NeonFcma),

    /// Portable scalar code.
    Default,
}

impl Isa {
    /// Detect the best available instruction set.
    #[allow(unreachable_code)]
    pub fn new() -> Self {
        #[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
        {
            if let Some(neon_fcma) = pulp::aarch64::NeonFcma::try_new() {
                return Isa::Neon(neon_fcma);
            }
        }

        #[cfg(target_arch = "x86_64")]
        {
            if let Some(avx) = pulp::x86::V3::try_new() {
                return Isa::Avx(avx);
            }
        }

        Isa::Default
    }

    /// Run an operation with the target features of this instruction set enabled, so that the loops
    /// it inlines may be auto-vectorised for the detected hardware.
    #[inline(always)]
    pub fn vectorize<Op: WithSimd>(self, op: Op) -> Op::Output {
        match self {
            #[cfg(target_arch = "x86_64")]
            Isa::Avx(avx) => pulp::Simd::vectorize(avx, op),
            #[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
            Isa::Neon(neon_fcma) => pulp::Simd::vectorize(neon_fcma, op),
            Isa::Default => op.with_simd(pulp::Scalar::new()),
        }
    }

    /// Target the kernels are compiled for. The kernels are plain loops, so this names the target
    /// features enabled for the compiler rather than explicit SIMD code.
    pub fn target_name(&self) -> &'static str {
        match self {
            #[cfg(target_arch = "x86_64")]
            Isa::Avx(_) => "x86-64-v3",
            #[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
            Isa::Neon(_) => "neon-fcma",
            Isa::Default => "scalar",
        }
    }
}

impl Default for Isa {
    fn default() -> Self {
        Isa::new()
    }
}
