mod gpu;
mod helpers;
mod runner;

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::test as test_attr;
#[cfg(target_arch = "wasm32")]
pub use wasm_bindgen_test::wasm_bindgen_test as test_attr;

pub use gpu::{GpuFrame, GpuTestRunner, SceneQuad};
pub use helpers::*;
pub use runner::{TestRunner, TestRunnerBuilder, SOURCE_COLOR};

/// Set to make gpu tests fail instead of skip when no usable adapter exists.
pub const REQUIRE_GPU_ENV: &str = "SILHOUETTE_REQUIRE_GPU";

/// Unwraps a gpu setup result. Without a usable adapter the enclosing test is
/// reported as skipped on stderr and returns `Ok(())`, unless
/// [`REQUIRE_GPU_ENV`] is set, in which case the setup error is returned.
#[macro_export]
macro_rules! no_gpu_return {
    ($value:expr) => {
        match $value {
            Ok(value) => value,
            Err(err) => {
                if std::env::var_os($crate::REQUIRE_GPU_ENV).is_some() {
                    return Err(err.context("No usable gpu while gpu tests are required"));
                }
                eprintln!("SKIPPED {}: no usable gpu: {err:#}", module_path!());
                return Ok(());
            }
        }
    };
}
