use ort::execution_providers::ExecutionProviderDispatch;

/// Name of the hardware provider tried before the CPU fallback.
pub fn platform_provider_name() -> &'static str {
    if cfg!(target_os = "macos") {
        "CoreML"
    } else if cfg!(target_os = "windows") {
        "DirectML"
    } else {
        "CPU"
    }
}

/// Execution providers for model sessions on this platform. ONNX Runtime
/// silently falls back to CPU when one fails to register.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    log::debug!("Preferred ONNX execution provider: {}", platform_provider_name());

    #[cfg(target_os = "macos")]
    let providers = vec![ort::execution_providers::CoreMLExecutionProvider::default().build()];
    #[cfg(target_os = "windows")]
    let providers = vec![ort::execution_providers::DirectMLExecutionProvider::default().build()];
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let providers = Vec::new();

    providers
}
