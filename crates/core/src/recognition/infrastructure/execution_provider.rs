use ort::execution_providers::ExecutionProviderDispatch;

/// Accelerators to register for the embedding model, best first.
///
/// ONNX Runtime falls back to its CPU provider when none can be registered.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    #[allow(unused_mut)]
    let mut providers = Vec::new();
    #[cfg(target_os = "macos")]
    providers.push(ort::execution_providers::CoreMLExecutionProvider::default().build());
    #[cfg(target_os = "windows")]
    providers.push(ort::execution_providers::DirectMLExecutionProvider::default().build());
    providers
}
