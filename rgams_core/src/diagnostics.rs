use rgams_traits::DiagnosticSink;

/// Routes instrument warnings into `tracing` at WARN level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn warn(&self, component: &str, message: &str) {
        tracing::warn!(component, "{message}");
    }
}
