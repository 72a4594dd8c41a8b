use crate::error::ConfigError;
use crate::options::BuildOptions;
use tracing::debug;

/// Rejects option combinations the upstream build cannot produce: `cxx` and
/// `parallel` are mutually exclusive.
pub fn validate(options: &BuildOptions) -> Result<(), ConfigError> {
    if options.cxx && options.parallel {
        return Err(ConfigError::IncompatibleOptions);
    }

    debug!(os = %options.os, shared = options.shared, cxx = options.cxx, parallel = options.parallel, "options valid");

    Ok(())
}
