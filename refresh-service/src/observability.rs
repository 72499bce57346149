use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` directives are honored, with the
/// service's own spans at `info` unless overridden.
pub fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "refresh_service=info".parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
