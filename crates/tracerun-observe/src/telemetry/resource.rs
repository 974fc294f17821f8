use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;

/// `service.name` plus best-effort host and process details.
///
/// `OTEL_RESOURCE_ATTRIBUTES` is still honored by the SDK detectors; the
/// attributes set here win on conflict.
pub fn detect_resource(service_name: &str) -> Resource {
    let mut attrs = vec![
        KeyValue::new("process.pid", i64::from(std::process::id())),
        KeyValue::new("os.type", std::env::consts::OS),
        KeyValue::new("host.arch", std::env::consts::ARCH),
    ];
    if let Some(host) = hostname::get().ok().and_then(|h| h.into_string().ok()) {
        attrs.push(KeyValue::new("host.name", host));
    }

    Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attributes(attrs)
        .build()
}
