use http::{HeaderName, Method};
use mosaic_config::{CorsConfig, is_wildcard};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Build a Tower CORS layer from configuration
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut layer = CorsLayer::new();

    layer = if is_wildcard(&config.origins) {
        layer.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<_> = config.origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    };

    layer = if is_wildcard(&config.methods) {
        layer.allow_methods(AllowMethods::any())
    } else {
        let methods: Vec<Method> = config.methods.iter().filter_map(|m| m.parse().ok()).collect();
        layer.allow_methods(methods)
    };

    layer = if is_wildcard(&config.headers) {
        layer.allow_headers(AllowHeaders::any())
    } else {
        let headers: Vec<HeaderName> = config.headers.iter().filter_map(|h| h.parse().ok()).collect();
        layer.allow_headers(headers)
    };

    // wildcard origins cannot be combined with credentials
    if config.credentials && !is_wildcard(&config.origins) {
        layer = layer.allow_credentials(true);
    }

    if let Some(duration) = config.max_age_duration() {
        layer = layer.max_age(duration);
    }

    layer
}
