use std::{sync::OnceLock, time::Duration};

use reqwest::Client;

/// Upper bound for any single upstream call that is not polled
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection-pooled HTTP client shared by all adapters
pub fn http_client() -> Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();

    CLIENT
        .get_or_init(|| {
            Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .connect_timeout(Duration::from_secs(10))
                .pool_idle_timeout(Some(Duration::from_secs(30)))
                .tcp_keepalive(Some(Duration::from_secs(60)))
                .build()
                .expect("Failed to build default HTTP client")
        })
        .clone()
}
