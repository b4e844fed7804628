use std::time::Duration;

use crate::template::ImagePolicy;

// app's shared state, read-only once the server starts

pub struct AppState {
    pub client: reqwest::Client, // shared by every provider call, carries the timeout
    pub max_upload_bytes: usize, // template size ceiling
    pub image_policy: ImagePolicy,
}

impl AppState {
    pub fn new(max_upload_bytes: usize, provider_timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(provider_timeout)
            .build()?;
        Ok(Self {
            client,
            max_upload_bytes,
            image_policy: ImagePolicy::default(),
        })
    }
}
