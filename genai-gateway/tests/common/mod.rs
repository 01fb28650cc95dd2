//! Shared helpers for genai-gateway integration tests.
//!
//! Every test spawns its own application on a random port, backed by the
//! in-process mock provider unless it asks otherwise.

#![allow(dead_code)]

use genai_gateway::config::{
    AuthConfig, GatewayConfig, GoogleConfig, HttpConfig, ModelConfig, StreamConfig,
};
use genai_gateway::services::providers::mock::MockProvider;
use genai_gateway::services::providers::GenerativeProvider;
use genai_gateway::startup::Application;
use reqwest::{Client, Response};
use secrecy::Secret;
use serde_json::Value;
use service_core::config::Config;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_SECRET: &str = "test-secret-key";

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub provider: Arc<MockProvider>,
}

pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        common: Config {
            port: 0,
            log_level: "info".to_string(),
        },
        google: GoogleConfig {
            api_key: Secret::new("test-api-key".to_string()),
            api_base: "http://127.0.0.1:9".to_string(),
        },
        models: ModelConfig {
            text_model: "gemini-2.0-flash".to_string(),
            chat_model: "gemini-2.0-flash".to_string(),
            vision_model: "gemini-2.0-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
        },
        stream: StreamConfig { pacing_ms: 1 },
        auth: AuthConfig {
            secret_key: None,
            algorithm: "HS256".to_string(),
            protected_routes: Vec::new(),
        },
        http: HttpConfig {
            max_body_bytes: 20 * 1024 * 1024,
            cors_origins: Vec::new(),
        },
        otlp_endpoint: None,
    }
}

/// Config with bearer auth enforced on `routes`.
pub fn protected_config(routes: &[&str]) -> GatewayConfig {
    let mut config = test_config();
    config.auth.secret_key = Some(Secret::new(TEST_SECRET.to_string()));
    config.auth.protected_routes = routes.iter().map(|r| r.to_string()).collect();
    config
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(MockProvider::new(), test_config()).await
    }

    pub async fn spawn_failing(message: &str) -> Self {
        Self::spawn_with(MockProvider::failing(message), test_config()).await
    }

    pub async fn spawn_with(provider: MockProvider, config: GatewayConfig) -> Self {
        let provider = Arc::new(provider);
        let address = spawn_application(config, provider.clone()).await;

        Self {
            address,
            client: Client::new(),
            provider,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .expect("Failed to send request")
    }
}

/// Start the application with any provider and wait until `/health` answers.
pub async fn spawn_application(
    config: GatewayConfig,
    provider: Arc<dyn GenerativeProvider>,
) -> String {
    let app = Application::build_with_provider(config, provider)
        .await
        .expect("Failed to build application");
    let address = format!("http://127.0.0.1:{}", app.port());

    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    let client = Client::new();
    for _ in 0..50 {
        if client
            .get(format!("{}/health", address))
            .send()
            .await
            .is_ok()
        {
            return address;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Application did not start at {}", address);
}

pub async fn detail(response: Response) -> String {
    let body: Value = response.json().await.expect("Failed to parse JSON");
    body["detail"]
        .as_str()
        .expect("detail should be a string")
        .to_string()
}
