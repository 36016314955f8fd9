//! 대시보드 백엔드 REST 클라이언트.
//!
//! 백엔드 응답 구조는 패널마다 다르므로 JSON 값 그대로 다룹니다.

use std::time::Duration;

use async_trait::async_trait;
use dashboard_core::{FetchError, RefreshSource};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

/// 백엔드 API 클라이언트
#[derive(Debug, Clone)]
pub struct DashboardApiClient {
    client: Client,
    base_url: String,
}

impl DashboardApiClient {
    /// 새 클라이언트 생성
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("HTTP client 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// API 주소
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// GET 요청 후 JSON 디코딩
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.client.get(self.url(path)).send().await?;
        Self::decode(response).await
    }

    /// JSON 본문으로 POST 요청 후 JSON 디코딩
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                code: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// 경로 하나에 고정된 JSON 조회 소스
#[derive(Debug, Clone)]
pub struct JsonEndpoint {
    client: DashboardApiClient,
    path: String,
}

impl JsonEndpoint {
    /// 새 엔드포인트 생성
    pub fn new(client: DashboardApiClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }

    /// API 경로
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl RefreshSource<Value> for JsonEndpoint {
    async fn fetch(&self) -> Result<Value, FetchError> {
        Ok(self.client.get_json(&self.path).await?)
    }
}
