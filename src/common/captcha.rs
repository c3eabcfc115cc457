//! 验证码求解
//!
//! 领水接口要求 Cloudflare Turnstile token。求解由外部服务完成，
//! 这里只定义接口和 Anti-Captcha 协议的客户端。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::core::types::{BotError, Result};
use crate::strategy::config::FaucetConfig;

/// 一次求解请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaRequest {
    pub site_key: String,
    pub page_url: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// `http` 是调用方（钱包）自己的代理客户端，求解请求走同一出口
    async fn solve(&self, http: &reqwest::Client, request: &CaptchaRequest) -> Result<String>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskResponse {
    #[serde(default)]
    error_id: u64,
    error_description: Option<String>,
    task_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TaskSolution {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskResultResponse {
    #[serde(default)]
    error_id: u64,
    error_description: Option<String>,
    status: Option<String>,
    solution: Option<TaskSolution>,
}

impl TaskResultResponse {
    /// `Ok(None)` 表示仍在处理中
    fn into_token(self) -> Result<Option<String>> {
        if self.error_id > 0 {
            return Err(BotError::Captcha(
                self.error_description.unwrap_or_else(|| format!("error id {}", self.error_id)),
            ));
        }
        match self.status.as_deref() {
            Some("ready") => self
                .solution
                .map(|solution| Some(solution.token))
                .ok_or_else(|| BotError::Captcha("ready without solution".to_string())),
            Some("processing") => Ok(None),
            other => Err(BotError::Captcha(format!("unexpected task status {other:?}"))),
        }
    }
}

/// Anti-Captcha `createTask` / `getTaskResult`
pub struct AntiCaptchaSolver {
    api_url: String,
    client_key: String,
    poll_interval: Duration,
    max_polls: usize,
}

impl AntiCaptchaSolver {
    pub fn new(api_url: impl Into<String>, client_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client_key: client_key.into(),
            poll_interval: Duration::from_secs(3),
            max_polls: 20,
        }
    }

    pub fn from_config(config: &FaucetConfig) -> Result<Self> {
        let key = config
            .captcha_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| BotError::Config("faucet requires captcha_api_key".to_string()))?;

        let mut solver = Self::new(&config.captcha_api_url, key);
        solver.poll_interval = Duration::from_secs(config.captcha_poll_interval_secs);
        solver.max_polls = config.captcha_max_polls.max(1);
        Ok(solver)
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        http: &reqwest::Client,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        http.post(format!("{}/{}", self.api_url, method))
            .json(&body)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| BotError::Captcha(e.without_url().to_string()))?
            .json::<T>()
            .await
            .map_err(|e| BotError::Captcha(format!("unexpected {method} payload: {e}")))
    }
}

#[async_trait]
impl CaptchaSolver for AntiCaptchaSolver {
    async fn solve(&self, http: &reqwest::Client, request: &CaptchaRequest) -> Result<String> {
        let created: CreateTaskResponse = self
            .post(
                http,
                "createTask",
                serde_json::json!({
                    "clientKey": self.client_key,
                    "task": {
                        "type": "TurnstileTaskProxyless",
                        "websiteURL": request.page_url,
                        "websiteKey": request.site_key,
                    }
                }),
            )
            .await?;
        if created.error_id > 0 {
            return Err(BotError::Captcha(
                created.error_description.unwrap_or_else(|| format!("error id {}", created.error_id)),
            ));
        }
        let task_id = created
            .task_id
            .ok_or_else(|| BotError::Captcha("createTask returned no task id".to_string()))?;
        info!(task_id, "Captcha task created");

        for poll in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;
            let result: TaskResultResponse = self
                .post(
                    http,
                    "getTaskResult",
                    serde_json::json!({ "clientKey": self.client_key, "taskId": task_id }),
                )
                .await?;
            match result.into_token()? {
                Some(token) => {
                    info!(task_id, poll, "Captcha solved");
                    return Ok(token);
                }
                None => debug!(task_id, poll, "Captcha not ready"),
            }
        }
        Err(BotError::Captcha(format!(
            "task {task_id} not solved after {} polls",
            self.max_polls
        )))
    }
}
